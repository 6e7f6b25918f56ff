use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::info;
use tokio::sync::mpsc;

use server::leaderboard::Leaderboard;
use server::network;
use server::poll::PollLoop;
use server::session::GameSession;

/// Game routes served by this process, in session order.
const GAMES: [&str; 2] = ["dots-and-boxes", "battleship"];

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Poll rate (ticks per second)
    #[clap(short, long, default_value = "100")]
    tick_rate: u32,
    /// Board grid dimension (boxes are one less per side)
    #[clap(short, long, default_value = "8")]
    board_size: usize,
    /// Leaderboard JSON file; omit to disable score recording
    #[clap(short, long)]
    leaderboard: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut sessions = Vec::with_capacity(GAMES.len());
    let mut routes = HashMap::new();
    for (index, name) in GAMES.iter().enumerate() {
        routes.insert(format!("/ws/{}", name), index);
        let leaderboard = args.leaderboard.as_ref().map(|p| Leaderboard::new(p.clone()));
        sessions.push(GameSession::new(*name, args.board_size, leaderboard));
    }
    info!(
        "Serving {} games on a {}x{} board",
        GAMES.len(),
        args.board_size,
        args.board_size
    );

    let (attach_tx, attach_rx) = mpsc::unbounded_channel();
    let address = format!("{}:{}", args.host, args.port);

    // Network task: bind (with retry) and accept upgrades forever.
    let listener_handle = tokio::spawn(async move {
        let listener = network::bind_with_backoff(&address, routes, attach_tx).await;
        listener.run().await;
    });

    // Poll task: the single driver for every game session.
    let tick = Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64);
    let poll_handle = tokio::spawn(PollLoop::new(sessions, attach_rx, tick).run());

    // Handle shutdown gracefully
    tokio::select! {
        result = listener_handle => {
            if let Err(e) = result {
                eprintln!("Network task panicked: {}", e);
            }
        }
        result = poll_handle => {
            if let Err(e) = result {
                eprintln!("Poll loop task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
