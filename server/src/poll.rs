//! Cooperative driver for every game session in the process.
//!
//! One task, one loop: each iteration first services connection setup by
//! draining the attach queue fed by the network layer, then ticks every
//! session in a fixed, repeatable order. Sessions are fully independent
//! games; they share nothing but this scheduler.

use std::time::Duration;

use log::warn;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::session::GameSession;
use crate::transport::Transport;

/// A freshly upgraded peer routed to the session at `session` index.
pub struct AttachRequest<T> {
    pub session: usize,
    pub peer: T,
}

pub struct PollLoop<T: Transport> {
    sessions: Vec<GameSession<T>>,
    attach_rx: mpsc::UnboundedReceiver<AttachRequest<T>>,
    tick_duration: Duration,
}

impl<T: Transport> PollLoop<T> {
    pub fn new(
        sessions: Vec<GameSession<T>>,
        attach_rx: mpsc::UnboundedReceiver<AttachRequest<T>>,
        tick_duration: Duration,
    ) -> Self {
        PollLoop {
            sessions,
            attach_rx,
            tick_duration,
        }
    }

    /// One scheduler iteration: connection setup, then every session once.
    ///
    /// A session tick can never fail (see [`GameSession::on_tick`]), so one
    /// misbehaving game or peer cannot stall the others.
    pub fn tick(&mut self) {
        while let Ok(request) = self.attach_rx.try_recv() {
            match self.sessions.get_mut(request.session) {
                Some(session) => {
                    session.on_attach(request.peer);
                }
                None => warn!("Attach request for unknown session {}", request.session),
            }
        }

        for session in &mut self.sessions {
            session.on_tick();
        }
    }

    /// Runs the loop forever at the configured tick rate.
    pub async fn run(mut self) {
        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick();
        }
    }
}
