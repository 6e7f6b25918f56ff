//! Listener and WebSocket upgrade routing.
//!
//! Each game is reachable at `/ws/<game-name>`; the handshake callback
//! resolves the request path against the route table and anything else is
//! refused with a plain HTTP error (static pages are somebody else's job).
//! Accepted sockets are wrapped into channel peers and queued for the poll
//! loop, which attaches them on its next iteration.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::poll::AttachRequest;
use crate::transport::{self, ChannelPeer};

/// Delay between attempts when the listening socket cannot be bound.
pub const BIND_RETRY: Duration = Duration::from_secs(5);

/// Accepting socket plus the route table mapping upgrade paths to session
/// indexes.
pub struct WsListener {
    listener: TcpListener,
    routes: Arc<HashMap<String, usize>>,
    attach_tx: mpsc::UnboundedSender<AttachRequest<ChannelPeer>>,
}

impl WsListener {
    pub async fn bind(
        addr: &str,
        routes: HashMap<String, usize>,
        attach_tx: mpsc::UnboundedSender<AttachRequest<ChannelPeer>>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", addr);
        Ok(WsListener {
            listener,
            routes: Arc::new(routes),
            attach_tx,
        })
    }

    /// Actual bound address, for callers that bound port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, handing each to its own handshake task
    /// so a slow client cannot hold up the accept queue.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let routes = Arc::clone(&self.routes);
                    let attach_tx = self.attach_tx.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, peer_addr, routes, attach_tx).await;
                    });
                }
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Binds the listener, retrying on failure after a fixed backoff instead
/// of taking the process down.
pub async fn bind_with_backoff(
    addr: &str,
    routes: HashMap<String, usize>,
    attach_tx: mpsc::UnboundedSender<AttachRequest<ChannelPeer>>,
) -> WsListener {
    loop {
        match WsListener::bind(addr, routes.clone(), attach_tx.clone()).await {
            Ok(listener) => return listener,
            Err(e) => {
                error!(
                    "Failed to bind {}: {} (retrying in {}s)",
                    addr,
                    e,
                    BIND_RETRY.as_secs()
                );
                tokio::time::sleep(BIND_RETRY).await;
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    routes: Arc<HashMap<String, usize>>,
    attach_tx: mpsc::UnboundedSender<AttachRequest<ChannelPeer>>,
) {
    let mut selected = None;
    let callback = |request: &Request, response: Response| {
        match routes.get(request.uri().path()) {
            Some(session) => {
                selected = Some(*session);
                Ok(response)
            }
            None => {
                let mut refusal = ErrorResponse::new(Some("unknown game route".to_string()));
                *refusal.status_mut() = StatusCode::NOT_FOUND;
                Err(refusal)
            }
        }
    };

    match accept_hdr_async(stream, callback).await {
        Ok(websocket) => {
            let Some(session) = selected else {
                return;
            };
            let peer = transport::spawn_peer(websocket);
            if attach_tx.send(AttachRequest { session, peer }).is_err() {
                warn!("Poll loop gone; dropping connection from {}", peer_addr);
                return;
            }
            info!("WebSocket client connected from {}", peer_addr);
        }
        Err(e) => {
            debug!("Handshake with {} failed: {}", peer_addr, e);
        }
    }
}
