//! Non-blocking peer transport.
//!
//! The poll loop must never wait on a socket, so the registry talks to
//! peers through the [`Transport`] trait: receive at most one frame or
//! nothing, send one frame, close. Any failed call means the peer is gone.
//!
//! The production implementation, [`ChannelPeer`], bridges a WebSocket to
//! the single-threaded poll loop with a pair of mpsc channels serviced by
//! per-connection reader and writer tasks. A closed channel end is the
//! disconnect signal: the reader task exits on socket error or close frame
//! (dropping the inbound sender), and the writer task exits on sink error
//! (dropping the outbound receiver).

use std::fmt;

use futures_util::{SinkExt, StreamExt};
use log::debug;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// The peer's transport has failed; it must be detached and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerGone;

impl fmt::Display for PeerGone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer transport closed")
    }
}

impl std::error::Error for PeerGone {}

/// One connected game client, seen as a non-blocking message pipe.
pub trait Transport {
    /// Reads at most one pending text frame. `Ok(None)` means no frame is
    /// available right now; `Err` means the peer is gone.
    fn try_receive(&mut self) -> Result<Option<String>, PeerGone>;

    /// Queues one text frame for delivery.
    fn send(&mut self, payload: &str) -> Result<(), PeerGone>;

    /// Best-effort close; never fails.
    fn close(&mut self);
}

/// Channel-backed handle to a WebSocket serviced by background I/O tasks.
pub struct ChannelPeer {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl Transport for ChannelPeer {
    fn try_receive(&mut self) -> Result<Option<String>, PeerGone> {
        match self.inbound.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PeerGone),
        }
    }

    fn send(&mut self, payload: &str) -> Result<(), PeerGone> {
        self.outbound
            .send(Message::Text(payload.to_string()))
            .map_err(|_| PeerGone)
    }

    fn close(&mut self) {
        // The writer task stops after forwarding the close frame; receiving
        // stops immediately.
        let _ = self.outbound.send(Message::Close(None));
        self.inbound.close();
    }
}

/// Wires an accepted WebSocket to a [`ChannelPeer`], spawning its reader
/// and writer tasks.
pub fn spawn_peer(stream: WebSocketStream<TcpStream>) -> ChannelPeer {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
    let (mut sink, mut source) = stream.split();

    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {} // ping/pong handled by the protocol layer
                Err(e) => {
                    debug!("WebSocket read error: {}", e);
                    break;
                }
            }
        }
    });

    ChannelPeer {
        inbound: inbound_rx,
        outbound: outbound_tx,
    }
}
