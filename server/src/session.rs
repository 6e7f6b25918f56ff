//! One running game: an engine bound to its peer registry.
//!
//! The poll loop drives a session through two entry points: `on_attach`
//! for a freshly upgraded connection and `on_tick` once per loop
//! iteration. A tick always runs the same three phases:
//!
//! 1. deliver the current snapshot to peers attached since the last tick
//!    (a deliberate one-tick deferral; sending inside the upgrade
//!    handshake can lose the frame on some stacks),
//! 2. read and dispatch at most one frame per active peer,
//! 3. broadcast once if anything changed, however many messages changed it.

use log::{debug, info};
use shared::{ClientMessage, Player};

use crate::engine::GameEngine;
use crate::leaderboard::Leaderboard;
use crate::registry::{PeerId, SessionRegistry};
use crate::transport::Transport;

pub struct GameSession<T: Transport> {
    name: String,
    engine: GameEngine,
    registry: SessionRegistry<T>,
    leaderboard: Option<Leaderboard>,
}

impl<T: Transport> GameSession<T> {
    /// Creates a session for the named game on a fresh engine. `name` is
    /// both the route suffix and the leaderboard key.
    pub fn new(name: impl Into<String>, board_size: usize, leaderboard: Option<Leaderboard>) -> Self {
        GameSession {
            name: name.into(),
            engine: GameEngine::new(board_size),
            registry: SessionRegistry::new(),
            leaderboard,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer_count(&self) -> usize {
        self.registry.peer_count()
    }

    /// Registers a new peer. No frame is written here; the peer receives
    /// its initial state during the next tick.
    pub fn on_attach(&mut self, peer: T) -> PeerId {
        self.registry.attach(peer)
    }

    /// Runs one poll-loop iteration for this session. Never fails: every
    /// per-peer and per-message fault is absorbed here.
    pub fn on_tick(&mut self) {
        if self.registry.has_pending() {
            if let Ok(payload) = self.snapshot_json() {
                self.registry.deliver_pending_init(&payload);
            }
        }

        let GameSession {
            name,
            engine,
            registry,
            leaderboard,
        } = self;
        let changed = registry.service_inbound(|peer_id, frame| {
            Self::handle_message(name, engine, leaderboard.as_ref(), peer_id, frame)
        });

        if changed {
            if let Ok(payload) = self.snapshot_json() {
                self.registry.broadcast(&payload);
            }
        }
    }

    /// Dispatches one decoded frame. Returns true when the game state (or
    /// the externally visible peer roster) changed.
    fn handle_message(
        name: &str,
        engine: &mut GameEngine,
        leaderboard: Option<&Leaderboard>,
        peer_id: PeerId,
        frame: &str,
    ) -> bool {
        match shared::decode_message(frame) {
            ClientMessage::Ping => false,
            ClientMessage::Reset => {
                info!("{}: reset requested by peer {}", name, peer_id);
                engine.reset();
                true
            }
            // No engine effect, but rebroadcast so peer counts propagate.
            ClientMessage::Join => true,
            ClientMessage::Move(request) => {
                let player = request.player.unwrap_or_else(|| engine.current_player());
                let was_finished = engine.finished();
                let outcome =
                    engine.apply_move(player, request.orientation, request.row, request.col);
                if !outcome.accepted {
                    debug!(
                        "{}: rejected move from peer {} ({:?} {},{} as {:?})",
                        name, peer_id, request.orientation, request.row, request.col, player
                    );
                    return false;
                }
                if !was_finished && engine.finished() {
                    Self::record_result(name, engine, leaderboard);
                }
                true
            }
            ClientMessage::Ignored => {
                debug!("{}: ignored frame from peer {}", name, peer_id);
                false
            }
        }
    }

    /// Submits the winning score once the final box is claimed. A tie
    /// records nothing.
    fn record_result(name: &str, engine: &GameEngine, leaderboard: Option<&Leaderboard>) {
        let Some(winner) = engine.winner() else {
            info!("{}: game finished in a tie", name);
            return;
        };
        let score = engine.score(winner);
        info!(
            "{}: player {} wins with {} boxes",
            name,
            winner.as_wire(),
            score
        );
        if let Some(board) = leaderboard {
            let initials = match winner {
                Player::One => "P1",
                Player::Two => "P2",
            };
            if board.try_submit_score(name, initials, score) {
                info!("{}: leaderboard entry recorded for {}", name, initials);
            }
        }
    }

    fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.engine.snapshot(self.registry.audience_count()))
    }
}
