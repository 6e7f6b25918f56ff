//! Peer registry for one game session.
//!
//! Tracks the attached peers for a single game instance, split into the
//! active set and the peers still waiting for their first state delivery.
//! All delivery (initial sync, broadcast) and all pruning of dead peers
//! happens here; the session above only decides *what* to send and the
//! transport below only moves bytes.
//!
//! Iteration is in peer-id order, which is attachment order. Within one
//! tick that order decides which of two competing moves wins a contested
//! edge; across ticks no fairness is promised.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use crate::transport::Transport;

/// Registry-assigned peer identifier, unique per session for the lifetime
/// of the process.
pub type PeerId = u32;

pub struct SessionRegistry<T: Transport> {
    peers: BTreeMap<PeerId, T>,
    pending_init: BTreeSet<PeerId>,
    next_peer_id: PeerId,
}

impl<T: Transport> SessionRegistry<T> {
    pub fn new() -> Self {
        SessionRegistry {
            peers: BTreeMap::new(),
            pending_init: BTreeSet::new(),
            next_peer_id: 1,
        }
    }

    /// Adds a peer to the active set and marks it pending its first state
    /// delivery.
    pub fn attach(&mut self, peer: T) -> PeerId {
        let peer_id = self.next_peer_id;
        self.next_peer_id += 1;
        self.peers.insert(peer_id, peer);
        self.pending_init.insert(peer_id);
        info!("Peer {} attached ({} connected)", peer_id, self.peers.len());
        peer_id
    }

    /// Removes a peer from both sets. No-op when the peer is absent.
    pub fn detach(&mut self, peer_id: PeerId) -> bool {
        self.pending_init.remove(&peer_id);
        if self.peers.remove(&peer_id).is_some() {
            info!("Peer {} detached ({} connected)", peer_id, self.peers.len());
            true
        } else {
            false
        }
    }

    /// Closes the transport and removes the peer from every set.
    fn drop_peer(&mut self, peer_id: PeerId) {
        if let Some(mut peer) = self.peers.remove(&peer_id) {
            peer.close();
        }
        self.pending_init.remove(&peer_id);
        info!("Peer {} dropped ({} connected)", peer_id, self.peers.len());
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_init.is_empty()
    }

    /// Broadcast audience: active peers minus the conventionally reserved
    /// dashboard slot. Saturates at zero for an observerless session.
    pub fn audience_count(&self) -> usize {
        self.peers.len().saturating_sub(1)
    }

    /// Sends `payload` once to every peer still pending its initial state.
    ///
    /// Each pending peer gets exactly one attempt, never a retry: pending
    /// membership is cleared whether the send succeeds or fails, and a
    /// failed peer is closed and detached entirely.
    pub fn deliver_pending_init(&mut self, payload: &str) {
        let pending = std::mem::take(&mut self.pending_init);
        for peer_id in pending {
            let Some(peer) = self.peers.get_mut(&peer_id) else {
                continue;
            };
            if peer.send(payload).is_err() {
                debug!("Peer {} lost during initial state delivery", peer_id);
                self.drop_peer(peer_id);
            }
        }
    }

    /// Reads at most one frame from every active peer and hands decodable
    /// frames to `on_message`. Returns true when any callback reported a
    /// state change.
    ///
    /// A read failure closes and detaches only the failing peer; peers
    /// still pending their initial state are not read.
    pub fn service_inbound<F>(&mut self, mut on_message: F) -> bool
    where
        F: FnMut(PeerId, &str) -> bool,
    {
        let peer_ids: Vec<PeerId> = self.peers.keys().copied().collect();
        let mut changed = false;

        for peer_id in peer_ids {
            if self.pending_init.contains(&peer_id) {
                continue;
            }
            let Some(peer) = self.peers.get_mut(&peer_id) else {
                continue;
            };
            match peer.try_receive() {
                Ok(None) => {}
                Ok(Some(frame)) => {
                    if on_message(peer_id, &frame) {
                        changed = true;
                    }
                }
                Err(_) => {
                    self.drop_peer(peer_id);
                }
            }
        }

        changed
    }

    /// Sends `payload` to every active peer. A failed send closes and
    /// detaches that peer without aborting delivery to the rest.
    pub fn broadcast(&mut self, payload: &str) {
        let peer_ids: Vec<PeerId> = self.peers.keys().copied().collect();
        for peer_id in peer_ids {
            let Some(peer) = self.peers.get_mut(&peer_id) else {
                continue;
            };
            if peer.send(payload).is_err() {
                debug!("Peer {} lost during broadcast", peer_id);
                self.drop_peer(peer_id);
            }
        }
    }
}

impl<T: Transport> Default for SessionRegistry<T> {
    fn default() -> Self {
        SessionRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakePeer;

    #[test]
    fn attach_marks_peer_pending() {
        let mut registry = SessionRegistry::new();
        let (peer, _state) = FakePeer::new();

        registry.attach(peer);
        assert_eq!(registry.peer_count(), 1);
        assert!(registry.has_pending());
    }

    #[test]
    fn detach_clears_both_sets_and_tolerates_absence() {
        let mut registry = SessionRegistry::new();
        let (peer, _state) = FakePeer::new();
        let id = registry.attach(peer);

        assert!(registry.detach(id));
        assert_eq!(registry.peer_count(), 0);
        assert!(!registry.has_pending());

        // Absent peer: no-op.
        assert!(!registry.detach(id));
        assert!(!registry.detach(999));
    }

    #[test]
    fn pending_init_delivered_exactly_once() {
        let mut registry = SessionRegistry::new();
        let (peer, state) = FakePeer::new();
        registry.attach(peer);

        registry.deliver_pending_init("snapshot");
        assert_eq!(state.borrow().sent, vec!["snapshot".to_string()]);
        assert!(!registry.has_pending());

        // Second delivery pass finds nothing pending.
        registry.deliver_pending_init("snapshot-2");
        assert_eq!(state.borrow().sent.len(), 1);
    }

    #[test]
    fn failed_init_delivery_drops_peer_without_retry() {
        let mut registry = SessionRegistry::new();
        let (peer, state) = FakePeer::new();
        state.borrow_mut().fail_sends = true;
        registry.attach(peer);

        registry.deliver_pending_init("snapshot");
        assert_eq!(registry.peer_count(), 0);
        assert!(!registry.has_pending());
        assert!(state.borrow().closed);
        assert!(state.borrow().sent.is_empty());
    }

    #[test]
    fn pending_peers_are_not_read() {
        let mut registry = SessionRegistry::new();
        let (peer, state) = FakePeer::new();
        FakePeer::queue(&state, "frame");
        registry.attach(peer);

        let changed = registry.service_inbound(|_, _| panic!("pending peer must not be read"));
        assert!(!changed);
        // The frame is still queued for after init delivery.
        assert_eq!(state.borrow().inbound.len(), 1);
    }

    #[test]
    fn service_inbound_reads_at_most_one_frame_per_peer() {
        let mut registry = SessionRegistry::new();
        let (peer, state) = FakePeer::new();
        FakePeer::queue(&state, "one");
        FakePeer::queue(&state, "two");
        registry.attach(peer);
        registry.deliver_pending_init("init");

        let mut seen = Vec::new();
        registry.service_inbound(|_, frame| {
            seen.push(frame.to_string());
            false
        });
        assert_eq!(seen, vec!["one".to_string()]);

        registry.service_inbound(|_, frame| {
            seen.push(frame.to_string());
            false
        });
        assert_eq!(seen, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn read_failure_drops_only_the_failing_peer() {
        let mut registry = SessionRegistry::new();
        let (dead, dead_state) = FakePeer::new();
        let (alive, alive_state) = FakePeer::new();
        FakePeer::queue_failure(&dead_state);
        FakePeer::queue(&alive_state, "hello");

        registry.attach(dead);
        registry.attach(alive);
        registry.deliver_pending_init("init");

        let mut frames = 0;
        registry.service_inbound(|_, _| {
            frames += 1;
            false
        });

        assert_eq!(frames, 1);
        assert_eq!(registry.peer_count(), 1);
        assert!(dead_state.borrow().closed);
        assert!(!alive_state.borrow().closed);
    }

    #[test]
    fn change_signals_aggregate_across_peers() {
        let mut registry = SessionRegistry::new();
        let (a, a_state) = FakePeer::new();
        let (b, b_state) = FakePeer::new();
        FakePeer::queue(&a_state, "noop");
        FakePeer::queue(&b_state, "mutation");
        registry.attach(a);
        registry.attach(b);
        registry.deliver_pending_init("init");

        let changed = registry.service_inbound(|_, frame| frame == "mutation");
        assert!(changed);
    }

    #[test]
    fn service_order_follows_attachment_order() {
        let mut registry = SessionRegistry::new();
        let (a, a_state) = FakePeer::new();
        let (b, b_state) = FakePeer::new();
        FakePeer::queue(&a_state, "from-a");
        FakePeer::queue(&b_state, "from-b");
        let id_a = registry.attach(a);
        let id_b = registry.attach(b);
        registry.deliver_pending_init("init");

        let mut order = Vec::new();
        registry.service_inbound(|peer_id, _| {
            order.push(peer_id);
            false
        });
        assert_eq!(order, vec![id_a, id_b]);
    }

    #[test]
    fn broadcast_reaches_all_and_survives_one_failure() {
        let mut registry = SessionRegistry::new();
        let (a, a_state) = FakePeer::new();
        let (dead, dead_state) = FakePeer::new();
        let (b, b_state) = FakePeer::new();
        dead_state.borrow_mut().fail_sends = true;

        registry.attach(a);
        registry.attach(dead);
        registry.attach(b);
        registry.deliver_pending_init("init");

        registry.broadcast("update");

        assert_eq!(a_state.borrow().sent.last().unwrap(), "update");
        assert_eq!(b_state.borrow().sent.last().unwrap(), "update");
        assert!(dead_state.borrow().closed);
        assert_eq!(registry.peer_count(), 2);

        // The dead peer never sees later broadcasts.
        registry.broadcast("again");
        assert_eq!(
            dead_state
                .borrow()
                .sent
                .iter()
                .filter(|p| *p == "again")
                .count(),
            0
        );
    }

    #[test]
    fn audience_count_reserves_one_slot() {
        let mut registry: SessionRegistry<FakePeer> = SessionRegistry::new();
        assert_eq!(registry.audience_count(), 0);

        let (a, _sa) = FakePeer::new();
        registry.attach(a);
        assert_eq!(registry.audience_count(), 0);

        let (b, _sb) = FakePeer::new();
        registry.attach(b);
        assert_eq!(registry.audience_count(), 1);
    }
}
