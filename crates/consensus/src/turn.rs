//! The turn-rotation state machine.

use std::collections::HashMap;
use std::sync::Arc;

use roundtable_chain::Blockchain;
use roundtable_config::TurnConfig;
use roundtable_crypto::{Keypair, PublicKey};
use roundtable_pool::MessagePool;
use roundtable_transport::{Envelope, Transport};
use roundtable_types::{now_ms, Block, Message};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::event::{Control, NodeEvent};
use crate::timer::TurnTimers;

/// Where a node currently stands in the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Another peer holds the turn
    Waiting,
    /// This node holds the turn and may append blocks
    Leading,
    /// Quiescent handover between turns
    Transition,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Waiting => write!(f, "waiting"),
            Phase::Leading => write!(f, "leading"),
            Phase::Transition => write!(f, "transition"),
        }
    }
}

/// Snapshot of a node's rotation state, as reported by `get_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// This node's identifier
    pub node_id: String,
    /// Current phase
    pub phase: Phase,
    /// Peer currently authorized to append blocks
    pub current_leader: String,
    /// Local chain length, genesis included
    pub blockchain_length: usize,
    /// Pool messages not yet committed
    pub pending_messages: usize,
}

/// Per-node rotation state machine.
///
/// Owns the node's chain, pool, identity and timers, and folds
/// [`NodeEvent`]s over them. Runs inside a single-consumer event loop, so
/// no locking: one event mutates state to completion before the next.
pub struct TurnManager<T: Transport> {
    node_id: String,
    peers: Vec<String>,
    leader_index: usize,
    phase: Phase,
    turn_start_time: u64,
    chain: Blockchain,
    pool: MessagePool,
    keypair: Keypair,
    peer_public_keys: HashMap<String, PublicKey>,
    timers: TurnTimers,
    transport: Arc<T>,
    config: TurnConfig,
}

impl<T: Transport> TurnManager<T> {
    /// Creates a manager in its pre-start state.
    ///
    /// `events` is the node's own mailbox sender; timers post expiries
    /// back through it. Every node starts from `leader_index = 0`, so the
    /// group agrees on the first leader by construction.
    pub fn new(
        node_id: String,
        peers: Vec<String>,
        keypair: Keypair,
        peer_public_keys: HashMap<String, PublicKey>,
        config: TurnConfig,
        transport: Arc<T>,
        events: mpsc::Sender<NodeEvent>,
    ) -> Self {
        Self {
            node_id,
            peers,
            leader_index: 0,
            phase: Phase::Waiting,
            turn_start_time: 0,
            chain: Blockchain::new(),
            pool: MessagePool::new(),
            keypair,
            peer_public_keys,
            timers: TurnTimers::new(events),
            transport,
            config,
        }
    }

    /// The peer currently authorized to append blocks.
    pub fn current_leader(&self) -> &str {
        &self.peers[self.leader_index]
    }

    /// Whether this node is the current leader.
    pub fn is_leader(&self) -> bool {
        self.current_leader() == self.node_id
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Read access to the local chain.
    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    /// Read access to the local pool.
    pub fn pool(&self) -> &MessagePool {
        &self.pool
    }

    /// Snapshot of the rotation state.
    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            node_id: self.node_id.clone(),
            phase: self.phase,
            current_leader: self.current_leader().to_string(),
            blockchain_length: self.chain.len(),
            pending_messages: self.pool.pending_count(),
        }
    }

    /// Enters the first turn. Called once before the event loop starts.
    pub async fn start(&mut self) {
        info!(
            node = %self.node_id,
            peers = self.peers.len(),
            leader = %self.current_leader(),
            "starting turn rotation"
        );
        self.enter_turn().await;
    }

    /// Folds one mailbox event. Returns `false` when the loop should
    /// stop.
    pub async fn handle(&mut self, event: NodeEvent) -> bool {
        match event {
            NodeEvent::InboundMessage(message) => self.on_message(message),
            NodeEvent::InboundBlock(block) => self.on_block(block),
            NodeEvent::TurnTimeout { generation } => self.on_turn_timeout(generation).await,
            NodeEvent::TransitionTimeout { generation } => {
                self.on_transition_timeout(generation).await
            }
            NodeEvent::Cleanup => self.on_cleanup(),
            NodeEvent::Control(control) => return self.on_control(control).await,
        }
        true
    }

    /// Begins a turn window. Every node arms the turn timer; the leader
    /// additionally heals the log before it may produce fresh content.
    async fn enter_turn(&mut self) {
        if self.is_leader() {
            self.recover_lost_messages().await;
            self.timers.arm_turn_timeout(self.config.turn_duration());
            self.turn_start_time = now_ms();
            self.phase = Phase::Leading;
            info!(node = %self.node_id, chain_len = self.chain.len(), "taking turn as leader");
        } else {
            self.timers.arm_turn_timeout(self.config.turn_duration());
            self.turn_start_time = now_ms();
            self.phase = Phase::Waiting;
            debug!(node = %self.node_id, leader = %self.current_leader(), "waiting out turn");
        }
    }

    /// New-leader recovery scan: commit every message observed during the
    /// previous turn window that the chain never saw.
    ///
    /// The committed set is taken from the entire chain rather than the
    /// previous turn's blocks, so a message recovered by an earlier
    /// leader is never re-included by a later one.
    async fn recover_lost_messages(&mut self) {
        let committed = self.chain.committed_message_ids();
        let window_end = now_ms();
        let window_start = window_end.saturating_sub(self.config.recovery_window_ms());

        let missing: Vec<Message> = self
            .pool
            .messages_in_time_range(window_start, window_end)
            .into_iter()
            .filter(|m| !committed.contains(&m.message_id))
            .cloned()
            .collect();

        if missing.is_empty() {
            debug!(node = %self.node_id, "recovery scan found nothing missing");
            return;
        }

        let note = format!("recovered {} message(s) from previous turn", missing.len());
        let block = Block::new_recovery_block(
            self.chain.latest(),
            missing.clone(),
            note,
            self.node_id.clone(),
            &self.keypair,
        );

        match self.chain.add_block(block.clone()) {
            Ok(()) => {
                for message in &missing {
                    self.pool.mark_included(&message.message_id);
                }
                info!(
                    node = %self.node_id,
                    recovered = missing.len(),
                    index = block.index,
                    "committed lost-message recovery block"
                );
                self.broadcast_block(block).await;
            }
            Err(e) => warn!(node = %self.node_id, error = %e, "recovery block rejected locally"),
        }
    }

    /// End of the leader's turn: drain the pending pool snapshot into one
    /// singleton chat block per message, then hand over.
    async fn on_turn_timeout(&mut self, generation: u64) {
        if generation != self.timers.generation() {
            trace!(generation, current = self.timers.generation(), "stale turn timeout");
            return;
        }
        if self.phase == Phase::Leading {
            self.publish_pending_messages().await;
        }
        self.timers
            .arm_transition_timeout(self.config.transition_duration());
        self.phase = Phase::Transition;
        debug!(node = %self.node_id, "entering transition");
    }

    /// Publishes every pending pool message, in seen order, as its own
    /// `chat_message` block.
    async fn publish_pending_messages(&mut self) {
        let pending: Vec<Message> = self.pool.pending().into_iter().cloned().collect();
        if pending.is_empty() {
            debug!(node = %self.node_id, "turn ended with nothing to publish");
            return;
        }

        let count = pending.len();
        for message in pending {
            let message_id = message.message_id.clone();
            let block = Block::new_message_block(
                self.chain.latest(),
                message,
                self.node_id.clone(),
                &self.keypair,
            );
            match self.chain.add_block(block.clone()) {
                Ok(()) => {
                    self.pool.mark_included(&message_id);
                    self.broadcast_block(block).await;
                }
                Err(e) => {
                    warn!(node = %self.node_id, error = %e, "locally built block rejected")
                }
            }
        }
        info!(node = %self.node_id, published = count, chain_len = self.chain.len(), "drained pending messages");
    }

    /// End of the transition: rotate the leader index and begin the next
    /// turn.
    async fn on_transition_timeout(&mut self, generation: u64) {
        if generation != self.timers.generation() {
            trace!(generation, current = self.timers.generation(), "stale transition timeout");
            return;
        }
        self.leader_index = (self.leader_index + 1) % self.peers.len();
        info!(
            node = %self.node_id,
            leader = %self.current_leader(),
            "rotating leadership"
        );
        self.enter_turn().await;
    }

    /// Inbound `messages` topic: verify authorship, then pool.
    fn on_message(&mut self, message: Message) {
        let Some(public_key) = self.peer_public_keys.get(&message.author_id) else {
            warn!(author = %message.author_id, "dropping message from unknown author");
            return;
        };
        if !message.verify(public_key) {
            warn!(
                author = %message.author_id,
                message_id = %message.message_id,
                "dropping message with bad signature"
            );
            return;
        }
        self.pool.add(message);
    }

    /// Inbound `blocks` topic: verify the producer signature, then
    /// attempt a structural append. Committed message IDs are marked in
    /// the pool on success; failures drop the block with no retry and no
    /// buffering of future-index blocks.
    fn on_block(&mut self, block: Block) {
        let Some(public_key) = self.peer_public_keys.get(&block.author_id) else {
            warn!(author = %block.author_id, index = block.index, "dropping block from unknown producer");
            return;
        };
        if !block.verify_signature(public_key) {
            warn!(author = %block.author_id, index = block.index, "dropping block with bad signature");
            return;
        }
        let ids: Vec<String> = block.message_ids().iter().map(|s| s.to_string()).collect();
        match self.chain.add_block(block) {
            Ok(()) => {
                for id in ids {
                    self.pool.mark_included(&id);
                }
            }
            Err(e) => {
                // Duplicate deliveries of the head land here too; the
                // chain is unchanged either way.
                warn!(node = %self.node_id, error = %e, "dropping block");
            }
        }
    }

    /// Periodic retention sweep.
    fn on_cleanup(&mut self) {
        let evicted = self.pool.cleanup(self.config.message_retention_ms);
        if evicted > 0 {
            debug!(node = %self.node_id, evicted, "pool cleanup");
        }
    }

    /// Local control requests. Returns `false` on shutdown.
    async fn on_control(&mut self, control: Control) -> bool {
        match control {
            Control::SendMessage { content, reply } => {
                let message = Message::create(content, self.node_id.clone(), &self.keypair);
                let message_id = message.message_id.clone();
                self.pool.add(message.clone());
                let result = self
                    .transport
                    .broadcast(Envelope::NewMessage(message))
                    .await
                    .map(|_| message_id);
                if let Err(e) = &result {
                    warn!(node = %self.node_id, error = %e, "message broadcast failed");
                }
                let _ = reply.send(result);
                true
            }
            Control::GetBlockchain { reply } => {
                let _ = reply.send(self.chain.clone());
                true
            }
            Control::GetState { reply } => {
                let _ = reply.send(self.status());
                true
            }
            Control::Shutdown => {
                info!(node = %self.node_id, "shutting down");
                self.timers.cancel();
                false
            }
        }
    }

    async fn broadcast_block(&self, block: Block) {
        if let Err(e) = self.transport.broadcast(Envelope::NewBlock(block)).await {
            warn!(node = %self.node_id, error = %e, "block broadcast failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_transport::MemoryBus;
    use roundtable_types::BlockType;

    struct Harness {
        manager: TurnManager<MemoryBus>,
        bus: MemoryBus,
        keypairs: HashMap<String, Keypair>,
        _mailbox: mpsc::Receiver<NodeEvent>,
    }

    /// Builds a manager for `node_id` in a three-peer group with
    /// deterministic identities.
    fn harness(node_id: &str) -> Harness {
        let peers = vec!["alice".to_string(), "bob".to_string(), "carol".to_string()];
        let mut keypairs = HashMap::new();
        let mut peer_public_keys = HashMap::new();
        for (i, peer) in peers.iter().enumerate() {
            let keypair = Keypair::from_seed(&[i as u8 + 1; 32]);
            peer_public_keys.insert(peer.clone(), keypair.public_key());
            keypairs.insert(peer.clone(), keypair);
        }

        let bus = MemoryBus::new();
        let (events, mailbox) = mpsc::channel(64);
        let keypair = Keypair::from_seed(&[peers.iter().position(|p| p == node_id).unwrap() as u8 + 1; 32]);
        let manager = TurnManager::new(
            node_id.to_string(),
            peers,
            keypair,
            peer_public_keys,
            TurnConfig::fast(),
            Arc::new(bus.clone()),
            events,
        );
        Harness {
            manager,
            bus,
            keypairs,
            _mailbox: mailbox,
        }
    }

    fn signed_message(harness: &Harness, author: &str, content: &str) -> Message {
        Message::create(content.into(), author.into(), &harness.keypairs[author])
    }

    #[tokio::test]
    async fn test_initial_leader_and_follower_phases() {
        let mut alice = harness("alice");
        alice.manager.start().await;
        assert_eq!(alice.manager.phase(), Phase::Leading);
        assert!(alice.manager.is_leader());

        let mut bob = harness("bob");
        bob.manager.start().await;
        assert_eq!(bob.manager.phase(), Phase::Waiting);
        assert_eq!(bob.manager.current_leader(), "alice");
    }

    #[tokio::test]
    async fn test_unknown_author_and_bad_signature_dropped() {
        let mut h = harness("alice");
        h.manager.start().await;

        // Unknown author.
        let stranger = Keypair::from_seed(&[99u8; 32]);
        let forged = Message::create("hi".into(), "mallory".into(), &stranger);
        h.manager.handle(NodeEvent::InboundMessage(forged.clone())).await;
        assert!(!h.manager.pool().has(&forged.message_id));

        // Known author, wrong key.
        let impersonated = Message::create("hi".into(), "bob".into(), &stranger);
        h.manager
            .handle(NodeEvent::InboundMessage(impersonated.clone()))
            .await;
        assert!(!h.manager.pool().has(&impersonated.message_id));

        // Valid message pools.
        let valid = signed_message(&h, "bob", "hello");
        h.manager.handle(NodeEvent::InboundMessage(valid.clone())).await;
        assert!(h.manager.pool().has(&valid.message_id));
    }

    #[tokio::test]
    async fn test_turn_timeout_drains_pending_in_seen_order() {
        let mut h = harness("alice");
        h.manager.start().await;

        let first = signed_message(&h, "bob", "first");
        let second = signed_message(&h, "carol", "second");
        h.manager.handle(NodeEvent::InboundMessage(first.clone())).await;
        h.manager.handle(NodeEvent::InboundMessage(second.clone())).await;
        // Pin distinct seen-at stamps: both arrivals can land in the same
        // millisecond, which would leave the drain order to the ID
        // tie-break.
        h.manager.pool.add_at(first.clone(), 1_000);
        h.manager.pool.add_at(second.clone(), 2_000);

        let generation = h.manager.timers.generation();
        h.manager.handle(NodeEvent::TurnTimeout { generation }).await;

        // Two singleton chat blocks, authored by the leader, in order.
        assert_eq!(h.manager.chain().len(), 3);
        assert_eq!(h.manager.phase(), Phase::Transition);
        let blocks = h.manager.chain().chronological();
        assert_eq!(blocks[1].block_type, BlockType::ChatMessage);
        assert_eq!(blocks[1].author_id, "alice");
        assert_eq!(blocks[1].message_ids(), vec![first.message_id.as_str()]);
        assert_eq!(blocks[2].message_ids(), vec![second.message_id.as_str()]);

        // Both marked included; nothing pending.
        assert_eq!(h.manager.pool().pending_count(), 0);
        assert!(h.manager.pool().is_included(&first.message_id));
    }

    #[tokio::test]
    async fn test_stale_turn_timeout_is_ignored() {
        let mut h = harness("alice");
        h.manager.start().await;

        let msg = signed_message(&h, "bob", "hello");
        h.manager.handle(NodeEvent::InboundMessage(msg)).await;

        let stale = h.manager.timers.generation() - 1;
        h.manager.handle(NodeEvent::TurnTimeout { generation: stale }).await;

        // Nothing drained, phase unchanged.
        assert_eq!(h.manager.chain().len(), 1);
        assert_eq!(h.manager.phase(), Phase::Leading);
    }

    #[tokio::test]
    async fn test_transition_rotates_leadership_and_wraps() {
        let mut h = harness("bob");
        h.manager.start().await;
        assert_eq!(h.manager.current_leader(), "alice");

        // alice -> bob: this node leads.
        let generation = h.manager.timers.generation();
        h.manager.handle(NodeEvent::TurnTimeout { generation }).await;
        let generation = h.manager.timers.generation();
        h.manager
            .handle(NodeEvent::TransitionTimeout { generation })
            .await;
        assert_eq!(h.manager.current_leader(), "bob");
        assert_eq!(h.manager.phase(), Phase::Leading);

        // bob -> carol -> alice: wraps around the ordered list.
        for expected in ["carol", "alice"] {
            let generation = h.manager.timers.generation();
            h.manager.handle(NodeEvent::TurnTimeout { generation }).await;
            let generation = h.manager.timers.generation();
            h.manager
                .handle(NodeEvent::TransitionTimeout { generation })
                .await;
            assert_eq!(h.manager.current_leader(), expected);
        }
    }

    #[tokio::test]
    async fn test_new_leader_recovers_uncommitted_messages_once() {
        let mut h = harness("bob");
        h.manager.start().await;

        // Observed during alice's turn, never committed (alice is mute).
        let lost = signed_message(&h, "carol", "lost");
        h.manager.handle(NodeEvent::InboundMessage(lost.clone())).await;

        // Rotate into bob's turn; the recovery scan runs on entry.
        let generation = h.manager.timers.generation();
        h.manager.handle(NodeEvent::TurnTimeout { generation }).await;
        let generation = h.manager.timers.generation();
        h.manager
            .handle(NodeEvent::TransitionTimeout { generation })
            .await;

        assert!(h.manager.is_leader());
        assert_eq!(h.manager.chain().len(), 2);
        let head = h.manager.chain().latest();
        assert_eq!(head.block_type, BlockType::LostMessageRecovery);
        assert_eq!(head.author_id, "bob");
        assert_eq!(head.message_ids(), vec![lost.message_id.as_str()]);
        assert!(h.manager.pool().is_included(&lost.message_id));

        // The recovered message never resurfaces: bob's own drain has
        // nothing, and a full rotation back to bob recovers nothing new.
        let generation = h.manager.timers.generation();
        h.manager.handle(NodeEvent::TurnTimeout { generation }).await;
        assert_eq!(h.manager.chain().len(), 2);
        for _ in 0..3 {
            let generation = h.manager.timers.generation();
            h.manager
                .handle(NodeEvent::TransitionTimeout { generation })
                .await;
            let generation = h.manager.timers.generation();
            h.manager.handle(NodeEvent::TurnTimeout { generation }).await;
        }
        assert_eq!(h.manager.chain().len(), 2);
    }

    #[tokio::test]
    async fn test_inbound_block_appends_and_marks_included() {
        let mut bob = harness("bob");
        bob.manager.start().await;

        let msg = signed_message(&bob, "carol", "hello");
        bob.manager.handle(NodeEvent::InboundMessage(msg.clone())).await;

        // Block produced by alice, the current leader.
        let block = Block::new_message_block(
            bob.manager.chain().latest(),
            msg.clone(),
            "alice".into(),
            &bob.keypairs["alice"],
        );
        bob.manager.handle(NodeEvent::InboundBlock(block.clone())).await;

        assert_eq!(bob.manager.chain().len(), 2);
        assert!(bob.manager.pool().is_included(&msg.message_id));
        assert_eq!(bob.manager.pool().pending_count(), 0);

        // Duplicate delivery is a structural no-op.
        bob.manager.handle(NodeEvent::InboundBlock(block)).await;
        assert_eq!(bob.manager.chain().len(), 2);
    }

    #[tokio::test]
    async fn test_inbound_block_with_bad_signature_dropped() {
        let mut bob = harness("bob");
        bob.manager.start().await;

        let msg = signed_message(&bob, "carol", "hello");
        // Authored as alice but signed with carol's key.
        let forged = Block::new_message_block(
            bob.manager.chain().latest(),
            msg,
            "alice".into(),
            &bob.keypairs["carol"],
        );
        bob.manager.handle(NodeEvent::InboundBlock(forged)).await;
        assert_eq!(bob.manager.chain().len(), 1);
    }

    #[tokio::test]
    async fn test_send_message_pools_broadcasts_and_replies() {
        let mut h = harness("alice");
        h.manager.start().await;
        let mut inbound = h.bus.subscribe();

        let (reply, rx) = tokio::sync::oneshot::channel();
        h.manager
            .handle(NodeEvent::Control(Control::SendMessage {
                content: "hi".into(),
                reply,
            }))
            .await;

        let message_id = rx.await.unwrap().unwrap();
        assert!(h.manager.pool().has(&message_id));
        assert_eq!(h.manager.pool().pending_count(), 1);

        match inbound.recv().await.unwrap() {
            Envelope::NewMessage(message) => {
                assert_eq!(message.message_id, message_id);
                assert_eq!(message.author_id, "alice");
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_state_reports_rotation() {
        let mut h = harness("carol");
        h.manager.start().await;

        let (reply, rx) = tokio::sync::oneshot::channel();
        h.manager
            .handle(NodeEvent::Control(Control::GetState { reply }))
            .await;
        let status = rx.await.unwrap();
        assert_eq!(status.node_id, "carol");
        assert_eq!(status.phase, Phase::Waiting);
        assert_eq!(status.current_leader, "alice");
        assert_eq!(status.blockchain_length, 1);
        assert_eq!(status.pending_messages, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let mut h = harness("alice");
        h.manager.start().await;
        assert!(!h.manager.handle(NodeEvent::Control(Control::Shutdown)).await);
    }

    #[tokio::test]
    async fn test_cleanup_evicts_expired_entries() {
        let mut h = harness("alice");
        h.manager.start().await;

        // An entry far older than the fast retention window.
        let old = signed_message(&h, "bob", "ancient");
        h.manager.pool.add_at(old.clone(), now_ms().saturating_sub(60_000));
        let fresh = signed_message(&h, "bob", "fresh");
        h.manager.handle(NodeEvent::InboundMessage(fresh.clone())).await;

        h.manager.handle(NodeEvent::Cleanup).await;
        assert!(!h.manager.pool().has(&old.message_id));
        assert!(h.manager.pool().has(&fresh.message_id));
    }
}
