//! Node orchestration: event loop, transport wiring and the public
//! handle.

use std::collections::HashMap;
use std::sync::Arc;

use roundtable_chain::Blockchain;
use roundtable_config::TurnConfig;
use roundtable_consensus::{spawn_cleanup_tick, Control, NodeEvent, NodeStatus, TurnManager};
use roundtable_crypto::{Keypair, PublicKey};
use roundtable_transport::{Envelope, Transport, TransportError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Mailbox depth; inbound gossip, timers and control requests share it.
const MAILBOX_CAPACITY: usize = 1024;

/// Errors surfaced by the public node API.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The node's event loop has stopped.
    #[error("node terminated")]
    Terminated,

    /// The local broadcast submission failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A running node: the event-loop task plus its supporting tasks.
pub struct Node {
    handle: NodeHandle,
    loop_task: JoinHandle<()>,
    forward_task: JoinHandle<()>,
    cleanup_task: JoinHandle<()>,
}

impl Node {
    /// Starts a node and enters the turn rotation immediately.
    ///
    /// `peers` is the fixed ordered membership shared by the whole group
    /// and must contain `node_id`; `peer_public_keys` carries one key per
    /// peer, this node included. `inbound` is the transport subscription
    /// feeding gossip into the mailbox — subscribe before starting so no
    /// envelope is missed.
    pub fn start<T: Transport>(
        node_id: String,
        peers: Vec<String>,
        keypair: Keypair,
        peer_public_keys: HashMap<String, PublicKey>,
        turn: TurnConfig,
        transport: Arc<T>,
        inbound: broadcast::Receiver<Envelope>,
    ) -> Node {
        let (events, mailbox) = mpsc::channel(MAILBOX_CAPACITY);

        let mut manager = TurnManager::new(
            node_id.clone(),
            peers,
            keypair,
            peer_public_keys,
            turn,
            transport,
            events.clone(),
        );

        let forward_task = spawn_inbound_forwarder(node_id.clone(), inbound, events.clone());
        let cleanup_task = spawn_cleanup_tick(events.clone(), turn.cleanup_interval());

        let loop_task = tokio::spawn(async move {
            let mut mailbox = mailbox;
            manager.start().await;
            while let Some(event) = mailbox.recv().await {
                if !manager.handle(event).await {
                    break;
                }
            }
            debug!("event loop stopped");
        });

        Node {
            handle: NodeHandle { events },
            loop_task,
            forward_task,
            cleanup_task,
        }
    }

    /// A cloneable handle to this node's public operations.
    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    /// Stops the node: the in-flight handler runs to completion, timers
    /// die with the mailbox, and the supporting tasks are torn down.
    pub async fn shutdown(self) {
        let _ = self
            .handle
            .events
            .send(NodeEvent::Control(Control::Shutdown))
            .await;
        let _ = self.loop_task.await;
        self.forward_task.abort();
        self.cleanup_task.abort();
    }
}

/// Cloneable access to a running node's public operations.
///
/// All requests are posted into the node's serialized mailbox and
/// answered over oneshot channels, so observers see the same
/// event-ordering the node itself does.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    events: mpsc::Sender<NodeEvent>,
}

impl NodeHandle {
    /// Authors, signs and broadcasts a chat message, returning its ID.
    ///
    /// Success means the local broadcast was submitted; inclusion in the
    /// chain happens later, during a leader's turn.
    pub async fn send_message(&self, content: String) -> Result<String, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(Control::SendMessage { content, reply }, rx)
            .await?
            .map_err(NodeError::from)
    }

    /// Snapshot of the node's current chain.
    pub async fn get_blockchain(&self) -> Result<Blockchain, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(Control::GetBlockchain { reply }, rx).await
    }

    /// Snapshot of the node's rotation state.
    pub async fn get_state(&self) -> Result<NodeStatus, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(Control::GetState { reply }, rx).await
    }

    async fn request<R>(
        &self,
        control: Control,
        rx: oneshot::Receiver<R>,
    ) -> Result<R, NodeError> {
        self.events
            .send(NodeEvent::Control(control))
            .await
            .map_err(|_| NodeError::Terminated)?;
        rx.await.map_err(|_| NodeError::Terminated)
    }
}

/// Forwards bus envelopes into the mailbox until either side closes.
///
/// A lagged subscription only drops envelopes, matching the best-effort
/// delivery contract; the consensus layer tolerates the gap.
fn spawn_inbound_forwarder(
    node_id: String,
    mut inbound: broadcast::Receiver<Envelope>,
    events: mpsc::Sender<NodeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match inbound.recv().await {
                Ok(Envelope::NewMessage(message)) => {
                    if events.send(NodeEvent::InboundMessage(message)).await.is_err() {
                        break;
                    }
                }
                Ok(Envelope::NewBlock(block)) => {
                    if events.send(NodeEvent::InboundBlock(block)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(node = %node_id, missed, "inbound subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
