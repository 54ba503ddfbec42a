//! Timer plumbing for the rotation clock.
//!
//! Two one-shot timers (`turn_timeout`, `transition_timeout`) and one
//! repeating tick (`cleanup`) post events into the node's mailbox.
//! Cancellation is by generation: arming any timer bumps a counter baked
//! into the posted event, and the manager ignores expiries whose
//! generation no longer matches. A superseded sleep still fires, but its
//! event is stale on arrival.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::event::NodeEvent;

/// One-shot turn and transition timers with generation-based
/// cancellation.
#[derive(Debug)]
pub struct TurnTimers {
    events: mpsc::Sender<NodeEvent>,
    generation: u64,
}

impl TurnTimers {
    /// Creates timers posting into `events`.
    pub fn new(events: mpsc::Sender<NodeEvent>) -> Self {
        Self {
            events,
            generation: 0,
        }
    }

    /// The generation of the most recently armed timer. An expiry event
    /// is current iff it carries this value.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidates any outstanding one-shot without arming a new one.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }

    /// Arms the turn timer. Any previously armed one-shot becomes stale.
    pub fn arm_turn_timeout(&mut self, duration: Duration) -> u64 {
        self.arm(duration, |generation| NodeEvent::TurnTimeout { generation })
    }

    /// Arms the transition timer. Any previously armed one-shot becomes
    /// stale.
    pub fn arm_transition_timeout(&mut self, duration: Duration) -> u64 {
        self.arm(duration, |generation| NodeEvent::TransitionTimeout {
            generation,
        })
    }

    fn arm(&mut self, duration: Duration, make_event: fn(u64) -> NodeEvent) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let events = self.events.clone();
        trace!(generation, ?duration, "arming timer");
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // A send failure only means the mailbox is gone; the loop is
            // shutting down and the expiry is moot.
            let _ = events.send(make_event(generation)).await;
        });
        generation
    }
}

/// Spawns the repeating cleanup tick, posting [`NodeEvent::Cleanup`]
/// every `interval` until the mailbox closes.
pub fn spawn_cleanup_tick(
    events: mpsc::Sender<NodeEvent>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick of a tokio interval fires immediately; skip it
        // so the sweep runs on the configured cadence.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if events.send(NodeEvent::Cleanup).await.is_err() {
                break;
            }
        }
    })
}
