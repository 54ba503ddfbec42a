//! The observed-message pool.

use std::collections::{HashMap, HashSet};

use roundtable_types::{now_ms, Message};
use tracing::{debug, trace};

/// A pooled message with the time the local node first saw it.
#[derive(Debug, Clone)]
struct PoolEntry {
    message: Message,
    seen_at: u64,
}

/// Per-node set of observed messages keyed by `message_id`, with a
/// committed-set tracking which of them have been seen in blocks.
#[derive(Debug, Clone, Default)]
pub struct MessagePool {
    messages: HashMap<String, PoolEntry>,
    seen_in_blocks: HashSet<String>,
}

/// Counters describing the pool's current contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total entries currently held
    pub total: usize,
    /// Entries not yet committed to the chain
    pub pending: usize,
    /// Message IDs known to have been committed
    pub included: usize,
}

impl MessagePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observed message, stamped with the current time.
    ///
    /// Idempotent on repeats: re-adding a message replaces the prior
    /// entry under the same ID, so duplicate deliveries leave the pool
    /// observably unchanged apart from the seen-at refresh.
    pub fn add(&mut self, message: Message) {
        self.add_at(message, now_ms());
    }

    /// Adds an observed message with an explicit seen-at stamp.
    ///
    /// Used by replay tooling and tests that need deterministic windows.
    pub fn add_at(&mut self, message: Message, seen_at: u64) {
        trace!(message_id = %message.message_id, author = %message.author_id, "pooling message");
        self.messages
            .insert(message.message_id.clone(), PoolEntry { message, seen_at });
    }

    /// Records that a block committing `message_id` has been appended.
    pub fn mark_included(&mut self, message_id: &str) {
        self.seen_in_blocks.insert(message_id.to_string());
    }

    /// Whether the pool holds an entry for `message_id`.
    pub fn has(&self, message_id: &str) -> bool {
        self.messages.contains_key(message_id)
    }

    /// Whether `message_id` is known to have been committed.
    pub fn is_included(&self, message_id: &str) -> bool {
        self.seen_in_blocks.contains(message_id)
    }

    /// Looks a pooled message up by ID.
    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages.get(message_id).map(|e| &e.message)
    }

    /// Messages not yet seen in any block, ordered by `(seen_at,
    /// message_id)` so the end-of-turn drain is deterministic.
    pub fn pending(&self) -> Vec<&Message> {
        let mut entries: Vec<&PoolEntry> = self
            .messages
            .values()
            .filter(|e| !self.seen_in_blocks.contains(&e.message.message_id))
            .collect();
        entries.sort_by(|a, b| {
            (a.seen_at, &a.message.message_id).cmp(&(b.seen_at, &b.message.message_id))
        });
        entries.into_iter().map(|e| &e.message).collect()
    }

    /// Number of messages not yet seen in any block.
    pub fn pending_count(&self) -> usize {
        self.messages
            .keys()
            .filter(|id| !self.seen_in_blocks.contains(*id))
            .count()
    }

    /// Messages first seen within `[start, end]`, inclusive, in
    /// `(seen_at, message_id)` order.
    pub fn messages_in_time_range(&self, start: u64, end: u64) -> Vec<&Message> {
        let mut entries: Vec<&PoolEntry> = self
            .messages
            .values()
            .filter(|e| e.seen_at >= start && e.seen_at <= end)
            .collect();
        entries.sort_by(|a, b| {
            (a.seen_at, &a.message.message_id).cmp(&(b.seen_at, &b.message.message_id))
        });
        entries.into_iter().map(|e| &e.message).collect()
    }

    /// Messages first seen within the window that are not known to have
    /// been committed — the new leader's recovery candidates.
    pub fn find_missing(&self, start: u64, end: u64) -> Vec<&Message> {
        self.messages_in_time_range(start, end)
            .into_iter()
            .filter(|m| !self.seen_in_blocks.contains(&m.message_id))
            .collect()
    }

    /// Evicts entries first seen before `now − retention_ms`, regardless
    /// of inclusion status. Returns the number of entries evicted.
    ///
    /// Inclusion marks survive eviction: a duplicate delivery arriving
    /// after its entry expired must not resurface as pending, or the next
    /// drain would commit the message a second time.
    pub fn cleanup(&mut self, retention_ms: u64) -> usize {
        let cutoff = now_ms().saturating_sub(retention_ms);
        let before = self.messages.len();
        self.messages.retain(|_, e| e.seen_at >= cutoff);
        let evicted = before - self.messages.len();
        if evicted > 0 {
            debug!(
                evicted,
                remaining = self.messages.len(),
                "evicted expired pool entries"
            );
        }
        evicted
    }

    /// Total entries currently held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the pool holds no entries.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Current pool counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            total: self.messages.len(),
            pending: self.pending_count(),
            included: self.seen_in_blocks.len(),
        }
    }
}
