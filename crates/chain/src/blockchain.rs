//! The append-only block sequence and its query helpers.

use std::collections::HashSet;

use roundtable_types::Block;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when mutating a chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The block does not structurally extend the current head: its
    /// index, linkage or hash does not match.
    #[error("invalid block structure at index {index}")]
    InvalidBlockStructure {
        /// Index claimed by the rejected block
        index: u64,
    },

    /// A replacement chain was not longer than the current one.
    #[error("replacement chain not longer: {candidate} <= {current}")]
    NotLonger {
        /// Length of the candidate chain
        candidate: usize,
        /// Length of the current chain
        current: usize,
    },

    /// A replacement chain failed pairwise validation.
    #[error("replacement chain is invalid")]
    InvalidChain,
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// An ordered block sequence starting at genesis, head at the tail.
///
/// Cloning snapshots the chain; all queries are pure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blockchain {
    blocks: Vec<Block>,
}

impl Blockchain {
    /// Creates a chain containing only the genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// The newest block.
    pub fn latest(&self) -> &Block {
        // The vector always holds at least genesis.
        self.blocks.last().expect("chain never empty")
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; a chain holds at least genesis.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Validates `block` against the current head and appends it.
    pub fn add_block(&mut self, block: Block) -> ChainResult<()> {
        if !block.is_valid_successor(self.latest()) {
            return Err(ChainError::InvalidBlockStructure { index: block.index });
        }
        debug!(
            index = block.index,
            block_type = %block.block_type,
            author = %block.author_id,
            "appending block"
        );
        self.blocks.push(block);
        Ok(())
    }

    /// Blocks in chain order, genesis first.
    pub fn chronological(&self) -> &[Block] {
        &self.blocks
    }

    /// Looks a block up by its chain index.
    pub fn get_by_index(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    /// The newest `n` blocks, oldest of them first.
    pub fn last_n(&self, n: usize) -> &[Block] {
        let start = self.blocks.len().saturating_sub(n);
        &self.blocks[start..]
    }

    /// Blocks whose timestamp falls in `[start, end]`, inclusive.
    pub fn blocks_in_time_range(&self, start: u64, end: u64) -> Vec<&Block> {
        self.blocks
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect()
    }

    /// Blocks produced within one turn duration of the newest block:
    /// `timestamp ∈ [latest.timestamp − turn_duration_ms, latest.timestamp]`.
    pub fn blocks_from_previous_turn(&self, turn_duration_ms: u64) -> Vec<&Block> {
        let end = self.latest().timestamp;
        let start = end.saturating_sub(turn_duration_ms);
        self.blocks_in_time_range(start, end)
    }

    /// Collects the IDs of every message committed by `blocks`, from both
    /// `chat_message` and `lost_message_recovery` payloads.
    pub fn extract_message_ids<'a>(
        blocks: impl IntoIterator<Item = &'a Block>,
    ) -> HashSet<String> {
        blocks
            .into_iter()
            .flat_map(|b| b.message_ids())
            .map(str::to_string)
            .collect()
    }

    /// IDs of every message committed anywhere on this chain.
    pub fn committed_message_ids(&self) -> HashSet<String> {
        Self::extract_message_ids(self.blocks.iter())
    }

    /// Pairwise structural validity of the whole chain, genesis anchor
    /// included.
    pub fn is_valid_chain(&self) -> bool {
        let Some(genesis) = self.blocks.first() else {
            return false;
        };
        if *genesis != Block::genesis() {
            return false;
        }
        self.blocks
            .windows(2)
            .all(|pair| pair[1].is_valid_successor(&pair[0]))
    }

    /// Adopts `candidate` if it is strictly longer and fully valid.
    ///
    /// Fork-resolution hook for a future chain-sync protocol; the event
    /// loop does not call it today, so two diverged nodes keep rejecting
    /// each other's blocks rather than self-healing.
    pub fn replace_chain(&mut self, candidate: Blockchain) -> ChainResult<()> {
        if candidate.len() <= self.len() {
            return Err(ChainError::NotLonger {
                candidate: candidate.len(),
                current: self.len(),
            });
        }
        if !candidate.is_valid_chain() {
            return Err(ChainError::InvalidChain);
        }
        debug!(
            old_len = self.len(),
            new_len = candidate.len(),
            "replacing chain"
        );
        self.blocks = candidate.blocks;
        Ok(())
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}
