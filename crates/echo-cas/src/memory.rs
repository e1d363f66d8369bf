// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory content-addressed block store.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{BlockStore, CasError, Cid};

/// In-memory content-addressed block store.
///
/// Stores blocks in a `HashMap<Cid, Arc<[u8]>>`. An optional byte budget is
/// advisory: `put` always succeeds but
/// [`is_over_budget`](MemoryTier::is_over_budget) reports when the budget is
/// exceeded.
pub struct MemoryTier {
    blocks: HashMap<Cid, Arc<[u8]>>,
    byte_count: usize,
    max_bytes: Option<usize>,
}

impl MemoryTier {
    /// Create an empty store with no byte limit.
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new(),
            byte_count: 0,
            max_bytes: None,
        }
    }

    /// Create an empty store with an advisory byte budget.
    pub fn with_limits(max_bytes: usize) -> Self {
        Self {
            max_bytes: Some(max_bytes),
            ..Self::new()
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no blocks are stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total bytes stored across all blocks.
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    /// Returns `true` if `byte_count` exceeds the configured budget.
    pub fn is_over_budget(&self) -> bool {
        self.max_bytes.is_some_and(|max| self.byte_count > max)
    }

    fn insert(&mut self, cid: Cid, bytes: &[u8]) {
        if self.blocks.contains_key(&cid) {
            return;
        }
        self.byte_count += bytes.len();
        self.blocks.insert(cid, Arc::from(bytes));
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for MemoryTier {
    fn put(&mut self, codec: u64, bytes: &[u8]) -> Result<Cid, CasError> {
        let cid = Cid::of(codec, bytes);
        self.insert(cid, bytes);
        Ok(cid)
    }

    fn put_verified(&mut self, cid: Cid, bytes: &[u8]) -> Result<(), CasError> {
        cid.verify(bytes)?;
        self.insert(cid, bytes);
        Ok(())
    }

    fn get(&self, cid: &Cid) -> Result<Option<Arc<[u8]>>, CasError> {
        Ok(self.blocks.get(cid).cloned())
    }

    fn has(&self, cid: &Cid) -> bool {
        self.blocks.contains_key(cid)
    }
}
