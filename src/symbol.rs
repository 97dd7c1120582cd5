//! Interned term identifiers.
//!
//! Every IRI, blank node, and literal stored in the knowledge graph is interned
//! once and referred to by a [`SymbolId`]. Graph nodes and edges only carry
//! these ids; the [`TermRegistry`](crate::registry::TermRegistry) maps them back
//! to terms. The [`AtomicSymbolAllocator`] provides thread-safe ID generation.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::SymbolError;

/// Unique, niche-optimized identifier for an interned term.
///
/// Uses `NonZeroU64` so that `Option<SymbolId>` is the same size as `SymbolId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SymbolId(NonZeroU64);

impl SymbolId {
    /// Create a `SymbolId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(SymbolId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sym:{}", self.0)
    }
}

/// Thread-safe symbol ID allocator.
///
/// Produces monotonically increasing IDs starting from 1.
#[derive(Debug)]
pub struct AtomicSymbolAllocator {
    next: AtomicU64,
}

impl AtomicSymbolAllocator {
    /// Create a new allocator that starts from ID 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next symbol ID.
    ///
    /// Returns an error if the ID space is exhausted (after 2^64 - 1 allocations).
    pub fn next_id(&self) -> Result<SymbolId, SymbolError> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        SymbolId::new(raw).ok_or(SymbolError::AllocatorExhausted)
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed).saturating_sub(1)
    }
}

impl Default for AtomicSymbolAllocator {
    fn default() -> Self {
        Self::new()
    }
}
