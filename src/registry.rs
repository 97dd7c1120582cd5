//! Term registry: bidirectional term ↔ ID mapping.
//!
//! The [`TermRegistry`] interns every [`Term`] the graph sees and provides
//! O(1) lookups in both directions using two `DashMap`s. Terms are compared
//! structurally, so `"1994"` and `"1994"^^xsd:gYear` get distinct ids.

use dashmap::DashMap;

use crate::error::SymbolError;
use crate::graph::Term;
use crate::symbol::{AtomicSymbolAllocator, SymbolId};

/// Bidirectional registry mapping interned terms to ids and back.
pub struct TermRegistry {
    /// Forward map: SymbolId → Term (source of truth).
    id_to_term: DashMap<SymbolId, Term>,
    /// Reverse map: Term → SymbolId.
    term_to_id: DashMap<Term, SymbolId>,
    allocator: AtomicSymbolAllocator,
}

impl TermRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            id_to_term: DashMap::new(),
            term_to_id: DashMap::new(),
            allocator: AtomicSymbolAllocator::new(),
        }
    }

    /// Return the id for `term`, allocating one on first sight.
    pub fn intern(&self, term: &Term) -> Result<SymbolId, SymbolError> {
        if let Some(id) = self.term_to_id.get(term) {
            return Ok(*id.value());
        }
        // The entry lock on `term_to_id` makes concurrent interns of the
        // same term agree on one id.
        let entry = self.term_to_id.entry(term.clone());
        let id = match entry {
            dashmap::mapref::entry::Entry::Occupied(e) => *e.get(),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let id = self.allocator.next_id()?;
                self.id_to_term.insert(id, term.clone());
                e.insert(id);
                id
            }
        };
        Ok(id)
    }

    /// Look up the id of an already interned term.
    pub fn lookup(&self, term: &Term) -> Option<SymbolId> {
        self.term_to_id.get(term).map(|r| *r.value())
    }

    /// Resolve an id back to its term.
    pub fn resolve(&self, id: SymbolId) -> Option<Term> {
        self.id_to_term.get(&id).map(|r| r.value().clone())
    }

    /// Number of interned terms.
    pub fn len(&self) -> usize {
        self.id_to_term.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.id_to_term.is_empty()
    }
}

impl Default for TermRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TermRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermRegistry")
            .field("count", &self.len())
            .finish()
    }
}
