//! Provenance ledger: which crowd task changed which triple.
//!
//! Every graph mutation made by crowd fusion is recorded under the `HITId`
//! of the task that caused it, so the updated graph can be audited against
//! the crowd data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::Triple;

/// How a crowd task changed the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A wrong triple was replaced by the crowd's correction.
    Fixed,
    /// A missing triple was added.
    Added,
    /// A missing triple was added after removing colliding values.
    Replaced,
}

/// Per-task record of graph mutations, keyed by `HITId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceLedger {
    /// `HITId` → correction that replaced a wrong triple.
    pub fixed_triples: BTreeMap<String, Triple>,
    /// `HITId` → triple added to the graph.
    pub added_triples: BTreeMap<String, Triple>,
    /// `HITId` → colliding triples removed before the add.
    pub replaced_triples: BTreeMap<String, Vec<Triple>>,
}

impl ProvenanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fix(&mut self, hit_id: &str, correction: Triple) {
        self.fixed_triples.insert(hit_id.to_string(), correction);
    }

    pub fn record_add(&mut self, hit_id: &str, triple: Triple) {
        self.added_triples.insert(hit_id.to_string(), triple);
    }

    /// Record an add that displaced `removed`.
    pub fn record_replace(&mut self, hit_id: &str, triple: Triple, removed: Vec<Triple>) {
        self.added_triples.insert(hit_id.to_string(), triple);
        self.replaced_triples.insert(hit_id.to_string(), removed);
    }

    /// How a task changed the graph, if it did.
    pub fn change_of(&self, hit_id: &str) -> Option<ChangeKind> {
        if self.fixed_triples.contains_key(hit_id) {
            Some(ChangeKind::Fixed)
        } else if self.replaced_triples.contains_key(hit_id) {
            Some(ChangeKind::Replaced)
        } else if self.added_triples.contains_key(hit_id) {
            Some(ChangeKind::Added)
        } else {
            None
        }
    }

    /// Whether `triple` entered the graph through crowd fusion.
    pub fn is_crowd_sourced(&self, triple: &Triple) -> bool {
        self.fixed_triples.values().any(|t| t == triple)
            || self.added_triples.values().any(|t| t == triple)
    }

    /// Number of recorded mutations.
    pub fn len(&self) -> usize {
        self.fixed_triples.len() + self.added_triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
