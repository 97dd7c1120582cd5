//! In-memory knowledge graph with subject, object and predicate indexes.
//!
//! Terms are interned through a [`TermRegistry`]; the graph itself only
//! stores [`SymbolId`]s. `petgraph` provides subject (outgoing) and object
//! (incoming) adjacency, and a predicate index maps each predicate to its
//! `(subject, object)` pairs. All structural state lives behind one
//! `RwLock`, so a [`GraphBatch`] applies several mutations atomically.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use crate::error::GraphError;
use crate::registry::TermRegistry;
use crate::symbol::SymbolId;

use super::{Term, Triple, TriplePattern};

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Edge payload: the interned predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EdgeData {
    predicate: SymbolId,
}

/// Interned form of a triple.
type IdTriple = (SymbolId, SymbolId, SymbolId);

#[derive(Default)]
struct GraphState {
    graph: StableDiGraph<SymbolId, EdgeData>,
    node_index: HashMap<SymbolId, NodeIndex>,
    predicate_index: HashMap<SymbolId, HashSet<(SymbolId, SymbolId)>>,
    triple_count: usize,
}

impl GraphState {
    fn ensure_node(&mut self, symbol: SymbolId) -> NodeIndex {
        if let Some(idx) = self.node_index.get(&symbol) {
            return *idx;
        }
        let idx = self.graph.add_node(symbol);
        self.node_index.insert(symbol, idx);
        idx
    }

    fn contains(&self, (s, p, o): IdTriple) -> bool {
        self.predicate_index
            .get(&p)
            .is_some_and(|pairs| pairs.contains(&(s, o)))
    }

    fn insert(&mut self, (s, p, o): IdTriple) -> bool {
        if self.contains((s, p, o)) {
            return false;
        }
        let subj_idx = self.ensure_node(s);
        let obj_idx = self.ensure_node(o);
        self.graph.add_edge(subj_idx, obj_idx, EdgeData { predicate: p });
        self.predicate_index.entry(p).or_default().insert((s, o));
        self.triple_count += 1;
        true
    }

    fn remove(&mut self, (s, p, o): IdTriple) -> bool {
        if !self.contains((s, p, o)) {
            return false;
        }
        let (Some(&subj_idx), Some(&obj_idx)) = (self.node_index.get(&s), self.node_index.get(&o))
        else {
            return false;
        };
        let edge = self
            .graph
            .edges_directed(subj_idx, Direction::Outgoing)
            .find(|e| e.target() == obj_idx && e.weight().predicate == p)
            .map(|e| e.id());
        let Some(edge) = edge else {
            return false;
        };
        self.graph.remove_edge(edge);
        if let Some(pairs) = self.predicate_index.get_mut(&p) {
            pairs.remove(&(s, o));
            if pairs.is_empty() {
                self.predicate_index.remove(&p);
            }
        }
        self.triple_count -= 1;
        true
    }

    /// Interned triples matching the (already interned) pattern components.
    fn matching(
        &self,
        subject: Option<SymbolId>,
        predicate: Option<SymbolId>,
        object: Option<SymbolId>,
    ) -> Vec<IdTriple> {
        let pred_ok = |p: SymbolId| predicate.is_none_or(|want| want == p);
        let obj_ok = |o: SymbolId| object.is_none_or(|want| want == o);

        if let Some(s) = subject {
            let Some(&idx) = self.node_index.get(&s) else {
                return Vec::new();
            };
            return self
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .filter_map(|e| {
                    let o = *self.graph.node_weight(e.target())?;
                    let p = e.weight().predicate;
                    (pred_ok(p) && obj_ok(o)).then_some((s, p, o))
                })
                .collect();
        }

        if let Some(o) = object {
            let Some(&idx) = self.node_index.get(&o) else {
                return Vec::new();
            };
            return self
                .graph
                .edges_directed(idx, Direction::Incoming)
                .filter_map(|e| {
                    let s = *self.graph.node_weight(e.source())?;
                    let p = e.weight().predicate;
                    pred_ok(p).then_some((s, p, o))
                })
                .collect();
        }

        if let Some(p) = predicate {
            return self
                .predicate_index
                .get(&p)
                .map(|pairs| pairs.iter().map(|&(s, o)| (s, p, o)).collect())
                .unwrap_or_default();
        }

        self.graph
            .edge_references()
            .filter_map(|e| {
                let s = *self.graph.node_weight(e.source())?;
                let o = *self.graph.node_weight(e.target())?;
                Some((s, e.weight().predicate, o))
            })
            .collect()
    }
}

/// In-memory triple store with set semantics.
///
/// Reads take the shared lock; every mutation (single insert/remove or a
/// whole [`GraphBatch`]) takes the exclusive lock, so readers never see a
/// partially applied batch.
pub struct KnowledgeGraph {
    registry: TermRegistry,
    state: RwLock<GraphState>,
}

impl KnowledgeGraph {
    /// Create a new empty knowledge graph.
    pub fn new() -> Self {
        Self {
            registry: TermRegistry::new(),
            state: RwLock::new(GraphState::default()),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, GraphState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, GraphState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn intern(&self, triple: &Triple) -> GraphResult<IdTriple> {
        Ok((
            self.registry.intern(&triple.subject)?,
            self.registry.intern(&triple.predicate)?,
            self.registry.intern(&triple.object)?,
        ))
    }

    /// Interned ids of a triple, if every term has been seen before.
    fn lookup(&self, triple: &Triple) -> Option<IdTriple> {
        Some((
            self.registry.lookup(&triple.subject)?,
            self.registry.lookup(&triple.predicate)?,
            self.registry.lookup(&triple.object)?,
        ))
    }

    fn materialize(&self, (s, p, o): IdTriple) -> Option<Triple> {
        Some(Triple::new(
            self.registry.resolve(s)?,
            self.registry.resolve(p)?,
            self.registry.resolve(o)?,
        ))
    }

    /// Insert a triple. Returns `false` if it was already present.
    pub fn insert(&self, triple: &Triple) -> GraphResult<bool> {
        let ids = self.intern(triple)?;
        Ok(self.write_state().insert(ids))
    }

    /// Remove a triple. Returns `false` if it was not present.
    pub fn remove(&self, triple: &Triple) -> bool {
        match self.lookup(triple) {
            Some(ids) => self.write_state().remove(ids),
            None => false,
        }
    }

    /// Membership test.
    pub fn contains(&self, triple: &Triple) -> bool {
        self.lookup(triple)
            .is_some_and(|ids| self.read_state().contains(ids))
    }

    /// Bulk-load triples. Returns the number of triples actually inserted.
    pub fn extend<I>(&self, triples: I) -> GraphResult<usize>
    where
        I: IntoIterator<Item = Triple>,
    {
        let mut state = self.write_state();
        let mut inserted = 0;
        for triple in triples {
            if state.insert(self.intern(&triple)?) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Apply several mutations under one write lock.
    ///
    /// If `f` returns an error, mutations it already made stay applied; callers
    /// that need all-or-nothing should check preconditions before mutating.
    pub fn batch<R>(&self, f: impl FnOnce(&mut GraphBatch<'_>) -> GraphResult<R>) -> GraphResult<R> {
        let mut state = self.write_state();
        let mut batch = GraphBatch {
            graph: self,
            state: &mut state,
        };
        f(&mut batch)
    }

    /// All triples matching the pattern, in sorted order.
    pub fn matching(&self, pattern: &TriplePattern) -> Vec<Triple> {
        let Some((s, p, o)) = self.lookup_pattern(pattern) else {
            return Vec::new();
        };
        let ids = self.read_state().matching(s, p, o);
        let mut triples: Vec<Triple> = ids
            .into_iter()
            .filter_map(|ids| self.materialize(ids))
            .collect();
        triples.sort();
        triples
    }

    /// Intern lookup for bound pattern components. `None` means some bound
    /// term is unknown, so nothing can match.
    #[allow(clippy::type_complexity)]
    fn lookup_pattern(
        &self,
        pattern: &TriplePattern,
    ) -> Option<(Option<SymbolId>, Option<SymbolId>, Option<SymbolId>)> {
        let bound = |t: &Option<Term>| match t {
            Some(term) => self.registry.lookup(term).map(Some),
            None => Some(None),
        };
        Some((
            bound(&pattern.subject)?,
            bound(&pattern.predicate)?,
            bound(&pattern.object)?,
        ))
    }

    /// Objects of `(subject, predicate, ?)`, sorted.
    pub fn objects_of(&self, subject: &Term, predicate: &Term) -> Vec<Term> {
        self.matching(
            &TriplePattern::any()
                .with_subject(subject.clone())
                .with_predicate(predicate.clone()),
        )
        .into_iter()
        .map(|t| t.object)
        .collect()
    }

    /// Subjects of `(?, predicate, object)`, sorted.
    pub fn subjects_of(&self, predicate: &Term, object: &Term) -> Vec<Term> {
        self.matching(
            &TriplePattern::any()
                .with_predicate(predicate.clone())
                .with_object(object.clone()),
        )
        .into_iter()
        .map(|t| t.subject)
        .collect()
    }

    /// Distinct predicates on outgoing edges of `subject`, sorted.
    pub fn predicates_of(&self, subject: &Term) -> Vec<Term> {
        let mut predicates: Vec<Term> = self
            .matching(&TriplePattern::any().with_subject(subject.clone()))
            .into_iter()
            .map(|t| t.predicate)
            .collect();
        predicates.sort();
        predicates.dedup();
        predicates
    }

    /// Every triple in the graph, sorted.
    pub fn all_triples(&self) -> Vec<Triple> {
        self.matching(&TriplePattern::any())
    }

    /// Number of triples.
    pub fn len(&self) -> usize {
        self.read_state().triple_count
    }

    /// Whether the graph holds no triples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of subject/object nodes.
    pub fn node_count(&self) -> usize {
        self.read_state().node_index.len()
    }

    /// Number of distinct predicates in use.
    pub fn predicate_count(&self) -> usize {
        self.read_state().predicate_index.len()
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("nodes", &self.node_count())
            .field("triples", &self.len())
            .finish()
    }
}

/// Mutable view of the graph held under its write lock.
pub struct GraphBatch<'a> {
    graph: &'a KnowledgeGraph,
    state: &'a mut GraphState,
}

impl GraphBatch<'_> {
    /// Insert a triple. Returns `false` if it was already present.
    pub fn insert(&mut self, triple: &Triple) -> GraphResult<bool> {
        let ids = self.graph.intern(triple)?;
        Ok(self.state.insert(ids))
    }

    /// Remove a triple. Returns `false` if it was not present.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        match self.graph.lookup(triple) {
            Some(ids) => self.state.remove(ids),
            None => false,
        }
    }

    /// Membership test against the in-progress state.
    pub fn contains(&self, triple: &Triple) -> bool {
        self.graph
            .lookup(triple)
            .is_some_and(|ids| self.state.contains(ids))
    }

    /// Triples matching `pattern` in the in-progress state, sorted.
    pub fn matching(&self, pattern: &TriplePattern) -> Vec<Triple> {
        let Some((s, p, o)) = self.graph.lookup_pattern(pattern) else {
            return Vec::new();
        };
        let mut triples: Vec<Triple> = self
            .state
            .matching(s, p, o)
            .into_iter()
            .filter_map(|ids| self.graph.materialize(ids))
            .collect();
        triples.sort();
        triples
    }
}
