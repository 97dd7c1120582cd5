//! Predicate dictionary: compact predicate key ↔ human label.
//!
//! The classifier names the asked-for relation by label ("director",
//! "publication date"); the dictionary maps that label back to a graph
//! predicate. It is built once from the predicates that film entities
//! actually use, then extended with predicates that only occur in crowd
//! data. Those crowd-only keys are remembered so answers over them can be
//! flagged as crowd-sourced.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::crowd::aggregate::AggregatedVerdict;
use crate::graph::index::KnowledgeGraph;
use crate::graph::namespace::Namespaces;
use crate::graph::vocab::Vocabulary;
use crate::graph::Term;

/// Bidirectional predicate key ↔ label map.
///
/// Keys are unique. The reverse map keeps the first key inserted for a label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateDictionary {
    labels: BTreeMap<String, String>,
    by_label: HashMap<String, String>,
    crowd: BTreeSet<String>,
}

impl PredicateDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts. Graph keys are inserted in sorted order
    /// first so the reverse map matches a fresh build.
    pub fn from_parts(labels: BTreeMap<String, String>, crowd: BTreeSet<String>) -> Self {
        let mut dict = Self::new();
        for (key, label) in labels.iter().filter(|(k, _)| !crowd.contains(*k)) {
            dict.insert(key.clone(), label.clone());
        }
        for key in &crowd {
            if let Some(label) = labels.get(key) {
                dict.insert_crowd(key.clone(), label.clone());
            }
        }
        dict
    }

    /// Insert a graph-derived entry. Returns `false` if the key exists.
    pub fn insert(&mut self, key: String, label: String) -> bool {
        if self.labels.contains_key(&key) {
            return false;
        }
        self.by_label.entry(label.clone()).or_insert_with(|| key.clone());
        self.labels.insert(key, label);
        true
    }

    /// Insert a crowd-derived entry if the key is absent, marking it as a
    /// crowd predicate. Existing entries are never overridden.
    pub fn insert_crowd(&mut self, key: String, label: String) -> bool {
        if !self.insert(key.clone(), label) {
            return false;
        }
        self.crowd.insert(key);
        true
    }

    /// Label of a predicate key.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Predicate key for a label.
    pub fn key_for_label(&self, label: &str) -> Option<&str> {
        self.by_label.get(label).map(String::as_str)
    }

    /// Whether the key was contributed by crowd data only.
    pub fn is_crowd(&self, key: &str) -> bool {
        self.crowd.contains(key)
    }

    /// All `(key, label)` entries, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Crowd-only entries, sorted by key.
    pub fn crowd_entries(&self) -> BTreeMap<String, String> {
        self.crowd
            .iter()
            .filter_map(|k| Some((k.clone(), self.labels.get(k)?.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Derives predicate labels from the graph and from crowd verdicts.
#[derive(Debug, Clone)]
pub struct PredicateLabelResolver<'a> {
    namespaces: &'a Namespaces,
    vocab: &'a Vocabulary,
    /// Prefix whose predicates are labeled through the graph (`wdt`).
    label_namespace: &'a str,
    /// Fixed labels for crowd predicates, by compact key.
    overrides: &'a BTreeMap<String, String>,
}

impl<'a> PredicateLabelResolver<'a> {
    pub fn new(
        namespaces: &'a Namespaces,
        vocab: &'a Vocabulary,
        label_namespace: &'a str,
        overrides: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            namespaces,
            vocab,
            label_namespace,
            overrides,
        }
    }

    /// Dictionary of every predicate used by a film entity.
    ///
    /// Predicates in the label-bearing namespace use their `rdfs:label` and
    /// are skipped when they have none; other known namespaces use the IRI's
    /// trailing segment; unknown namespaces are skipped.
    pub fn from_graph(&self, graph: &KnowledgeGraph) -> PredicateDictionary {
        let films = self.vocab.films(graph);
        let predicates: BTreeSet<Term> = films
            .iter()
            .flat_map(|film| graph.predicates_of(film))
            .collect();

        let mut entries = BTreeMap::new();
        let mut unlabeled = 0usize;
        for predicate in &predicates {
            let Some(iri) = predicate.as_iri() else {
                continue;
            };
            let Some((prefix, local)) = self.namespaces.split(iri) else {
                continue;
            };
            let label = if prefix == self.label_namespace {
                match self.vocab.label_of(graph, predicate) {
                    Some(label) => label,
                    None => {
                        unlabeled += 1;
                        continue;
                    }
                }
            } else {
                local.to_string()
            };
            entries.insert(format!("{prefix}:{local}"), label);
        }

        let mut dict = PredicateDictionary::new();
        for (key, label) in entries {
            dict.insert(key, label);
        }
        tracing::info!(
            films = films.len(),
            predicates = dict.len(),
            unlabeled,
            "built predicate dictionary"
        );
        dict
    }

    /// Add crowd predicates missing from `dict`. Returns the new keys.
    pub fn extend_with_crowd(
        &self,
        dict: &mut PredicateDictionary,
        graph: &KnowledgeGraph,
        verdicts: &[AggregatedVerdict],
    ) -> Vec<String> {
        let mut added = Vec::new();
        for verdict in verdicts {
            let Some((key, label)) = self.crowd_entry(graph, &verdict.triple.predicate) else {
                continue;
            };
            if dict.insert_crowd(key.clone(), label) {
                tracing::debug!(key = %key, hit_id = %verdict.hit_id, "crowd-only predicate");
                added.push(key);
            }
        }
        tracing::info!(added = added.len(), "extended predicate dictionary with crowd data");
        added
    }

    fn crowd_entry(&self, graph: &KnowledgeGraph, predicate: &Term) -> Option<(String, String)> {
        let iri = predicate.as_iri()?;
        let (prefix, raw_local) = self.namespaces.split(iri)?;
        // Crowd exports carry stray leading dots (`.P344`).
        let local = raw_local.trim_start_matches('.');
        if local.is_empty() {
            return None;
        }
        let key = format!("{prefix}:{local}");
        if let Some(label) = self.overrides.get(&key) {
            return Some((key, label.clone()));
        }
        let label = if prefix == self.label_namespace {
            let base = self.namespaces.get(prefix)?;
            self.vocab
                .label_of(graph, &Term::iri(format!("{base}{local}")))
                .unwrap_or_else(|| local.to_string())
        } else {
            local.to_string()
        };
        Some((key, label))
    }
}
