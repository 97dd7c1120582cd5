//! Label catalogs derived from the graph and crowd verdicts.
//!
//! The resolver matches question text against these catalogs: movie and
//! person labels, "irregular" movie titles (digits or punctuation that
//! linkers tend to miss), miscellaneous entities confirmed by the crowd, and
//! the label of every entity for rendering answers. A [`Lexicon`] is an
//! immutable snapshot, rebuilt whenever the graph changes.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::crowd::aggregate::{AggregatedVerdict, Verdict};
use crate::graph::index::KnowledgeGraph;
use crate::graph::vocab::Vocabulary;
use crate::graph::{Term, TriplePattern};

/// Bidirectional entity IRI ↔ label map.
///
/// Entries are inserted in sorted IRI order, so when several entities share
/// a label the reverse lookup returns the smallest IRI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    by_id: BTreeMap<String, String>,
    by_label: HashMap<String, String>,
}

impl LabelMap {
    /// Build from `(iri, label)` pairs in any order.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let by_id: BTreeMap<String, String> = pairs.into_iter().collect();
        let mut by_label = HashMap::with_capacity(by_id.len());
        for (id, label) in &by_id {
            by_label.entry(label.clone()).or_insert_with(|| id.clone());
        }
        Self { by_id, by_label }
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn id(&self, label: &str) -> Option<&str> {
        self.by_label.get(label).map(String::as_str)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// `(iri, label)` pairs in IRI order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_id.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.by_id.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// An entity confirmed by the crowd as an indirect subclass of something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiscEntity {
    pub label: String,
    /// The class the crowd confirmed.
    pub class: Term,
    /// Task that confirmed it.
    pub hit_id: String,
}

/// Miscellaneous entities keyed by IRI.
pub type MiscCatalog = BTreeMap<String, MiscEntity>;

/// Collect the misc catalog from correct `indirectSubclassOf` verdicts.
///
/// Labels come from the graph, falling back to the IRI's local name.
pub fn misc_from_verdicts(
    graph: &KnowledgeGraph,
    vocab: &Vocabulary,
    verdicts: &[AggregatedVerdict],
) -> MiscCatalog {
    let catalog: MiscCatalog = verdicts
        .iter()
        .filter(|v| v.verdict == Verdict::Correct && v.triple.predicate == vocab.indirect_subclass_of)
        .filter_map(|v| {
            let id = v.triple.subject.as_iri()?;
            let label = vocab
                .label_of(graph, &v.triple.subject)
                .unwrap_or_else(|| v.triple.subject.local_name().to_string());
            Some((
                id.to_string(),
                MiscEntity {
                    label,
                    class: v.triple.object.clone(),
                    hit_id: v.hit_id.clone(),
                },
            ))
        })
        .collect();
    tracing::info!(entities = catalog.len(), "collected miscellaneous entities");
    catalog
}

/// Immutable snapshot of every label catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexicon {
    pub movies: LabelMap,
    pub people: LabelMap,
    pub misc: LabelMap,
    /// Every labeled entity in the graph.
    pub entity_labels: LabelMap,
    /// Movie labels containing an irregular marker, sorted.
    pub irregular_titles: Vec<String>,
}

impl Lexicon {
    /// Derive all catalogs from the graph and the misc catalog.
    pub fn build<S: AsRef<str>>(
        graph: &KnowledgeGraph,
        vocab: &Vocabulary,
        misc: &MiscCatalog,
        irregular_markers: &[S],
    ) -> Self {
        let labeled = |entities: Vec<Term>| {
            LabelMap::from_pairs(entities.into_iter().filter_map(|e| {
                let label = vocab.label_of(graph, &e)?;
                Some((e.as_iri()?.to_string(), label))
            }))
        };

        let movies = labeled(vocab.films(graph));
        let people = labeled(vocab.humans(graph));

        let mut subjects: Vec<Term> = graph
            .matching(&TriplePattern::any().with_predicate(vocab.label.clone()))
            .into_iter()
            .map(|t| t.subject)
            .collect();
        subjects.dedup();
        let entity_labels = labeled(subjects);

        let misc = LabelMap::from_pairs(
            misc.iter()
                .map(|(id, entity)| (id.clone(), entity.label.clone())),
        );

        let irregular_titles = irregular_titles(movies.labels(), irregular_markers);

        tracing::info!(
            movies = movies.len(),
            people = people.len(),
            misc = misc.len(),
            labeled = entity_labels.len(),
            irregular = irregular_titles.len(),
            "built label catalogs"
        );
        Self {
            movies,
            people,
            misc,
            entity_labels,
            irregular_titles,
        }
    }

    /// Label of any entity: catalogs first, then the general label map.
    pub fn label_of(&self, id: &str) -> Option<&str> {
        self.movies
            .label(id)
            .or_else(|| self.people.label(id))
            .or_else(|| self.misc.label(id))
            .or_else(|| self.entity_labels.label(id))
    }
}

/// Labels containing any of the markers, sorted and deduplicated.
pub fn irregular_titles<'a, S: AsRef<str>>(
    labels: impl Iterator<Item = &'a str>,
    markers: &[S],
) -> Vec<String> {
    let mut titles: Vec<String> = labels
        .filter(|label| contains_marker(label, markers))
        .map(str::to_string)
        .collect();
    titles.sort();
    titles.dedup();
    titles
}

/// Whether `text` contains any of the markers.
pub fn contains_marker<S: AsRef<str>>(text: &str, markers: &[S]) -> bool {
    markers
        .iter()
        .any(|m| !m.as_ref().is_empty() && text.contains(m.as_ref()))
}
