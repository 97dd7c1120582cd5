//! Hybrid factual answering: graph lookup first, translational embeddings
//! as fallback and complement.
//!
//! The number of graph objects for `(entity, predicate)` picks the strategy:
//!
//! | graph objects | answer                                               |
//! |---------------|------------------------------------------------------|
//! | exactly 1     | the graph object                                     |
//! | 0             | top-1 entity nearest to `embed(entity) + embed(pred)` |
//! | more than 1   | graph objects, plus the top neighbour if it is new   |

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingIndex;
use crate::graph::Term;
use crate::graph::index::KnowledgeGraph;
use crate::graph::namespace::Namespaces;
use crate::graph::vocab::Vocabulary;
use crate::lexicon::Lexicon;
use crate::predicates::PredicateDictionary;
use crate::resolve::matching::best_match_by;
use crate::resolve::{EntityRecord, ResolvedEntities};

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Graph,
    Embeddings,
    GraphAndEmbeddings,
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnswerSource::Graph => "graph",
            AnswerSource::Embeddings => "embeddings",
            AnswerSource::GraphAndEmbeddings => "graph+embeddings",
        })
    }
}

/// A successful answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    /// Entity IRI the question was about.
    pub entity: String,
    /// Compact predicate key.
    pub predicate: String,
    /// Answer values, graph values first.
    pub values: Vec<String>,
    pub source: AnswerSource,
    /// The predicate is only known from crowd data.
    pub crowd_sourced: bool,
}

/// Why no answer was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoAnswerReason {
    /// No entity was resolved from the question.
    NoEntity,
    /// The predicate label is not in the dictionary.
    UnknownPredicate { label: String },
    /// The predicate key uses an unknown namespace prefix.
    UnresolvablePredicate { key: String },
    /// Nothing in the graph, and the entity or predicate has no embedding.
    MissingEmbedding { entity: String, predicate: String },
    /// The embedding search returned no labeled entity.
    NoNeighbours,
}

impl fmt::Display for NoAnswerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoAnswerReason::NoEntity => write!(f, "no entity recognized"),
            NoAnswerReason::UnknownPredicate { label } => write!(f, "unknown relation `{label}`"),
            NoAnswerReason::UnresolvablePredicate { key } => {
                write!(f, "predicate `{key}` has no known namespace")
            }
            NoAnswerReason::MissingEmbedding { entity, predicate } => {
                write!(f, "no graph facts and no embedding for {entity} / {predicate}")
            }
            NoAnswerReason::NoNeighbours => write!(f, "no embedding neighbours"),
        }
    }
}

/// Outcome of a factual query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Found(AnswerSet),
    NoAnswer(NoAnswerReason),
}

impl Answer {
    pub fn found(&self) -> Option<&AnswerSet> {
        match self {
            Answer::Found(set) => Some(set),
            Answer::NoAnswer(_) => None,
        }
    }
}

/// Answering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    /// Neighbours consulted when the graph has several objects.
    pub neighbours: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self { neighbours: 5 }
    }
}

/// Answers `(entity, predicate)` queries over the graph and the embeddings.
pub struct HybridAnswerEngine<'a> {
    graph: &'a KnowledgeGraph,
    embeddings: &'a EmbeddingIndex,
    namespaces: &'a Namespaces,
    vocab: &'a Vocabulary,
    predicates: &'a PredicateDictionary,
    lexicon: &'a Lexicon,
    config: AnswerConfig,
}

impl<'a> HybridAnswerEngine<'a> {
    pub fn new(
        graph: &'a KnowledgeGraph,
        embeddings: &'a EmbeddingIndex,
        namespaces: &'a Namespaces,
        vocab: &'a Vocabulary,
        predicates: &'a PredicateDictionary,
        lexicon: &'a Lexicon,
        config: AnswerConfig,
    ) -> Self {
        Self {
            graph,
            embeddings,
            namespaces,
            vocab,
            predicates,
            lexicon,
            config,
        }
    }

    /// Answer a question about the best-matching resolved entity, with the
    /// relation named by its dictionary label.
    pub fn answer_question(
        &self,
        question: &str,
        entities: Option<&ResolvedEntities>,
        predicate_label: &str,
    ) -> Answer {
        let Some(entities) = entities else {
            return Answer::NoAnswer(NoAnswerReason::NoEntity);
        };
        let focus = focus_entity(question, entities);
        self.answer_for_label(&focus.id, predicate_label)
    }

    /// Answer with the predicate named by its label.
    pub fn answer_for_label(&self, entity: &str, predicate_label: &str) -> Answer {
        match self.predicates.key_for_label(predicate_label) {
            Some(key) => self.answer(entity, key),
            None => {
                tracing::debug!(label = predicate_label, "predicate label not in dictionary");
                Answer::NoAnswer(NoAnswerReason::UnknownPredicate {
                    label: predicate_label.to_string(),
                })
            }
        }
    }

    /// Answer `(entity IRI, compact predicate key)`.
    pub fn answer(&self, entity: &str, predicate_key: &str) -> Answer {
        let Some(predicate_iri) = self.namespaces.expand(predicate_key) else {
            return Answer::NoAnswer(NoAnswerReason::UnresolvablePredicate {
                key: predicate_key.to_string(),
            });
        };
        let crowd_sourced = self.predicates.is_crowd(predicate_key);
        if crowd_sourced {
            tracing::info!(predicate = predicate_key, "answering over a crowd-sourced predicate");
        }

        let graph_values = self.graph_values(entity, &predicate_iri);
        let found = |values, source| {
            Answer::Found(AnswerSet {
                entity: entity.to_string(),
                predicate: predicate_key.to_string(),
                values,
                source,
                crowd_sourced,
            })
        };

        match graph_values.len() {
            1 => found(graph_values, AnswerSource::Graph),
            0 => {
                let Some(neighbours) = self.embedding_values(entity, &predicate_iri, 1) else {
                    return Answer::NoAnswer(NoAnswerReason::MissingEmbedding {
                        entity: entity.to_string(),
                        predicate: predicate_key.to_string(),
                    });
                };
                if neighbours.is_empty() {
                    return Answer::NoAnswer(NoAnswerReason::NoNeighbours);
                }
                found(neighbours, AnswerSource::Embeddings)
            }
            _ => {
                let top = self
                    .embedding_values(entity, &predicate_iri, self.config.neighbours)
                    .and_then(|n| n.into_iter().next());
                match top {
                    Some(top) if !graph_values.contains(&top) => {
                        let mut values = graph_values;
                        values.push(top);
                        found(values, AnswerSource::GraphAndEmbeddings)
                    }
                    _ => found(graph_values, AnswerSource::Graph),
                }
            }
        }
    }

    /// Objects of `(entity, predicate)`: their labels if any object is
    /// labeled, otherwise their raw values. Sorted and deduplicated.
    fn graph_values(&self, entity: &str, predicate_iri: &str) -> Vec<String> {
        let objects = self
            .graph
            .objects_of(&Term::iri(entity), &Term::iri(predicate_iri));
        let labels: BTreeSet<String> = objects
            .iter()
            .filter(|o| o.as_iri().is_some())
            .filter_map(|o| self.vocab.label_of(self.graph, o))
            .collect();
        let values: BTreeSet<String> = if labels.is_empty() {
            objects.iter().map(|o| o.lexical().to_string()).collect()
        } else {
            labels
        };
        tracing::debug!(entity, predicate = predicate_iri, count = values.len(), "graph answer");
        values.into_iter().collect()
    }

    /// Labels of the `k` labeled entities nearest to `entity + predicate`.
    /// `None` if either embedding is missing.
    fn embedding_values(&self, entity: &str, predicate_iri: &str, k: usize) -> Option<Vec<String>> {
        let query = self.embeddings.translate(entity, predicate_iri)?;
        let labels = self
            .embeddings
            .nearest_entities_where(&query, k, |uri| self.lexicon.label_of(uri).is_some())
            .into_iter()
            .filter_map(|n| self.lexicon.label_of(&n.uri).map(str::to_string))
            .collect();
        Some(labels)
    }
}

/// The resolved entity whose label best matches the question, or the first
/// one if none overlaps.
pub fn focus_entity<'e>(question: &str, entities: &'e ResolvedEntities) -> &'e EntityRecord {
    if entities.len() == 1 {
        return entities.first();
    }
    best_match_by(question, entities.iter(), |e| e.label.as_str()).unwrap_or_else(|| entities.first())
}

/// Join values as `A, B and C`.
pub fn join_values<S: AsRef<str>>(values: &[S]) -> String {
    match values {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let init: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{} and {}", init.join(", "), last.as_ref())
        }
    }
}
