//! Question pipeline: classify, route, answer.
//!
//! The classifier's tag decides the route. Low-confidence questions are
//! bounced, small talk gets a canned reply, the recommendation tag asks the
//! recommender, and every other tag is treated as the label of the relation
//! being asked about.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::answer::{AnswerSet, AnswerSource, HybridAnswerEngine, NoAnswerReason, focus_entity, join_values};
use crate::recommend::{Recommendation, RecommendationEngine};
use crate::resolve::extract::{EntityLinker, Intent, IntentClassifier, NerTagger};
use crate::resolve::{EntityRecord, EntityResolver};

/// Routing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Classifier confidence must exceed this to be acted on.
    pub min_confidence: f32,
    pub small_talk_tags: Vec<String>,
    pub recommendation_tag: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.75,
            small_talk_tags: vec!["greeting".into(), "goodbye".into()],
            recommendation_tag: "recommendation".into(),
        }
    }
}

/// Why a routed question could not be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Unanswerable {
    /// A recommendation was asked for but no movie was recognized.
    NoSeedMovies,
    /// Seed movies were found but have no usable neighbours.
    NoRecommendations,
    /// The factual answer engine gave up.
    NoAnswer(NoAnswerReason),
}

/// The pipeline's reply to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    LowConfidence {
        intent: Intent,
    },
    SmallTalk {
        tag: String,
    },
    Recommendations {
        seeds: Vec<EntityRecord>,
        items: Vec<Recommendation>,
    },
    Answer {
        entity: EntityRecord,
        relation: String,
        answer: AnswerSet,
    },
    Unanswerable {
        reason: Unanswerable,
    },
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::LowConfidence { .. } => f.write_str("Sorry, could you rephrase your message?"),
            Response::SmallTalk { tag } if tag == "goodbye" => {
                f.write_str("Goodbye! Come back with more movie questions.")
            }
            Response::SmallTalk { .. } => f.write_str("Hi! Ask me anything about movies."),
            Response::Recommendations { seeds, items } => {
                let seeds: Vec<&str> = seeds.iter().map(|s| s.label.as_str()).collect();
                let items: Vec<&str> = items.iter().map(|r| r.label.as_str()).collect();
                write!(
                    f,
                    "If you liked {}, you might also enjoy {}.",
                    join_values(&seeds),
                    join_values(&items)
                )
            }
            Response::Answer {
                entity,
                relation,
                answer,
            } => {
                let values = join_values(&answer.values);
                match answer.source {
                    AnswerSource::Graph => {
                        write!(f, "The {relation} of {} is {values}.", entity.label)?
                    }
                    AnswerSource::Embeddings => write!(
                        f,
                        "According to the embeddings, the {relation} of {} is likely {values}.",
                        entity.label
                    )?,
                    AnswerSource::GraphAndEmbeddings => write!(
                        f,
                        "The {relation} of {} is {values}; the last one is suggested by the embeddings.",
                        entity.label
                    )?,
                }
                if answer.crowd_sourced {
                    f.write_str(" This relation comes from crowd annotations.")?;
                }
                Ok(())
            }
            Response::Unanswerable {
                reason: Unanswerable::NoSeedMovies | Unanswerable::NoRecommendations,
            } => f.write_str(
                "I was unable to find any good recommendations for you. Wanna try another question?",
            ),
            Response::Unanswerable { .. } => f.write_str(
                "I was unable to retrieve the information you asked for. Wanna try another question?",
            ),
        }
    }
}

/// Routes questions to the resolver, answer engine and recommender.
pub struct QuestionPipeline<'a> {
    classifier: &'a dyn IntentClassifier,
    linker: &'a dyn EntityLinker,
    tagger: &'a dyn NerTagger,
    resolver: EntityResolver<'a>,
    answers: HybridAnswerEngine<'a>,
    recommender: RecommendationEngine<'a>,
    config: &'a PipelineConfig,
}

impl<'a> QuestionPipeline<'a> {
    pub fn new(
        classifier: &'a dyn IntentClassifier,
        linker: &'a dyn EntityLinker,
        tagger: &'a dyn NerTagger,
        resolver: EntityResolver<'a>,
        answers: HybridAnswerEngine<'a>,
        recommender: RecommendationEngine<'a>,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            classifier,
            linker,
            tagger,
            resolver,
            answers,
            recommender,
            config,
        }
    }

    /// Produce a response. Never fails: every dead end is a named variant.
    pub fn respond(&self, question: &str) -> Response {
        let intent = self.classifier.classify(question);
        // Written so that a NaN confidence is also rejected.
        if !(intent.confidence > self.config.min_confidence) {
            tracing::debug!(tag = %intent.tag, confidence = intent.confidence, "low confidence");
            return Response::LowConfidence { intent };
        }
        tracing::info!(tag = %intent.tag, confidence = intent.confidence, "classified question");

        if self.config.small_talk_tags.contains(&intent.tag) {
            return Response::SmallTalk { tag: intent.tag };
        }

        let entities = self.resolver.resolve(question, self.linker, self.tagger);

        if intent.tag == self.config.recommendation_tag {
            let seeds: Vec<EntityRecord> = entities
                .iter()
                .flat_map(|e| e.movies())
                .cloned()
                .collect();
            if seeds.is_empty() {
                return Response::Unanswerable {
                    reason: Unanswerable::NoSeedMovies,
                };
            }
            let items = self.recommender.recommend(&seeds);
            if items.is_empty() {
                return Response::Unanswerable {
                    reason: Unanswerable::NoRecommendations,
                };
            }
            return Response::Recommendations { seeds, items };
        }

        let Some(entities) = entities else {
            return Response::Unanswerable {
                reason: Unanswerable::NoAnswer(NoAnswerReason::NoEntity),
            };
        };
        let entity = focus_entity(question, &entities).clone();
        match self.answers.answer_for_label(&entity.id, &intent.tag) {
            crate::answer::Answer::Found(answer) => Response::Answer {
                entity,
                relation: intent.tag,
                answer,
            },
            crate::answer::Answer::NoAnswer(reason) => {
                tracing::info!(%reason, "no answer");
                Response::Unanswerable {
                    reason: Unanswerable::NoAnswer(reason),
                }
            }
        }
    }
}
