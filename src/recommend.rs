//! Movie recommendations by embedding similarity.
//!
//! Each seed movie contributes its nearest labeled entities; the seeds
//! themselves are never recommended, whether matched by IRI or by label.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingIndex;
use crate::lexicon::Lexicon;
use crate::resolve::EntityRecord;

/// A recommended entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub label: String,
    /// Seed whose neighbourhood produced this entry first.
    pub seed: String,
    pub distance: f32,
}

/// Nearest-neighbour recommender over the entity embeddings.
pub struct RecommendationEngine<'a> {
    embeddings: &'a EmbeddingIndex,
    lexicon: &'a Lexicon,
    per_seed: usize,
}

impl<'a> RecommendationEngine<'a> {
    pub fn new(embeddings: &'a EmbeddingIndex, lexicon: &'a Lexicon, per_seed: usize) -> Self {
        Self {
            embeddings,
            lexicon,
            per_seed,
        }
    }

    /// Union of the `per_seed` nearest neighbours of every seed, in
    /// first-seen order. Seeds without an embedding contribute nothing.
    pub fn recommend(&self, seeds: &[EntityRecord]) -> Vec<Recommendation> {
        let seed_ids: HashSet<&str> = seeds.iter().map(|s| s.id.as_str()).collect();
        let seed_labels: HashSet<&str> = seeds.iter().map(|s| s.label.as_str()).collect();
        let is_candidate = |uri: &str| {
            !seed_ids.contains(uri)
                && self
                    .lexicon
                    .label_of(uri)
                    .is_some_and(|label| !seed_labels.contains(label))
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for seed in seeds {
            let Some(vector) = self.embeddings.entity_vector(&seed.id) else {
                tracing::debug!(seed = %seed.id, "seed has no embedding");
                continue;
            };
            let neighbours = self
                .embeddings
                .nearest_entities_where(vector, self.per_seed, is_candidate);
            for n in neighbours {
                if !seen.insert(n.uri.clone()) {
                    continue;
                }
                let Some(label) = self.lexicon.label_of(&n.uri) else {
                    continue;
                };
                out.push(Recommendation {
                    label: label.to_string(),
                    id: n.uri,
                    seed: seed.id.clone(),
                    distance: n.distance,
                });
            }
        }
        tracing::debug!(seeds = seeds.len(), recommendations = out.len(), "recommended");
        out
    }
}
