//! Entity resolution: which movies, people and other entities a question
//! talks about.
//!
//! Three independent sources are merged per question:
//! 1. **Irregular titles**: if the question contains a marker character, the
//!    irregular movie title sharing the longest substring with it.
//! 2. **Primary linker** ([`EntityLinker`]): candidates kept only if the graph
//!    types them as a film or a human.
//! 3. **Secondary tagger** ([`NerTagger`]): mention text looked up verbatim in
//!    the movie and person catalogs, with a leading "The " added or removed
//!    for movies.
//!
//! For movies and people separately, the source with more candidates wins;
//! equal non-zero counts are settled by the best substring match against the
//! question. The irregular match is always kept as a movie.

pub mod extract;
pub mod matching;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::index::KnowledgeGraph;
use crate::graph::namespace::Namespaces;
use crate::graph::vocab::Vocabulary;
use crate::graph::{Term, local_name};
use crate::lexicon::{LabelMap, Lexicon, contains_marker};

use self::extract::{EntityLinker, NerTagger};
use self::matching::{best_match, best_match_by};

/// Category of a resolved entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Movie,
    Person,
    Miscellaneous,
}

/// A resolved entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Full entity IRI.
    pub id: String,
    pub label: String,
    pub kind: EntityKind,
}

/// Entities mentioned by a question: movies, then people, then
/// miscellaneous, each id at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntities {
    entities: Vec<EntityRecord>,
}

impl ResolvedEntities {
    /// Deduplicate by id, keeping the first occurrence. `None` if empty.
    pub fn new(records: impl IntoIterator<Item = EntityRecord>) -> Option<Self> {
        let mut seen = HashSet::new();
        let entities: Vec<EntityRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
        (!entities.is_empty()).then_some(Self { entities })
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.entities.iter()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntityRecord> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    pub fn movies(&self) -> impl Iterator<Item = &EntityRecord> {
        self.of_kind(EntityKind::Movie)
    }

    pub fn people(&self) -> impl Iterator<Item = &EntityRecord> {
        self.of_kind(EntityKind::Person)
    }

    pub fn first(&self) -> &EntityRecord {
        // Construction guarantees at least one entity.
        &self.entities[0]
    }

    /// Id → label view.
    pub fn as_map(&self) -> BTreeMap<&str, &str> {
        self.entities
            .iter()
            .map(|e| (e.id.as_str(), e.label.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Strip a trailing question mark, truncating at the first `?`.
pub fn normalize_question(question: &str) -> &str {
    let trimmed = question.trim();
    if trimmed.ends_with('?') {
        trimmed.split('?').next().unwrap_or(trimmed).trim_end()
    } else {
        trimmed
    }
}

/// Merges entity candidates from the irregular-title matcher, the linker
/// and the tagger.
pub struct EntityResolver<'a> {
    graph: &'a KnowledgeGraph,
    vocab: &'a Vocabulary,
    namespaces: &'a Namespaces,
    lexicon: &'a Lexicon,
    /// Namespace prefix for bare linker ids (`wd`).
    entity_prefix: &'a str,
    irregular_markers: &'a [String],
}

impl<'a> EntityResolver<'a> {
    pub fn new(
        graph: &'a KnowledgeGraph,
        vocab: &'a Vocabulary,
        namespaces: &'a Namespaces,
        lexicon: &'a Lexicon,
        entity_prefix: &'a str,
        irregular_markers: &'a [String],
    ) -> Self {
        Self {
            graph,
            vocab,
            namespaces,
            lexicon,
            entity_prefix,
            irregular_markers,
        }
    }

    /// Resolve the entities of a question. `None` if nothing was found.
    pub fn resolve(
        &self,
        question: &str,
        linker: &dyn EntityLinker,
        tagger: &dyn NerTagger,
    ) -> Option<ResolvedEntities> {
        let question = normalize_question(question);
        if question.is_empty() {
            return None;
        }

        let irregular = self.irregular_match(question);
        let (primary_movies, primary_people) = self.primary_candidates(question, linker);
        let (secondary_movies, secondary_people) = self.secondary_candidates(question, tagger);

        let mut movies = pick(question, primary_movies, secondary_movies, &self.lexicon.movies);
        movies.extend(irregular);
        let people = pick(question, primary_people, secondary_people, &self.lexicon.people);
        let misc: Vec<String> = self
            .lexicon
            .misc
            .iter()
            .filter(|(_, label)| !label.is_empty() && question.contains(label))
            .map(|(id, _)| id.to_string())
            .collect();

        let records = movies
            .into_iter()
            .map(|id| self.record(id, EntityKind::Movie))
            .chain(people.into_iter().map(|id| self.record(id, EntityKind::Person)))
            .chain(misc.into_iter().map(|id| self.record(id, EntityKind::Miscellaneous)));
        let resolved = ResolvedEntities::new(records);

        match &resolved {
            Some(r) => tracing::debug!(entities = ?r.as_map(), "resolved entities"),
            None => tracing::debug!(question, "no entities resolved"),
        }
        resolved
    }

    fn irregular_match(&self, question: &str) -> Option<String> {
        if !contains_marker(question, self.irregular_markers) {
            return None;
        }
        let title = best_match(
            question,
            self.lexicon.irregular_titles.iter().map(String::as_str),
        )?;
        let id = self.lexicon.movies.id(title)?;
        tracing::debug!(title, id, "irregular title match");
        Some(id.to_string())
    }

    fn primary_candidates(
        &self,
        question: &str,
        linker: &dyn EntityLinker,
    ) -> (Vec<String>, Vec<String>) {
        let mut movies = Vec::new();
        let mut people = Vec::new();
        for candidate in linker.link(question) {
            let Some(iri) = self.namespaces.entity_iri(&candidate.id, self.entity_prefix) else {
                tracing::debug!(id = %candidate.id, "unusable linker id");
                continue;
            };
            let term = Term::iri(iri.as_str());
            if self.vocab.is_film(self.graph, &term) {
                movies.push(iri);
            } else if self.vocab.is_human(self.graph, &term) {
                people.push(iri);
            } else {
                tracing::debug!(id = %iri, label = %candidate.label, "linked entity is neither movie nor person");
            }
        }
        (movies, people)
    }

    fn secondary_candidates(
        &self,
        question: &str,
        tagger: &dyn NerTagger,
    ) -> (Vec<String>, Vec<String>) {
        let movies_by = |label: &str| self.lexicon.movies.id(label).map(str::to_string);
        let mut movies = Vec::new();
        let mut people = Vec::new();
        for span in tagger.tag(question) {
            let text = span.text.trim();
            if text.is_empty() {
                continue;
            }
            if let Some(id) = movies_by(text) {
                movies.push(id);
            } else if let Some(id) = self.lexicon.people.id(text) {
                people.push(id.to_string());
            } else if let Some(id) = movies_by(&format!("The {text}")) {
                movies.push(id);
            } else if let Some(id) = text.strip_prefix("The ").and_then(movies_by) {
                movies.push(id);
            }
        }
        (movies, people)
    }

    fn record(&self, id: String, kind: EntityKind) -> EntityRecord {
        let catalog = match kind {
            EntityKind::Movie => &self.lexicon.movies,
            EntityKind::Person => &self.lexicon.people,
            EntityKind::Miscellaneous => &self.lexicon.misc,
        };
        let label = catalog
            .label(&id)
            .or_else(|| self.lexicon.label_of(&id))
            .unwrap_or_else(|| local_name(&id))
            .to_string();
        EntityRecord { id, label, kind }
    }
}

/// Settle one category between the two sources.
fn pick(question: &str, primary: Vec<String>, secondary: Vec<String>, labels: &LabelMap) -> Vec<String> {
    use std::cmp::Ordering;
    match primary.len().cmp(&secondary.len()) {
        Ordering::Equal if primary.is_empty() => Vec::new(),
        Ordering::Equal => {
            let labeled = primary
                .iter()
                .chain(&secondary)
                .filter_map(|id| Some((id, labels.label(id)?)));
            let best = best_match_by(question, labeled, |item| item.1)
                .map(|(id, _)| id)
                .unwrap_or(&primary[0]);
            vec![best.clone()]
        }
        Ordering::Greater => primary,
        Ordering::Less => secondary,
    }
}
