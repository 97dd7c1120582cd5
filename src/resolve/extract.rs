//! Contracts for the external language tools.
//!
//! Intent classification, entity linking and named-entity tagging are done
//! by pre-trained models outside this crate. The engine consumes them only
//! through these traits. Plain closures implement each trait, which keeps
//! adapters and test doubles small.

use serde::{Deserialize, Serialize};

use crate::lexicon::Lexicon;

/// Classifier output: the intent tag and its probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub tag: String,
    pub confidence: f32,
}

/// Maps a question to an intent tag.
pub trait IntentClassifier {
    fn classify(&self, text: &str) -> Intent;
}

impl<F> IntentClassifier for F
where
    F: Fn(&str) -> Intent,
{
    fn classify(&self, text: &str) -> Intent {
        self(text)
    }
}

/// An entity proposed by the linker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedCandidate {
    /// Entity reference: bare local id (`Q42`), compact (`wd:Q42`) or full IRI.
    pub id: String,
    /// Surface form or label reported by the linker.
    pub label: String,
}

/// Links mentions in a question to knowledge-graph entities.
pub trait EntityLinker {
    fn link(&self, text: &str) -> Vec<LinkedCandidate>;
}

impl<F> EntityLinker for F
where
    F: Fn(&str) -> Vec<LinkedCandidate>,
{
    fn link(&self, text: &str) -> Vec<LinkedCandidate> {
        self(text)
    }
}

/// A tagged entity mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSpan {
    pub text: String,
    /// Byte offsets into the question.
    pub start: usize,
    pub end: usize,
}

/// Finds entity mentions without linking them.
pub trait NerTagger {
    fn tag(&self, text: &str) -> Vec<TaggedSpan>;
}

impl<F> NerTagger for F
where
    F: Fn(&str) -> Vec<TaggedSpan>,
{
    fn tag(&self, text: &str) -> Vec<TaggedSpan> {
        self(text)
    }
}

/// Tags every movie or person label that occurs verbatim in the text.
///
/// A dictionary stand-in for a trained tagger: longer labels win, and
/// accepted spans never overlap.
#[derive(Debug, Clone, Copy)]
pub struct CatalogTagger<'a> {
    lexicon: &'a Lexicon,
    min_len: usize,
}

impl<'a> CatalogTagger<'a> {
    pub fn new(lexicon: &'a Lexicon) -> Self {
        Self { lexicon, min_len: 3 }
    }

    /// Ignore labels shorter than `min_len` characters.
    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }
}

impl NerTagger for CatalogTagger<'_> {
    fn tag(&self, text: &str) -> Vec<TaggedSpan> {
        let mut hits: Vec<(usize, &str)> = self
            .lexicon
            .movies
            .labels()
            .chain(self.lexicon.people.labels())
            .filter(|label| label.chars().count() >= self.min_len)
            .filter_map(|label| text.find(label).map(|start| (start, label)))
            .collect();
        // Longest first, then leftmost.
        hits.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));

        let mut spans: Vec<TaggedSpan> = Vec::new();
        for (start, label) in hits {
            let end = start + label.len();
            if spans.iter().any(|s| start < s.end && s.start < end) {
                continue;
            }
            spans.push(TaggedSpan {
                text: label.to_string(),
                start,
                end,
            });
        }
        spans.sort_by_key(|s| s.start);
        spans
    }
}

/// A source that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtraction;

impl EntityLinker for NoExtraction {
    fn link(&self, _text: &str) -> Vec<LinkedCandidate> {
        Vec::new()
    }
}

impl NerTagger for NoExtraction {
    fn tag(&self, _text: &str) -> Vec<TaggedSpan> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::LabelMap;

    fn lexicon() -> Lexicon {
        let pairs = |items: &[(&str, &str)]| {
            LabelMap::from_pairs(items.iter().map(|(id, l)| (id.to_string(), l.to_string())))
        };
        Lexicon {
            movies: pairs(&[("m1", "Alien"), ("m2", "Aliens"), ("m3", "Up"), ("m4", "Heat")]),
            people: pairs(&[("p1", "Ridley Scott")]),
            ..Lexicon::default()
        }
    }

    #[test]
    fn catalog_tagger_prefers_longest_non_overlapping() {
        let lex = lexicon();
        let tagger = CatalogTagger::new(&lex);
        let spans = tagger.tag("Did Ridley Scott direct Aliens or Heat?");
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Ridley Scott", "Aliens", "Heat"]);
        assert_eq!(&"Did Ridley Scott"[spans[0].start..spans[0].end], "Ridley Scott");
    }

    #[test]
    fn catalog_tagger_skips_short_labels() {
        let lex = lexicon();
        assert!(CatalogTagger::new(&lex).tag("Up").is_empty());
        assert_eq!(CatalogTagger::new(&lex).with_min_len(2).tag("Up").len(), 1);
    }

    #[test]
    fn closures_implement_contracts() {
        let classifier = |_: &str| Intent {
            tag: "director".into(),
            confidence: 0.9,
        };
        assert_eq!(classifier.classify("x").tag, "director");
        assert!(NoExtraction.link("anything").is_empty());
        assert!(NoExtraction.tag("anything").is_empty());
    }
}
