//! Prefix ↔ namespace IRI table.
//!
//! Crowd records and configuration refer to graph terms in compact
//! `prefix:local` form (`wd:Q11424`, `wdt:P57`). [`Namespaces`] expands such
//! strings to full IRIs and compacts IRIs back for dictionary keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Term;

pub const WD: &str = "http://www.wikidata.org/entity/";
pub const WDT: &str = "http://www.wikidata.org/prop/direct/";
pub const SCHEMA: &str = "http://schema.org/";
pub const DDIS: &str = "http://ddis.ch/atai/";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";

/// Prefix table. Serialized as a plain `prefix = "iri"` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespaces {
    prefixes: BTreeMap<String, String>,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::from_pairs([
            ("wd", WD),
            ("wdt", WDT),
            ("schema", SCHEMA),
            ("ddis", DDIS),
            ("rdfs", RDFS),
        ])
    }
}

impl Namespaces {
    pub fn from_pairs<I, P, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, N)>,
        P: Into<String>,
        N: Into<String>,
    {
        Self {
            prefixes: pairs
                .into_iter()
                .map(|(p, n)| (p.into(), n.into()))
                .collect(),
        }
    }

    /// Namespace IRI bound to `prefix`.
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// Expand `prefix:local` to a full IRI if the prefix is known.
    pub fn expand(&self, compact: &str) -> Option<String> {
        let (prefix, local) = compact.split_once(':')?;
        let base = self.prefixes.get(prefix)?;
        Some(format!("{base}{local}"))
    }

    /// Compact an IRI to `prefix:local` using the longest matching namespace.
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.split(iri)
            .map(|(prefix, local)| format!("{prefix}:{local}"))
    }

    /// Split an IRI into `(prefix, local)` using the longest matching namespace.
    pub fn split<'a>(&'a self, iri: &'a str) -> Option<(&'a str, &'a str)> {
        self.prefixes
            .iter()
            .filter_map(|(prefix, base)| {
                let local = iri.strip_prefix(base.as_str())?;
                (!local.is_empty()).then_some((prefix.as_str(), base.len(), local))
            })
            .max_by_key(|&(_, len, _)| len)
            .map(|(prefix, _, local)| (prefix, local))
    }

    /// Resolve a crowd-supplied value: a known `prefix:local` becomes an IRI,
    /// anything else a plain literal.
    pub fn resolve_value(&self, value: &str) -> Term {
        match self.expand(value) {
            Some(iri) => Term::Iri(iri),
            None => Term::literal(value),
        }
    }

    /// Normalize an entity reference to a full IRI.
    ///
    /// Accepts a full IRI, a compact `prefix:local` form, or a bare local id
    /// (`Q42`), which is placed in the `default_prefix` namespace.
    pub fn entity_iri(&self, id: &str, default_prefix: &str) -> Option<String> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        if id.starts_with("http://") || id.starts_with("https://") {
            return Some(id.to_string());
        }
        if let Some(iri) = self.expand(id) {
            return Some(iri);
        }
        if id.contains(':') {
            return None;
        }
        self.get(default_prefix).map(|base| format!("{base}{id}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes
            .iter()
            .map(|(p, n)| (p.as_str(), n.as_str()))
    }
}
