//! Knowledge graph: RDF-style triples with an indexed in-memory store.
//!
//! - **Data model** ([`Term`], [`Triple`], [`TriplePattern`]): IRIs, blank
//!   nodes, and literals, compared structurally (a literal's datatype and
//!   language are part of its identity).
//! - **Store** ([`index::KnowledgeGraph`]): `petgraph` adjacency plus a
//!   predicate index behind a single-writer lock.
//! - **Exchange** ([`rdf`]): Turtle / N-Triples load and dump via `oxigraph`.
//! - **Prefixes** ([`namespace::Namespaces`]) and well-known predicates
//!   ([`vocab::Vocabulary`]).

pub mod index;
pub mod namespace;
pub mod rdf;
pub mod vocab;

use serde::{Deserialize, Serialize};

/// `xsd:string`, the implicit datatype of plain literals.
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// A literal value with optional datatype or language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    /// Lexical form.
    pub value: String,
    /// Datatype IRI. `None` for plain and language-tagged literals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    /// Language tag, lowercase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A node or edge label in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

impl Term {
    /// Create an IRI term.
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    /// Create a plain (`xsd:string`) literal.
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal(Literal {
            value: value.into(),
            datatype: None,
            language: None,
        })
    }

    /// Create a typed literal. `xsd:string` collapses to a plain literal.
    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        let datatype = datatype.into();
        Term::Literal(Literal {
            value: value.into(),
            datatype: (datatype != XSD_STRING).then_some(datatype),
            language: None,
        })
    }

    /// Create a language-tagged literal.
    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal(Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into().to_lowercase()),
        })
    }

    /// The IRI, if this term is one.
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// Whether this term is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    /// The lexical form: IRI text, blank node id, or literal value.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::Blank(id) => id,
            Term::Literal(lit) => &lit.value,
        }
    }

    /// Trailing path segment of an IRI (after the last `/` or `#`),
    /// or the lexical form for other terms.
    pub fn local_name(&self) -> &str {
        match self {
            Term::Iri(iri) => local_name(iri),
            other => other.lexical(),
        }
    }
}

/// Trailing segment of an IRI after the last `/` or `#`.
pub fn local_name(iri: &str) -> &str {
    iri.rsplit(['/', '#']).next().unwrap_or(iri)
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::Blank(id) => write!(f, "_:{id}"),
            Term::Literal(lit) => {
                write!(f, "{:?}", lit.value)?;
                if let Some(lang) = &lit.language {
                    write!(f, "@{lang}")
                } else if let Some(dt) = &lit.datatype {
                    write!(f, "^^<{dt}>")
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A triple (subject, predicate, object) in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    /// The subject of the triple.
    pub subject: Term,
    /// The predicate (always an IRI for well-formed data).
    pub predicate: Term,
    /// The object of the triple.
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// A triple pattern; `None` components are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: Option<Term>,
    pub predicate: Option<Term>,
    pub object: Option<Term>,
}

impl TriplePattern {
    /// Pattern matching every triple.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: Term) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_predicate(mut self, predicate: Term) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_object(mut self, object: Term) -> Self {
        self.object = Some(object);
        self
    }

    /// Whether a concrete triple satisfies this pattern.
    pub fn matches(&self, triple: &Triple) -> bool {
        self.subject.as_ref().is_none_or(|s| *s == triple.subject)
            && self.predicate.as_ref().is_none_or(|p| *p == triple.predicate)
            && self.object.as_ref().is_none_or(|o| *o == triple.object)
    }
}
