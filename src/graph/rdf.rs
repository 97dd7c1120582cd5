//! RDF exchange: load Turtle / N-Triples into a [`KnowledgeGraph`] and dump
//! it back out, using `oxigraph`'s streaming parsers and serializers.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use oxigraph::io::{RdfFormat, RdfParser, RdfSerializer};
use oxigraph::model::{
    BlankNode, Literal as OxLiteral, NamedNode, Term as OxTerm, Triple as OxTriple,
};

use crate::error::GraphError;

use super::index::{GraphResult, KnowledgeGraph};
use super::{Literal, Term, Triple, XSD_STRING};

/// Pick the RDF format from a file extension (`.ttl`, `.nt`, ...).
pub fn format_for_path(path: &Path) -> GraphResult<RdfFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(RdfFormat::from_extension)
        .ok_or_else(|| GraphError::UnsupportedFormat {
            path: path.display().to_string(),
        })
}

/// Parse all default-graph triples from a reader.
///
/// Quads in named graphs are flattened into the default graph. RDF-star
/// quoted triples are skipped.
pub fn read_triples<R: Read>(reader: R, format: RdfFormat) -> GraphResult<Vec<Triple>> {
    let mut triples = Vec::new();
    let mut skipped = 0usize;
    for quad in RdfParser::from_format(format).for_reader(reader) {
        let quad = quad.map_err(|e| GraphError::Parse {
            message: e.to_string(),
        })?;
        let subject = from_oxigraph(OxTerm::from(quad.subject));
        let object = from_oxigraph(quad.object);
        match (subject, object) {
            (Some(subject), Some(object)) => triples.push(Triple::new(
                subject,
                Term::Iri(quad.predicate.into_string()),
                object,
            )),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "skipped quoted triples while parsing RDF");
    }
    Ok(triples)
}

/// Load an RDF file into the graph. Returns the number of new triples.
pub fn load_file(graph: &KnowledgeGraph, path: &Path) -> GraphResult<usize> {
    let format = format_for_path(path)?;
    let file = File::open(path).map_err(|source| GraphError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let triples = read_triples(BufReader::new(file), format)?;
    let parsed = triples.len();
    let inserted = graph.extend(triples)?;
    tracing::info!(
        path = %path.display(),
        parsed,
        inserted,
        "loaded RDF graph"
    );
    Ok(inserted)
}

/// Serialize triples in the given order. Returns the writer when done.
pub fn write_triples<'a, W, I>(writer: W, triples: I, format: RdfFormat) -> GraphResult<W>
where
    W: Write,
    I: IntoIterator<Item = &'a Triple>,
{
    let mut serializer = RdfSerializer::from_format(format).for_writer(writer);
    for triple in triples {
        let Some(ox) = to_oxigraph(triple)? else {
            tracing::warn!(%triple, "literal subject cannot be serialized, skipping");
            continue;
        };
        serializer
            .serialize_triple(&ox)
            .map_err(|e| GraphError::Serialize {
                message: e.to_string(),
            })?;
    }
    serializer.finish().map_err(|e| GraphError::Serialize {
        message: e.to_string(),
    })
}

/// Dump the whole graph to a file, in sorted triple order so identical
/// graphs produce identical files. Returns the number of triples written.
pub fn dump_file(graph: &KnowledgeGraph, path: &Path) -> GraphResult<usize> {
    let format = format_for_path(path)?;
    let io_err = |source| GraphError::Io {
        path: path.display().to_string(),
        source,
    };
    let triples = graph.all_triples();
    let file = File::create(path).map_err(io_err)?;
    let mut writer = write_triples(BufWriter::new(file), &triples, format)?;
    writer.flush().map_err(io_err)?;
    tracing::info!(path = %path.display(), triples = triples.len(), "wrote RDF graph");
    Ok(triples.len())
}

fn from_oxigraph(term: OxTerm) -> Option<Term> {
    match term {
        OxTerm::NamedNode(node) => Some(Term::Iri(node.into_string())),
        OxTerm::BlankNode(node) => Some(Term::Blank(node.into_string())),
        OxTerm::Literal(lit) => Some(Term::Literal(from_oxigraph_literal(&lit))),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn from_oxigraph_literal(lit: &OxLiteral) -> Literal {
    if let Some(language) = lit.language() {
        return Literal {
            value: lit.value().to_string(),
            datatype: None,
            language: Some(language.to_lowercase()),
        };
    }
    let datatype = lit.datatype().as_str();
    Literal {
        value: lit.value().to_string(),
        datatype: (datatype != XSD_STRING).then(|| datatype.to_string()),
        language: None,
    }
}

fn serialize_err(e: impl std::fmt::Display) -> GraphError {
    GraphError::Serialize {
        message: e.to_string(),
    }
}

fn named(iri: &str) -> GraphResult<NamedNode> {
    NamedNode::new(iri).map_err(serialize_err)
}

fn to_oxigraph_object(term: &Term) -> GraphResult<OxTerm> {
    Ok(match term {
        Term::Iri(iri) => named(iri)?.into(),
        Term::Blank(id) => BlankNode::new(id).map_err(serialize_err)?.into(),
        Term::Literal(lit) => match (&lit.language, &lit.datatype) {
            (Some(language), _) => {
                OxLiteral::new_language_tagged_literal(lit.value.as_str(), language.as_str())
                    .map_err(serialize_err)?
                    .into()
            }
            (None, Some(datatype)) => {
                OxLiteral::new_typed_literal(lit.value.as_str(), named(datatype)?).into()
            }
            (None, None) => OxLiteral::new_simple_literal(lit.value.as_str()).into(),
        },
    })
}

/// `None` for triples with a literal subject, which RDF cannot express.
fn to_oxigraph(triple: &Triple) -> GraphResult<Option<OxTriple>> {
    let Term::Iri(predicate) = &triple.predicate else {
        return Err(GraphError::Serialize {
            message: format!("predicate must be an IRI: {}", triple.predicate),
        });
    };
    let predicate = named(predicate)?;
    let object = to_oxigraph_object(&triple.object)?;
    Ok(match &triple.subject {
        Term::Iri(iri) => Some(OxTriple::new(named(iri)?, predicate, object)),
        Term::Blank(id) => Some(OxTriple::new(
            BlankNode::new(id).map_err(serialize_err)?,
            predicate,
            object,
        )),
        Term::Literal(_) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TURTLE: &str = r#"
@prefix wd: <http://www.wikidata.org/entity/> .
@prefix wdt: <http://www.wikidata.org/prop/direct/> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .

wd:Q1 wdt:P31 wd:Q11424 ;
      rdfs:label "Pulp Fiction"@en ;
      wdt:P577 "1994-10-14"^^xsd:date ;
      wdt:P2047 "plain" .
"#;

    #[test]
    fn parses_turtle_terms() {
        let triples = read_triples(TURTLE.as_bytes(), RdfFormat::Turtle).unwrap();
        assert_eq!(triples.len(), 4);

        let label = triples
            .iter()
            .find(|t| t.predicate.local_name() == "label")
            .unwrap();
        assert_eq!(label.object, Term::lang_literal("Pulp Fiction", "en"));

        let plain = triples
            .iter()
            .find(|t| t.predicate.local_name() == "P2047")
            .unwrap();
        assert_eq!(plain.object, Term::literal("plain"));

        let date = triples
            .iter()
            .find(|t| t.predicate.local_name() == "P577")
            .unwrap();
        assert_eq!(
            date.object,
            Term::typed_literal("1994-10-14", "http://www.w3.org/2001/XMLSchema#date")
        );
    }

    #[test]
    fn ntriples_round_trip_preserves_terms() {
        let triples = read_triples(TURTLE.as_bytes(), RdfFormat::Turtle).unwrap();
        let bytes = write_triples(Vec::new(), &triples, RdfFormat::NTriples).unwrap();
        let back = read_triples(bytes.as_slice(), RdfFormat::NTriples).unwrap();
        assert_eq!(back, triples);
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            format_for_path(Path::new("graph.nt")).unwrap(),
            RdfFormat::NTriples
        );
        assert_eq!(
            format_for_path(Path::new("graph.ttl")).unwrap(),
            RdfFormat::Turtle
        );
        assert!(matches!(
            format_for_path(Path::new("graph.csv")),
            Err(GraphError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn parse_error_is_reported() {
        let err = read_triples("<a> <b> .".as_bytes(), RdfFormat::NTriples).unwrap_err();
        assert!(matches!(err, GraphError::Parse { .. }));
    }

    #[test]
    fn dump_and_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("g.nt");

        let kg = KnowledgeGraph::new();
        kg.extend(read_triples(TURTLE.as_bytes(), RdfFormat::Turtle).unwrap())
            .unwrap();
        assert_eq!(dump_file(&kg, &path).unwrap(), 4);

        let reloaded = KnowledgeGraph::new();
        assert_eq!(load_file(&reloaded, &path).unwrap(), 4);
        assert_eq!(reloaded.all_triples(), kg.all_triples());
    }
}
