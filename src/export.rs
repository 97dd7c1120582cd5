//! Build artifacts on disk.
//!
//! A build writes the fused graph as N-Triples plus one JSON file per
//! derived structure. Query-time processes reload them instead of redoing
//! the crowd build.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::crowd::aggregate::AggregatedVerdict;
use crate::error::{CineResult, StoreError};
use crate::graph::index::KnowledgeGraph;
use crate::graph::rdf;
use crate::lexicon::MiscCatalog;
use crate::predicates::PredicateDictionary;
use crate::provenance::ProvenanceLedger;

pub const GRAPH_FILE: &str = "updated_graph.nt";
pub const PREDICATES_FILE: &str = "predicate_dict.json";
pub const CROWD_PREDICATES_FILE: &str = "crowd_predicates.json";
pub const PROVENANCE_FILE: &str = "provenance.json";
pub const VERDICTS_FILE: &str = "verdicts.json";
pub const MISC_FILE: &str = "misc_entities.json";

/// Everything a query-time engine needs from a build, besides the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildArtifacts {
    pub predicates: PredicateDictionary,
    pub misc: MiscCatalog,
    pub provenance: ProvenanceLedger,
    pub verdicts: Vec<AggregatedVerdict>,
}

/// Reads and writes build artifacts under one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Whether a complete build is present.
    pub fn exists(&self) -> bool {
        [
            GRAPH_FILE,
            PREDICATES_FILE,
            CROWD_PREDICATES_FILE,
            PROVENANCE_FILE,
            MISC_FILE,
        ]
        .iter()
        .all(|f| self.path(f).is_file())
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.display().to_string(),
            source,
        })
    }

    /// Write the graph and every artifact.
    pub fn save(&self, graph: &KnowledgeGraph, artifacts: &BuildArtifacts) -> CineResult<()> {
        self.ensure_dir()?;
        rdf::dump_file(graph, &self.path(GRAPH_FILE))?;
        self.write_json(PREDICATES_FILE, artifacts.predicates.labels())?;
        self.write_json(CROWD_PREDICATES_FILE, &artifacts.predicates.crowd_entries())?;
        self.write_json(PROVENANCE_FILE, &artifacts.provenance)?;
        self.save_verdicts(&artifacts.verdicts)?;
        self.write_json(MISC_FILE, &artifacts.misc)?;
        tracing::info!(dir = %self.dir.display(), "saved build artifacts");
        Ok(())
    }

    /// Write only the verdicts.
    pub fn save_verdicts(&self, verdicts: &[AggregatedVerdict]) -> Result<(), StoreError> {
        self.ensure_dir()?;
        self.write_json(VERDICTS_FILE, verdicts)
    }

    /// Load the fused graph into `graph`. Returns the number of new triples.
    pub fn load_graph(&self, graph: &KnowledgeGraph) -> CineResult<usize> {
        Ok(rdf::load_file(graph, &self.path(GRAPH_FILE))?)
    }

    /// Load every JSON artifact. A missing verdicts file loads as empty.
    pub fn load(&self) -> Result<BuildArtifacts, StoreError> {
        let labels: BTreeMap<String, String> = self.read_json(PREDICATES_FILE)?;
        let crowd: BTreeMap<String, String> = self.read_json(CROWD_PREDICATES_FILE)?;
        let predicates = PredicateDictionary::from_parts(labels, crowd.into_keys().collect());
        let verdicts = if self.path(VERDICTS_FILE).is_file() {
            self.read_json(VERDICTS_FILE)?
        } else {
            Vec::new()
        };
        let artifacts = BuildArtifacts {
            predicates,
            misc: self.read_json(MISC_FILE)?,
            provenance: self.read_json(PROVENANCE_FILE)?,
            verdicts,
        };
        tracing::info!(
            dir = %self.dir.display(),
            predicates = artifacts.predicates.len(),
            misc = artifacts.misc.len(),
            verdicts = artifacts.verdicts.len(),
            "loaded build artifacts"
        );
        Ok(artifacts)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path(file);
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        let mut writer = BufWriter::new(File::create(&path).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|e| StoreError::Serialization {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T, StoreError> {
        let path = self.path(file);
        let reader = File::open(&path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(reader)).map_err(|e| StoreError::Serialization {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crowd::aggregate::{Verdict, VoteDistribution};
    use crate::graph::{Term, Triple};
    use crate::lexicon::MiscEntity;

    fn triple(o: &str) -> Triple {
        Triple::new(
            Term::iri("http://www.wikidata.org/entity/M1"),
            Term::iri("http://www.wikidata.org/prop/direct/P57"),
            Term::literal(o),
        )
    }

    fn artifacts() -> BuildArtifacts {
        let mut predicates = PredicateDictionary::new();
        predicates.insert("wdt:P57".into(), "director".into());
        predicates.insert_crowd("wdt:P520".into(), "armament".into());
        let mut provenance = ProvenanceLedger::new();
        provenance.record_add("h1", triple("x"));
        provenance.record_replace("h2", triple("blue"), vec![triple("red")]);
        let misc = MiscCatalog::from([(
            "http://www.wikidata.org/entity/C1".to_string(),
            MiscEntity {
                label: "comedy film".into(),
                class: Term::iri("http://www.wikidata.org/entity/Q11424"),
                hit_id: "h3".into(),
            },
        )]);
        let verdicts = vec![AggregatedVerdict {
            hit_id: "h1".into(),
            hit_type_id: "b".into(),
            statement: ["wd:M1".into(), "wdt:P57".into(), "x".into()],
            triple: triple("x"),
            verdict: Verdict::Correct,
            distribution: VoteDistribution {
                correct: 2,
                incorrect: 1,
            },
            correction: None,
            fix_position: None,
            fleiss_kappa: None,
        }];
        BuildArtifacts {
            predicates,
            misc,
            provenance,
            verdicts,
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("out"));
        let graph = KnowledgeGraph::new();
        graph.insert(&triple("x")).unwrap();
        let saved = artifacts();

        assert!(!store.exists());
        store.save(&graph, &saved).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, saved);
        assert!(loaded.predicates.is_crowd("wdt:P520"));

        let reloaded = KnowledgeGraph::new();
        assert_eq!(store.load_graph(&reloaded).unwrap(), 1);
        assert!(reloaded.contains(&triple("x")));
    }

    #[test]
    fn crowd_predicates_file_is_a_plain_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save(&KnowledgeGraph::new(), &artifacts()).unwrap();
        let text = std::fs::read_to_string(store.path(CROWD_PREDICATES_FILE)).unwrap();
        let map: BTreeMap<String, String> = serde_json::from_str(&text).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["wdt:P520"], "armament");
    }

    #[test]
    fn missing_artifact_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
