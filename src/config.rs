//! Engine configuration, read from a TOML file.
//!
//! Every section and field is optional. Defaults describe the Wikidata movie
//! graph the engine was built for:
//!
//! ```toml
//! [graph]
//! path = "data/14_graph.nt"
//!
//! [embeddings]
//! entity_vectors = "data/entity_embeds.npy"
//! entity_ids = "data/entity_ids.del"
//! relation_vectors = "data/relation_embeds.npy"
//! relation_ids = "data/relation_ids.del"
//!
//! [crowd]
//! path = "data/crowd_data.tsv"
//! tie_policy = "undecided"
//!
//! [output]
//! dir = "build"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::answer::AnswerConfig;
use crate::crowd::aggregate::TiePolicy;
use crate::crowd::reliability::{DEFAULT_APPROVAL_WHITELIST, DEFAULT_MAX_FAST_SECS, ReliabilityFilter};
use crate::error::ConfigError;
use crate::fusion::FusionConfig;
use crate::graph::namespace::Namespaces;
use crate::graph::vocab::Vocabulary;
use crate::pipeline::PipelineConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub graph: GraphSection,
    pub embeddings: EmbeddingSection,
    pub crowd: CrowdSection,
    /// Replaces the default prefix table when present.
    pub namespaces: Namespaces,
    pub ontology: OntologySection,
    pub predicates: PredicateSection,
    pub resolver: ResolverSection,
    pub answer: AnswerSection,
    pub pipeline: PipelineConfig,
    pub output: OutputSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSection {
    /// Turtle or N-Triples file.
    pub path: PathBuf,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/14_graph.nt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub entity_vectors: PathBuf,
    pub entity_ids: PathBuf,
    pub relation_vectors: PathBuf,
    pub relation_ids: PathBuf,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        let dir = Path::new("data/ddis-graph-embeddings");
        Self {
            entity_vectors: dir.join("entity_embeds.npy"),
            entity_ids: dir.join("entity_ids.del"),
            relation_vectors: dir.join("relation_embeds.npy"),
            relation_ids: dir.join("relation_ids.del"),
        }
    }
}

impl EmbeddingSection {
    /// Whether all four files exist.
    pub fn available(&self) -> bool {
        [
            &self.entity_vectors,
            &self.entity_ids,
            &self.relation_vectors,
            &self.relation_ids,
        ]
        .iter()
        .all(|p| p.is_file())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdSection {
    /// Tab-separated crowd export.
    pub path: PathBuf,
    /// Workers with any row at or below this many seconds are dropped.
    pub max_fast_secs: f64,
    pub approval_whitelist: Vec<String>,
    pub tie_policy: TiePolicy,
    /// Skip verdicts from batches with a lower Fleiss' kappa.
    pub min_fleiss_kappa: Option<f64>,
}

impl Default for CrowdSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/crowd_data.tsv"),
            max_fast_secs: DEFAULT_MAX_FAST_SECS,
            approval_whitelist: DEFAULT_APPROVAL_WHITELIST.map(String::from).to_vec(),
            tie_policy: TiePolicy::default(),
            min_fleiss_kappa: None,
        }
    }
}

impl CrowdSection {
    pub fn reliability_filter(&self) -> ReliabilityFilter {
        ReliabilityFilter::new(self.max_fast_secs, self.approval_whitelist.iter().cloned())
    }

    pub fn fusion(&self) -> FusionConfig {
        FusionConfig {
            min_fleiss_kappa: self.min_fleiss_kappa,
        }
    }
}

/// Compact names of the ontology terms the engine relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologySection {
    pub instance_of: String,
    pub label: String,
    pub human: String,
    pub film_classes: Vec<String>,
    pub indirect_subclass_of: String,
    /// Prefix for bare entity ids from the linker.
    pub entity_prefix: String,
}

impl Default for OntologySection {
    fn default() -> Self {
        Self {
            instance_of: "wdt:P31".into(),
            label: "rdfs:label".into(),
            human: "wd:Q5".into(),
            film_classes: ["Q29168811", "Q202866", "Q11424", "Q229390", "Q25110269"]
                .map(|id| format!("wd:{id}"))
                .to_vec(),
            indirect_subclass_of: "ddis:indirectSubclassOf".into(),
            entity_prefix: "wd".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredicateSection {
    /// Prefix whose predicates carry `rdfs:label`s in the graph.
    pub label_namespace: String,
    /// Fixed labels for crowd predicates, by compact key.
    pub overrides: BTreeMap<String, String>,
}

impl Default for PredicateSection {
    fn default() -> Self {
        Self {
            label_namespace: "wdt".into(),
            overrides: BTreeMap::from([("wdt:P520".to_string(), "armament".to_string())]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    /// Substrings that mark a movie title as irregular.
    pub irregular_markers: Vec<String>,
}

impl Default for ResolverSection {
    fn default() -> Self {
        let mut markers: Vec<String> = ('0'..='9').map(String::from).collect();
        markers.extend([": ", ":", "!", "-"].map(String::from));
        Self {
            irregular_markers: markers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerSection {
    pub neighbours: usize,
    pub recommendations_per_seed: usize,
}

impl Default for AnswerSection {
    fn default() -> Self {
        Self {
            neighbours: AnswerConfig::default().neighbours,
            recommendations_per_seed: 4,
        }
    }
}

impl AnswerSection {
    pub fn answer_config(&self) -> AnswerConfig {
        AnswerConfig {
            neighbours: self.neighbours,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Directory for build artifacts.
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("build"),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });
        if self.ontology.film_classes.is_empty() {
            return invalid("ontology.film_classes must name at least one class".into());
        }
        if self.namespaces.get(&self.ontology.entity_prefix).is_none() {
            return invalid(format!(
                "ontology.entity_prefix `{}` is not a configured namespace",
                self.ontology.entity_prefix
            ));
        }
        if self.namespaces.get(&self.predicates.label_namespace).is_none() {
            return invalid(format!(
                "predicates.label_namespace `{}` is not a configured namespace",
                self.predicates.label_namespace
            ));
        }
        if !(0.0..=1.0).contains(&self.pipeline.min_confidence) {
            return invalid(format!(
                "pipeline.min_confidence must be within [0, 1], got {}",
                self.pipeline.min_confidence
            ));
        }
        if self.crowd.max_fast_secs < 0.0 {
            return invalid("crowd.max_fast_secs must not be negative".into());
        }
        self.vocabulary().map(|_| ())
    }

    /// Expand the ontology names against the namespace table.
    pub fn vocabulary(&self) -> Result<Vocabulary, ConfigError> {
        let o = &self.ontology;
        Vocabulary::resolve(
            &self.namespaces,
            &o.instance_of,
            &o.label,
            &o.human,
            &o.film_classes,
            &o.indirect_subclass_of,
        )
    }
}
