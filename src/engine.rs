//! Engine facade: top-level API for the cinegraph system.
//!
//! The `Engine` owns the knowledge graph, the embeddings and the current
//! knowledge snapshot (predicate dictionary and label catalogs). It runs the
//! offline crowd build and serves questions against the snapshot.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::answer::{Answer, HybridAnswerEngine};
use crate::config::EngineConfig;
use crate::crowd::CrowdTask;
use crate::crowd::aggregate::{AggregatedVerdict, Aggregator};
use crate::crowd::reliability::FilterOutcome;
use crate::embedding::EmbeddingIndex;
use crate::error::CineResult;
use crate::export::{ArtifactStore, BuildArtifacts};
use crate::fusion::{FusionReport, KgFusionEngine};
use crate::graph::index::KnowledgeGraph;
use crate::graph::rdf;
use crate::graph::vocab::Vocabulary;
use crate::lexicon::{Lexicon, MiscCatalog, misc_from_verdicts};
use crate::pipeline::{QuestionPipeline, Response};
use crate::predicates::{PredicateDictionary, PredicateLabelResolver};
use crate::recommend::{Recommendation, RecommendationEngine};
use crate::resolve::extract::{EntityLinker, IntentClassifier, NerTagger};
use crate::resolve::{EntityKind, EntityRecord, EntityResolver};

/// Derived lookup structures, rebuilt as a whole after the graph changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeSnapshot {
    pub predicates: PredicateDictionary,
    pub lexicon: Lexicon,
    pub misc: MiscCatalog,
}

/// Everything a crowd build produced.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub tasks: usize,
    pub filter: FilterOutcome,
    pub verdicts: Vec<AggregatedVerdict>,
    pub fusion: FusionReport,
    /// Predicate keys contributed by crowd data only.
    pub crowd_predicates: Vec<String>,
}

impl std::fmt::Display for BuildReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = &self.fusion.counters;
        writeln!(f, "crowd build")?;
        writeln!(f, "  tasks:            {}", self.tasks)?;
        writeln!(f, "  kept tasks:       {}", self.filter.kept.len())?;
        writeln!(f, "  excluded workers: {}", self.filter.excluded_workers.len())?;
        writeln!(f, "  verdicts:         {}", self.verdicts.len())?;
        writeln!(f, "  fixed:            {}", c.fixed)?;
        writeln!(f, "  added:            {}", c.added)?;
        writeln!(f, "  replaced:         {}", c.replaced)?;
        writeln!(f, "  skipped:          {}", c.skipped_undecided + c.skipped_low_agreement)?;
        writeln!(f, "  crowd predicates: {}", self.crowd_predicates.len())?;
        Ok(())
    }
}

/// The cinegraph engine.
pub struct Engine {
    config: EngineConfig,
    vocab: Vocabulary,
    graph: Arc<KnowledgeGraph>,
    embeddings: Arc<EmbeddingIndex>,
    snapshot: RwLock<Arc<KnowledgeSnapshot>>,
}

impl Engine {
    /// Create an engine over an already loaded graph and embeddings. The
    /// snapshot is derived from the graph alone, with no crowd data.
    pub fn new(config: EngineConfig, graph: KnowledgeGraph, embeddings: EmbeddingIndex) -> CineResult<Self> {
        config.validate()?;
        let vocab = config.vocabulary()?;
        let engine = Self {
            config,
            vocab,
            graph: Arc::new(graph),
            embeddings: Arc::new(embeddings),
            snapshot: RwLock::new(Arc::default()),
        };
        let predicates = engine.predicate_resolver().from_graph(&engine.graph);
        engine.install(predicates, MiscCatalog::new());
        Ok(engine)
    }

    /// Load the source graph and, when all four files exist, the embeddings.
    pub fn open(config: EngineConfig) -> CineResult<Self> {
        let graph = KnowledgeGraph::new();
        rdf::load_file(&graph, &config.graph.path)?;
        let embeddings = Self::load_embeddings(&config)?;
        Self::new(config, graph, embeddings)
    }

    /// Load the fused graph and artifacts written by a previous build.
    pub fn open_built(config: EngineConfig) -> CineResult<Self> {
        config.validate()?;
        let store = ArtifactStore::new(&config.output.dir);
        let graph = KnowledgeGraph::new();
        store.load_graph(&graph)?;
        let artifacts = store.load()?;
        let embeddings = Self::load_embeddings(&config)?;
        let vocab = config.vocabulary()?;
        let lexicon = Lexicon::build(&graph, &vocab, &artifacts.misc, &config.resolver.irregular_markers);
        Ok(Self {
            config,
            vocab,
            graph: Arc::new(graph),
            embeddings: Arc::new(embeddings),
            snapshot: RwLock::new(Arc::new(KnowledgeSnapshot {
                predicates: artifacts.predicates,
                lexicon,
                misc: artifacts.misc,
            })),
        })
    }

    fn load_embeddings(config: &EngineConfig) -> CineResult<EmbeddingIndex> {
        let e = &config.embeddings;
        if !e.available() {
            tracing::warn!("embedding files not found, answering from the graph only");
            return Ok(EmbeddingIndex::empty());
        }
        Ok(EmbeddingIndex::load(
            &e.entity_vectors,
            &e.entity_ids,
            &e.relation_vectors,
            &e.relation_ids,
        )?)
    }

    /// Filter and aggregate crowd rows without touching the graph.
    pub fn aggregate(&self, tasks: &[CrowdTask]) -> (FilterOutcome, Vec<AggregatedVerdict>) {
        let filter = self.config.crowd.reliability_filter().filter(tasks);
        let verdicts = Aggregator::new(self.config.namespaces.clone(), self.config.crowd.tie_policy)
            .aggregate(&filter.kept);
        (filter, verdicts)
    }

    /// Run the crowd build: filter, aggregate, fuse into the graph, then
    /// rebuild the snapshot.
    pub fn build(&self, tasks: &[CrowdTask]) -> CineResult<BuildReport> {
        let (filter, verdicts) = self.aggregate(tasks);
        // Pass 1 sees the graph as loaded; crowd-introduced predicates stay crowd-only.
        let resolver = self.predicate_resolver();
        let mut predicates = resolver.from_graph(&self.graph);
        let fusion = KgFusionEngine::new(&self.graph, self.config.crowd.fusion()).apply(&verdicts)?;
        let crowd_predicates = resolver.extend_with_crowd(&mut predicates, &self.graph, &verdicts);
        let misc = misc_from_verdicts(&self.graph, &self.vocab, &verdicts);
        self.install(predicates, misc);
        Ok(BuildReport {
            tasks: tasks.len(),
            filter,
            verdicts,
            fusion,
            crowd_predicates,
        })
    }

    /// Write the fused graph and the artifacts of `report` to `dir`.
    pub fn persist(&self, report: &BuildReport, dir: &Path) -> CineResult<()> {
        let snapshot = self.snapshot();
        let artifacts = BuildArtifacts {
            predicates: snapshot.predicates.clone(),
            misc: snapshot.misc.clone(),
            provenance: report.fusion.ledger.clone(),
            verdicts: report.verdicts.clone(),
        };
        ArtifactStore::new(dir).save(&self.graph, &artifacts)
    }

    fn predicate_resolver(&self) -> PredicateLabelResolver<'_> {
        PredicateLabelResolver::new(
            &self.config.namespaces,
            &self.vocab,
            &self.config.predicates.label_namespace,
            &self.config.predicates.overrides,
        )
    }

    /// Rebuild the label catalogs from the current graph and swap in a new
    /// snapshot.
    fn install(&self, predicates: PredicateDictionary, misc: MiscCatalog) {
        let lexicon = Lexicon::build(
            &self.graph,
            &self.vocab,
            &misc,
            &self.config.resolver.irregular_markers,
        );
        let fresh = Arc::new(KnowledgeSnapshot {
            predicates,
            lexicon,
            misc,
        });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Route one question through the full pipeline.
    pub fn respond(
        &self,
        question: &str,
        classifier: &dyn IntentClassifier,
        linker: &dyn EntityLinker,
        tagger: &dyn NerTagger,
    ) -> Response {
        let snapshot = self.snapshot();
        let pipeline = QuestionPipeline::new(
            classifier,
            linker,
            tagger,
            self.resolver(&snapshot),
            self.answers(&snapshot),
            self.recommender(&snapshot),
            &self.config.pipeline,
        );
        pipeline.respond(question)
    }

    /// Answer `(entity, relation label)`. The entity may be a bare id, a
    /// compact name or a full IRI.
    pub fn answer(&self, entity: &str, relation: &str) -> Answer {
        let snapshot = self.snapshot();
        let Some(iri) = self
            .config
            .namespaces
            .entity_iri(entity, &self.config.ontology.entity_prefix)
        else {
            return Answer::NoAnswer(crate::answer::NoAnswerReason::NoEntity);
        };
        self.answers(&snapshot).answer_for_label(&iri, relation)
    }

    /// Recommend movies similar to the given seed entities.
    pub fn recommend(&self, seeds: &[&str]) -> Vec<Recommendation> {
        let snapshot = self.snapshot();
        let records: Vec<EntityRecord> = seeds
            .iter()
            .filter_map(|id| {
                let iri = self
                    .config
                    .namespaces
                    .entity_iri(id, &self.config.ontology.entity_prefix)?;
                let label = snapshot.lexicon.label_of(&iri).unwrap_or_default().to_string();
                Some(EntityRecord {
                    id: iri,
                    label,
                    kind: EntityKind::Movie,
                })
            })
            .collect();
        self.recommender(&snapshot).recommend(&records)
    }

    fn resolver<'a>(&'a self, snapshot: &'a KnowledgeSnapshot) -> EntityResolver<'a> {
        EntityResolver::new(
            &self.graph,
            &self.vocab,
            &self.config.namespaces,
            &snapshot.lexicon,
            &self.config.ontology.entity_prefix,
            &self.config.resolver.irregular_markers,
        )
    }

    fn answers<'a>(&'a self, snapshot: &'a KnowledgeSnapshot) -> HybridAnswerEngine<'a> {
        HybridAnswerEngine::new(
            &self.graph,
            &self.embeddings,
            &self.config.namespaces,
            &self.vocab,
            &snapshot.predicates,
            &snapshot.lexicon,
            self.config.answer.answer_config(),
        )
    }

    fn recommender<'a>(&'a self, snapshot: &'a KnowledgeSnapshot) -> RecommendationEngine<'a> {
        RecommendationEngine::new(
            &self.embeddings,
            &snapshot.lexicon,
            self.config.answer.recommendations_per_seed,
        )
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn embeddings(&self) -> &EmbeddingIndex {
        &self.embeddings
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Summary statistics.
    pub fn info(&self) -> EngineInfo {
        let snapshot = self.snapshot();
        EngineInfo {
            triples: self.graph.len(),
            nodes: self.graph.node_count(),
            predicates: self.graph.predicate_count(),
            entity_vectors: self.embeddings.entities().len(),
            relation_vectors: self.embeddings.relations().len(),
            dimension: self.embeddings.entities().dim(),
            movies: snapshot.lexicon.movies.len(),
            people: snapshot.lexicon.people.len(),
            misc: snapshot.misc.len(),
            irregular_titles: snapshot.lexicon.irregular_titles.len(),
            dictionary: snapshot.predicates.len(),
            crowd_predicates: snapshot.predicates.crowd_entries().len(),
        }
    }
}

/// Engine statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub triples: usize,
    pub nodes: usize,
    pub predicates: usize,
    pub entity_vectors: usize,
    pub relation_vectors: usize,
    pub dimension: usize,
    pub movies: usize,
    pub people: usize,
    pub misc: usize,
    pub irregular_titles: usize,
    pub dictionary: usize,
    pub crowd_predicates: usize,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "cinegraph engine info")?;
        writeln!(f, "  triples:          {}", self.triples)?;
        writeln!(f, "  nodes:            {}", self.nodes)?;
        writeln!(f, "  predicates:       {}", self.predicates)?;
        writeln!(f, "  entity vectors:   {}", self.entity_vectors)?;
        writeln!(f, "  relation vectors: {}", self.relation_vectors)?;
        writeln!(f, "  dimension:        {}", self.dimension)?;
        writeln!(f, "  movies:           {}", self.movies)?;
        writeln!(f, "  people:           {}", self.people)?;
        writeln!(f, "  misc entities:    {}", self.misc)?;
        writeln!(f, "  irregular titles: {}", self.irregular_titles)?;
        writeln!(f, "  dictionary:       {}", self.dictionary)?;
        writeln!(f, "  crowd predicates: {}", self.crowd_predicates)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("knowledge_graph", &self.graph)
            .finish()
    }
}
