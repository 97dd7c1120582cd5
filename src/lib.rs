// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # cinegraph
//!
//! Movie question answering over a crowd-verified knowledge graph.
//!
//! ## Architecture
//!
//! - **Knowledge graph** (`graph`): interned, petgraph-indexed RDF triples with
//!   Turtle / N-Triples I/O through oxigraph
//! - **Embeddings** (`embedding`): memory-mapped `.npy` vectors with an exact,
//!   rayon-parallel nearest-neighbour scan
//! - **Crowd consensus** (`crowd`): worker filtering, majority voting and
//!   Fleiss' kappa
//! - **Fusion** (`fusion`, `provenance`): applies crowd verdicts to the graph
//!   and records every change
//! - **Dictionaries** (`predicates`, `lexicon`): predicate labels and entity
//!   label catalogs
//! - **Question answering** (`resolve`, `answer`, `recommend`, `pipeline`):
//!   entity resolution, hybrid graph/embedding answers, recommendations
//!
//! ## Library usage
//!
//! ```no_run
//! use cinegraph::config::EngineConfig;
//! use cinegraph::crowd::load_tasks;
//! use cinegraph::engine::Engine;
//!
//! let config = EngineConfig::default();
//! let tasks = load_tasks(&config.crowd.path).unwrap();
//! let engine = Engine::open(config).unwrap();
//! let report = engine.build(&tasks).unwrap();
//! println!("{report}");
//! println!("{:?}", engine.answer("Q1", "director"));
//! ```

pub mod answer;
pub mod config;
pub mod crowd;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod export;
pub mod fusion;
pub mod graph;
pub mod lexicon;
pub mod pipeline;
pub mod predicates;
pub mod provenance;
pub mod recommend;
pub mod registry;
pub mod resolve;
pub mod symbol;
