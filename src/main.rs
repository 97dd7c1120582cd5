//! cinegraph CLI: crowd-verified movie knowledge graph question answering.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use cinegraph::answer::{Answer, join_values};
use cinegraph::config::EngineConfig;
use cinegraph::crowd::load_tasks;
use cinegraph::engine::Engine;
use cinegraph::export::ArtifactStore;
use cinegraph::resolve::extract::{CatalogTagger, Intent, NoExtraction};

#[derive(Parser)]
#[command(name = "cinegraph", version, about = "Crowd-verified movie knowledge graph QA")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Override the source graph path.
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    /// Override the crowd data path.
    #[arg(long, global = true)]
    crowd: Option<PathBuf>,

    /// Override the build output directory.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter and aggregate crowd data, fuse it into the graph, and write
    /// the build artifacts.
    Build,

    /// Aggregate crowd data into verdicts without touching the graph.
    Aggregate {
        /// Print verdicts as JSON instead of writing verdicts.json.
        #[arg(long)]
        stdout: bool,
    },

    /// Answer a factual question about one entity.
    Answer {
        /// Entity id: `Q42`, `wd:Q42` or a full IRI.
        #[arg(long)]
        entity: String,

        /// Relation label as it appears in the predicate dictionary.
        #[arg(long)]
        relation: String,
    },

    /// Route a free-text question through the pipeline with a given intent.
    Ask {
        /// The question.
        question: String,

        /// Intent tag, as a classifier would produce it.
        #[arg(long)]
        intent: String,

        /// Classifier confidence.
        #[arg(long, default_value = "1.0")]
        confidence: f32,
    },

    /// Recommend movies similar to the given ones.
    Recommend {
        /// Seed movie ids.
        #[arg(required = true)]
        movies: Vec<String>,
    },

    /// List the predicate dictionary.
    Predicates {
        /// Only crowd-contributed predicates.
        #[arg(long)]
        crowd_only: bool,
    },

    /// Show graph and embedding statistics.
    Info,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(graph) = cli.graph {
        config.graph.path = graph;
    }
    if let Some(crowd) = cli.crowd {
        config.crowd.path = crowd;
    }
    if let Some(output) = cli.output {
        config.output.dir = output;
    }

    match cli.command {
        Commands::Build => {
            let tasks = load_tasks(&config.crowd.path)?;
            let output = config.output.dir.clone();
            let engine = Engine::open(config)?;
            let report = engine.build(&tasks)?;
            engine.persist(&report, &output)?;
            print!("{report}");
            println!("Artifacts written to {}", output.display());
        }

        Commands::Aggregate { stdout } => {
            let tasks = load_tasks(&config.crowd.path)?;
            let output = config.output.dir.clone();
            let engine = Engine::new(config, Default::default(), Default::default())?;
            let (filter, verdicts) = engine.aggregate(&tasks);
            if stdout {
                let json = serde_json::to_string_pretty(&verdicts).into_diagnostic()?;
                println!("{json}");
            } else {
                ArtifactStore::new(&output).save_verdicts(&verdicts)?;
                println!(
                    "{} verdicts from {} tasks ({} workers excluded) written to {}",
                    verdicts.len(),
                    filter.kept.len(),
                    filter.excluded_workers.len(),
                    output.display()
                );
            }
        }

        Commands::Answer { entity, relation } => {
            let engine = Engine::open_built(config)?;
            match engine.answer(&entity, &relation) {
                Answer::Found(set) => {
                    println!("{}", join_values(&set.values));
                    println!("  source: {}", set.source);
                    if set.crowd_sourced {
                        println!("  crowd-sourced predicate: {}", set.predicate);
                    }
                }
                Answer::NoAnswer(reason) => println!("No answer: {reason}"),
            }
        }

        Commands::Ask {
            question,
            intent,
            confidence,
        } => {
            let engine = Engine::open_built(config)?;
            let classifier = move |_: &str| Intent {
                tag: intent.clone(),
                confidence,
            };
            let snapshot = engine.snapshot();
            let tagger = CatalogTagger::new(&snapshot.lexicon);
            let response = engine.respond(&question, &classifier, &NoExtraction, &tagger);
            println!("{response}");
        }

        Commands::Recommend { movies } => {
            let engine = Engine::open_built(config)?;
            let seeds: Vec<&str> = movies.iter().map(String::as_str).collect();
            let recs = engine.recommend(&seeds);
            if recs.is_empty() {
                println!("No recommendations.");
            }
            for rec in recs {
                println!("{:<40} {:.4}  {}", rec.label, rec.distance, rec.id);
            }
        }

        Commands::Predicates { crowd_only } => {
            let engine = Engine::open_built(config)?;
            let snapshot = engine.snapshot();
            for (key, label) in snapshot.predicates.iter() {
                let crowd = snapshot.predicates.is_crowd(key);
                if crowd_only && !crowd {
                    continue;
                }
                let marker = if crowd { " (crowd)" } else { "" };
                println!("{key:<28} {label}{marker}");
            }
        }

        Commands::Info => {
            let store = ArtifactStore::new(&config.output.dir);
            let engine = if store.exists() {
                Engine::open_built(config)?
            } else {
                Engine::open(config)?
            };
            print!("{}", engine.info());
        }
    }

    Ok(())
}
