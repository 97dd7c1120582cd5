//! End-to-end integration tests for the cinegraph engine.
//!
//! These tests load a small movie world from disk, run the crowd build,
//! and query the fused graph through the answer engine, the recommender
//! and the question pipeline.

mod common;

use cinegraph::answer::AnswerSource;
use cinegraph::crowd::aggregate::Verdict;
use cinegraph::crowd::load_tasks;
use cinegraph::engine::{BuildReport, Engine};
use cinegraph::graph::{Term, Triple};
use cinegraph::pipeline::Response;
use cinegraph::provenance::ChangeKind;
use cinegraph::resolve::extract::{CatalogTagger, Intent, NoExtraction};

use common::{WD, WDT, wd, write_world};

fn built_engine(dir: &std::path::Path) -> (Engine, BuildReport) {
    let config = write_world(dir);
    let tasks = load_tasks(&config.crowd.path).unwrap();
    let engine = Engine::open(config).unwrap();
    let report = engine.build(&tasks).unwrap();
    (engine, report)
}

fn intent(tag: &'static str) -> impl Fn(&str) -> Intent {
    move |_| Intent {
        tag: tag.to_string(),
        confidence: 0.95,
    }
}

#[test]
fn crowd_build_filters_aggregates_and_fuses() {
    let dir = tempfile::TempDir::new().unwrap();
    let (engine, report) = built_engine(dir.path());

    assert_eq!(report.tasks, 20);
    let excluded: Vec<&str> = report.filter.excluded_workers.iter().map(String::as_str).collect();
    assert_eq!(excluded, vec!["wfast", "wnew"]);

    let hits: Vec<&str> = report.verdicts.iter().map(|v| v.hit_id.as_str()).collect();
    assert_eq!(hits, vec!["h1", "h2", "h3", "h4", "h5", "h7"]);
    let h1 = &report.verdicts[0];
    assert_eq!(h1.verdict, Verdict::Correct);
    assert_eq!((h1.distribution.correct, h1.distribution.incorrect), (5, 2));
    assert_eq!(report.verdicts[5].verdict, Verdict::Undecided);

    let c = report.fusion.counters;
    assert_eq!(c.fixed, 1);
    assert_eq!(c.added, 2);
    assert_eq!(c.replaced, 1);
    assert_eq!(c.already_present, 1);
    assert_eq!(c.skipped_undecided, 1);

    let ledger = &report.fusion.ledger;
    assert_eq!(ledger.change_of("h2"), Some(ChangeKind::Fixed));
    assert_eq!(ledger.change_of("h3"), Some(ChangeKind::Replaced));
    assert_eq!(ledger.change_of("h4"), Some(ChangeKind::Added));

    let p = |id: &str| Term::iri(format!("{WDT}{id}"));
    let m = |id: &str| Term::iri(wd(id));
    let graph = engine.graph();
    assert!(graph.contains(&Triple::new(m("M2"), p("P57"), m("P3"))));
    assert!(!graph.contains(&Triple::new(m("M2"), p("P57"), m("P2"))));
    assert!(graph.contains(&Triple::new(m("M3"), p("P462"), Term::literal("blue"))));
    assert!(!graph.contains(&Triple::new(m("M3"), p("P462"), Term::literal("red"))));
    // The tie was not applied.
    assert!(!graph.contains(&Triple::new(m("M4"), p("P136"), m("G2"))));

    assert_eq!(report.crowd_predicates, vec!["wdt:P344", "ddis:indirectSubclassOf"]);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.misc[&wd("C1")].label, "heist film");
    assert_eq!(snapshot.lexicon.irregular_titles, vec!["2001: A Space Odyssey"]);
}

#[test]
fn answer_cardinality_policy() {
    let dir = tempfile::TempDir::new().unwrap();
    let (engine, _) = built_engine(dir.path());

    let one = engine.answer("M1", "director");
    let one = one.found().unwrap();
    assert_eq!(one.values, vec!["Michael Mann"]);
    assert_eq!(one.source, AnswerSource::Graph);

    let release = engine.answer("wd:M1", "publication date");
    assert_eq!(release.found().unwrap().values, vec!["1995"]);

    let none = engine.answer("M4", "genre");
    let none = none.found().unwrap();
    assert_eq!(none.values, vec!["science fiction film"]);
    assert_eq!(none.source, AnswerSource::Embeddings);

    let many = engine.answer(&wd("M1"), "genre");
    let many = many.found().unwrap();
    assert_eq!(many.values, vec!["crime film", "drama"]);
    assert_eq!(many.source, AnswerSource::Graph);

    let fixed = engine.answer("M2", "director");
    assert_eq!(fixed.found().unwrap().values, vec!["John Frankenheimer"]);

    let crowd = engine.answer("M1", "director of photography");
    let crowd = crowd.found().unwrap();
    assert_eq!(crowd.values, vec!["Dante Spinotti"]);
    assert!(crowd.crowd_sourced);
}

#[test]
fn recommendations_exclude_seeds() {
    let dir = tempfile::TempDir::new().unwrap();
    let (engine, _) = built_engine(dir.path());

    let recs = engine.recommend(&["M1", "M2"]);
    assert!(!recs.is_empty());
    assert_eq!(recs[0].id, wd("M3"));
    assert!(recs.iter().all(|r| r.id != wd("M1") && r.id != wd("M2")));
    assert!(recs.iter().all(|r| r.label != "Heat" && r.label != "Ronin"));
}

#[test]
fn pipeline_answers_free_text_questions() {
    let dir = tempfile::TempDir::new().unwrap();
    let (engine, _) = built_engine(dir.path());
    let snapshot = engine.snapshot();
    let tagger = CatalogTagger::new(&snapshot.lexicon);

    // Resolved through the irregular-title matcher alone.
    let r = engine.respond(
        "Who directed 2001: A Space Odyssey?",
        &intent("director"),
        &NoExtraction,
        &NoExtraction,
    );
    assert_eq!(r.to_string(), "The director of 2001: A Space Odyssey is Stanley Kubrick.");

    let r = engine.respond("What is the genre of Heat?", &intent("genre"), &NoExtraction, &tagger);
    assert_eq!(r.to_string(), "The genre of Heat is crime film and drama.");

    // Primary linker ids are type-checked against the graph.
    let linker = |_: &str| {
        vec![cinegraph::resolve::extract::LinkedCandidate {
            id: "M3".into(),
            label: "Collateral".into(),
        }]
    };
    let r = engine.respond("Recommend something like Collateral", &intent("recommendation"), &linker, &NoExtraction);
    let Response::Recommendations { seeds, items } = &r else {
        panic!("expected recommendations, got {r:?}");
    };
    assert_eq!(seeds[0].id, format!("{WD}M3"));
    assert!(items.iter().all(|i| i.id != seeds[0].id));

    let r = engine.respond("hello", &intent("greeting"), &NoExtraction, &NoExtraction);
    assert!(matches!(r, Response::SmallTalk { .. }));

    let r = engine.respond("Who directed it?", &intent("director"), &NoExtraction, &tagger);
    assert!(matches!(r, Response::Unanswerable { .. }));
}
