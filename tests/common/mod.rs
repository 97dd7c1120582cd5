//! A small on-disk movie world shared by the integration tests.
//!
//! Movies M1..M4, people P1..P5, genres G1..G3 and one crowd-confirmed
//! subclass entity C1, with embeddings laid out so that:
//! - `M1 + genre` lands on G1 (already a graph answer),
//! - `M4 + genre` lands on G3 (the graph has no genre for M4).

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use cinegraph::config::EngineConfig;
use cinegraph::embedding::npy::{Matrix, write_matrix};

pub const WD: &str = "http://www.wikidata.org/entity/";
pub const WDT: &str = "http://www.wikidata.org/prop/direct/";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

pub fn wd(id: &str) -> String {
    format!("{WD}{id}")
}

const LABELS: &[(&str, &str)] = &[
    ("M1", "Heat"),
    ("M2", "Ronin"),
    ("M3", "Collateral"),
    ("M4", "2001: A Space Odyssey"),
    ("P1", "Michael Mann"),
    ("P2", "Stanley Kubrick"),
    ("P3", "John Frankenheimer"),
    ("P5", "Dante Spinotti"),
    ("G1", "crime film"),
    ("G2", "drama"),
    ("G3", "science fiction film"),
    ("C1", "heist film"),
];

const PREDICATE_LABELS: &[(&str, &str)] = &[
    ("P57", "director"),
    ("P577", "publication date"),
    ("P136", "genre"),
    ("P462", "color"),
    ("P344", "director of photography"),
];

fn graph_ntriples() -> String {
    let mut nt = String::new();
    let mut iri = |s: &str, p: &str, o: &str| {
        writeln!(nt, "<{s}> <{p}> <{o}> .").unwrap();
    };
    let p31 = format!("{WDT}P31");
    for m in ["M1", "M2", "M3", "M4"] {
        iri(&wd(m), &p31, &wd("Q11424"));
    }
    for p in ["P1", "P2", "P3", "P5"] {
        iri(&wd(p), &p31, &wd("Q5"));
    }
    iri(&wd("M1"), &format!("{WDT}P57"), &wd("P1"));
    iri(&wd("M2"), &format!("{WDT}P57"), &wd("P2"));
    iri(&wd("M4"), &format!("{WDT}P57"), &wd("P2"));
    iri(&wd("M1"), &format!("{WDT}P136"), &wd("G1"));
    iri(&wd("M1"), &format!("{WDT}P136"), &wd("G2"));

    let mut lit = |s: &str, p: &str, o: &str| {
        writeln!(nt, "<{s}> <{p}> \"{o}\" .").unwrap();
    };
    lit(&wd("M1"), &format!("{WDT}P577"), "1995");
    lit(&wd("M3"), &format!("{WDT}P462"), "red");
    for (id, label) in LABELS {
        lit(&wd(id), RDFS_LABEL, label);
    }
    for (id, label) in PREDICATE_LABELS {
        lit(&format!("{WDT}{id}"), RDFS_LABEL, label);
    }
    nt
}

const CROWD_HEADER: &str = "HITId\tHITTypeId\tWorkerId\tWorkTimeInSeconds\tLifetimeApprovalRate\tInput1ID\tInput2ID\tInput3ID\tAnswerID\tAnswerLabel\tFixPosition\tFixValue";

fn crowd_tsv() -> String {
    let mut tsv = String::from(CROWD_HEADER);
    tsv.push('\n');
    let mut row = |hit: &str, worker: &str, secs: u32, rate: &str, stmt: [&str; 3], answer: u8, fix: Option<(&str, &str)>| {
        let (pos, val) = fix.unwrap_or(("", ""));
        let label = if answer == 1 { "CORRECT" } else { "INCORRECT" };
        writeln!(
            tsv,
            "{hit}\tb1\t{worker}\t{secs}\t{rate}\t{}\t{}\t{}\t{answer}\t{label}\t{pos}\t{val}",
            stmt[0], stmt[1], stmt[2]
        )
        .unwrap();
    };

    // 5 vs 2 on a statement the graph already has.
    let release = ["wd:M1", "wdt:P577", "1995"];
    for w in ["w1", "w2", "w3", "w4", "w5"] {
        row("h1", w, 40, "99%", release, 1, None);
    }
    for w in ["w6", "w7"] {
        row("h1", w, 40, "98%", release, 2, None);
    }

    // Wrong director with two competing fixes; w2 wins.
    let ronin = ["wd:M2", "wdt:P57", "wd:P2"];
    row("h2", "w1", 40, "99%", ronin, 2, None);
    row("h2", "w3", 40, "99%", ronin, 2, Some(("Object", "wd:P1")));
    row("h2", "w2", 40, "99%", ronin, 2, Some(("Object", "wd:P3")));

    // Collision: the crowd says blue, the graph says red.
    let color = ["wd:M3", "wdt:P462", "blue"];
    row("h3", "w1", 40, "99%", color, 1, None);
    row("h3", "w2", 40, "99%", color, 1, None);

    // A predicate no film uses before the crowd adds it.
    let dop = ["wd:M1", "wdt:P344", "wd:P5"];
    row("h4", "w1", 40, "99%", dop, 1, None);
    row("h4", "w2", 40, "99%", dop, 1, None);

    // Miscellaneous entity.
    let heist = ["wd:C1", "ddis:indirectSubclassOf", "wd:Q11424"];
    row("h5", "w1", 40, "99%", heist, 1, None);
    row("h5", "w2", 40, "99%", heist, 1, None);

    // Only unreliable workers vote here.
    let wrong = ["wd:M1", "wdt:P57", "wd:P2"];
    row("h6", "wfast", 5, "99%", wrong, 1, None);
    row("h6", "wnew", 40, "50%", wrong, 1, None);

    // Tie.
    let tie = ["wd:M4", "wdt:P136", "wd:G2"];
    row("h7", "w1", 40, "99%", tie, 1, None);
    row("h7", "w2", 40, "99%", tie, 2, None);
    tsv
}

const ENTITY_ROWS: &[(&str, [f32; 2])] = &[
    ("M1", [0.0, 0.0]),
    ("M2", [0.5, 0.0]),
    ("M3", [0.2, 0.2]),
    ("M4", [10.0, 0.0]),
    ("P1", [3.0, 3.0]),
    ("P2", [5.0, 5.0]),
    ("P3", [6.0, 6.0]),
    ("G1", [0.0, 1.0]),
    ("G2", [-5.0, -5.0]),
    ("G3", [10.0, 1.0]),
];

const RELATION_ROWS: &[(&str, [f32; 2])] = &[("P57", [1.0, 0.0]), ("P136", [0.0, 1.0])];

fn write_table(dir: &Path, name: &str, rows: &[(&str, [f32; 2])], base: &str) -> (PathBuf, PathBuf) {
    let vectors = dir.join(format!("{name}_embeds.npy"));
    let ids = dir.join(format!("{name}_ids.del"));
    let matrix = Matrix {
        rows: rows.len(),
        cols: 2,
        data: rows.iter().flat_map(|(_, v)| *v).collect(),
    };
    write_matrix(&vectors, &matrix).unwrap();
    let mut text = String::new();
    for (i, (id, _)) in rows.iter().enumerate() {
        writeln!(text, "{i}\t{base}{id}").unwrap();
    }
    std::fs::write(&ids, text).unwrap();
    (vectors, ids)
}

/// Write the world under `dir` and return a config pointing at it.
pub fn write_world(dir: &Path) -> EngineConfig {
    let graph = dir.join("graph.nt");
    std::fs::write(&graph, graph_ntriples()).unwrap();
    let crowd = dir.join("crowd.tsv");
    std::fs::write(&crowd, crowd_tsv()).unwrap();
    let (entity_vectors, entity_ids) = write_table(dir, "entity", ENTITY_ROWS, WD);
    let (relation_vectors, relation_ids) = write_table(dir, "relation", RELATION_ROWS, WDT);

    let mut config = EngineConfig::default();
    config.graph.path = graph;
    config.crowd.path = crowd;
    config.embeddings.entity_vectors = entity_vectors;
    config.embeddings.entity_ids = entity_ids;
    config.embeddings.relation_vectors = relation_vectors;
    config.embeddings.relation_ids = relation_ids;
    config.output.dir = dir.join("build");
    config
}
