//! Crowd → knowledge graph fusion.
//!
//! Applies aggregated crowd verdicts to the graph:
//! - **Fix**: an incorrect statement present in the graph is swapped for the
//!   crowd's correction.
//! - **Add**: a correct statement missing from the graph is inserted.
//! - **Collision**: a correct statement whose `(subject, predicate)` already
//!   has other objects replaces them (last write wins).
//!
//! Each verdict is applied inside one [`GraphBatch`](crate::graph::index::GraphBatch),
//! so readers never observe a half-applied change. Every mutation is recorded
//! in the [`ProvenanceLedger`].

use serde::{Deserialize, Serialize};

use crate::crowd::aggregate::{AggregatedVerdict, Verdict};
use crate::graph::TriplePattern;
use crate::graph::index::{GraphResult, KnowledgeGraph};
use crate::provenance::ProvenanceLedger;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for crowd fusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Skip verdicts whose batch kappa is below this value. Batches with an
    /// undefined kappa are not gated. Disabled by default.
    pub min_fleiss_kappa: Option<f64>,
}

/// What applying one verdict did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionOutcome {
    Fixed,
    Added,
    /// Added after removing this many colliding triples.
    Replaced { removed: usize },
    /// Correct and already in the graph.
    AlreadyPresent,
    /// Incorrect and present, but no correction was proposed.
    NoCorrection,
    /// Incorrect, but the statement is not in the graph.
    NotInGraph,
    SkippedUndecided,
    SkippedLowAgreement,
}

/// Tally of fusion outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionCounters {
    pub fixed: usize,
    pub added: usize,
    pub replaced: usize,
    pub already_present: usize,
    pub no_correction: usize,
    pub not_in_graph: usize,
    pub skipped_undecided: usize,
    pub skipped_low_agreement: usize,
}

impl FusionCounters {
    fn record(&mut self, outcome: FusionOutcome) {
        match outcome {
            FusionOutcome::Fixed => self.fixed += 1,
            FusionOutcome::Added => self.added += 1,
            FusionOutcome::Replaced { .. } => self.replaced += 1,
            FusionOutcome::AlreadyPresent => self.already_present += 1,
            FusionOutcome::NoCorrection => self.no_correction += 1,
            FusionOutcome::NotInGraph => self.not_in_graph += 1,
            FusionOutcome::SkippedUndecided => self.skipped_undecided += 1,
            FusionOutcome::SkippedLowAgreement => self.skipped_low_agreement += 1,
        }
    }

    /// Number of verdicts that mutated the graph.
    pub fn mutations(&self) -> usize {
        self.fixed + self.added + self.replaced
    }
}

/// Result of a fusion run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionReport {
    pub ledger: ProvenanceLedger,
    pub counters: FusionCounters,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Applies crowd verdicts to a knowledge graph.
pub struct KgFusionEngine<'g> {
    graph: &'g KnowledgeGraph,
    config: FusionConfig,
}

impl<'g> KgFusionEngine<'g> {
    pub fn new(graph: &'g KnowledgeGraph, config: FusionConfig) -> Self {
        Self { graph, config }
    }

    /// Apply every verdict in order.
    pub fn apply(&self, verdicts: &[AggregatedVerdict]) -> GraphResult<FusionReport> {
        let mut report = FusionReport::default();
        for verdict in verdicts {
            let outcome = self.apply_one(verdict, &mut report.ledger)?;
            report.counters.record(outcome);
        }
        let c = report.counters;
        tracing::info!(
            fixed = c.fixed,
            added = c.added,
            replaced = c.replaced,
            unchanged = c.already_present + c.no_correction + c.not_in_graph,
            skipped = c.skipped_undecided + c.skipped_low_agreement,
            "applied crowd verdicts"
        );
        Ok(report)
    }

    /// Apply one verdict atomically, recording any mutation in `ledger`.
    pub fn apply_one(
        &self,
        verdict: &AggregatedVerdict,
        ledger: &mut ProvenanceLedger,
    ) -> GraphResult<FusionOutcome> {
        let hit_id = verdict.hit_id.as_str();

        if let (Some(min), Some(kappa)) = (self.config.min_fleiss_kappa, verdict.fleiss_kappa) {
            if kappa < min {
                tracing::debug!(hit_id, kappa, min, "verdict below agreement threshold");
                return Ok(FusionOutcome::SkippedLowAgreement);
            }
        }

        match verdict.verdict {
            Verdict::Undecided => Ok(FusionOutcome::SkippedUndecided),
            Verdict::Incorrect => self.graph.batch(|batch| {
                if !batch.contains(&verdict.triple) {
                    return Ok(FusionOutcome::NotInGraph);
                }
                let Some(correction) = &verdict.correction else {
                    tracing::info!(hit_id, triple = %verdict.triple, "crowd flagged triple without a correction");
                    return Ok(FusionOutcome::NoCorrection);
                };
                batch.remove(&verdict.triple);
                batch.insert(correction)?;
                ledger.record_fix(hit_id, correction.clone());
                tracing::debug!(hit_id, %correction, "fixed triple");
                Ok(FusionOutcome::Fixed)
            }),
            Verdict::Correct => self.graph.batch(|batch| {
                let triple = &verdict.triple;
                if batch.contains(triple) {
                    return Ok(FusionOutcome::AlreadyPresent);
                }
                let collisions = batch.matching(
                    &TriplePattern::any()
                        .with_subject(triple.subject.clone())
                        .with_predicate(triple.predicate.clone()),
                );
                for old in &collisions {
                    batch.remove(old);
                }
                batch.insert(triple)?;
                if collisions.is_empty() {
                    ledger.record_add(hit_id, triple.clone());
                    tracing::debug!(hit_id, %triple, "added triple");
                    Ok(FusionOutcome::Added)
                } else {
                    tracing::warn!(
                        hit_id,
                        %triple,
                        removed = collisions.len(),
                        "crowd value collides with existing graph values, replacing"
                    );
                    let removed = collisions.len();
                    ledger.record_replace(hit_id, triple.clone(), collisions);
                    Ok(FusionOutcome::Replaced { removed })
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crowd::aggregate::VoteDistribution;
    use crate::graph::rdf::write_triples;
    use crate::graph::{Term, Triple};
    use oxigraph::io::RdfFormat;

    fn t(o: &str) -> Triple {
        Triple::new(Term::iri("http://e/M1"), Term::iri("http://e/hasColor"), Term::literal(o))
    }

    fn verdict(hit: &str, triple: Triple, verdict: Verdict) -> AggregatedVerdict {
        AggregatedVerdict {
            hit_id: hit.into(),
            hit_type_id: "batch".into(),
            statement: [String::new(), String::new(), String::new()],
            triple,
            verdict,
            distribution: VoteDistribution::default(),
            correction: None,
            fix_position: None,
            fleiss_kappa: None,
        }
    }

    fn dump(kg: &KnowledgeGraph) -> Vec<u8> {
        write_triples(Vec::new(), &kg.all_triples(), RdfFormat::NTriples).unwrap()
    }

    #[test]
    fn fixes_incorrect_present_triple() {
        let kg = KnowledgeGraph::new();
        kg.insert(&t("red")).unwrap();
        let mut v = verdict("h1", t("red"), Verdict::Incorrect);
        v.correction = Some(t("green"));

        let report = KgFusionEngine::new(&kg, FusionConfig::default())
            .apply(&[v])
            .unwrap();
        assert!(!kg.contains(&t("red")));
        assert!(kg.contains(&t("green")));
        assert_eq!(report.ledger.fixed_triples["h1"], t("green"));
        assert_eq!(report.counters.fixed, 1);
    }

    #[test]
    fn adds_missing_correct_triple() {
        let kg = KnowledgeGraph::new();
        let report = KgFusionEngine::new(&kg, FusionConfig::default())
            .apply(&[verdict("h1", t("red"), Verdict::Correct)])
            .unwrap();
        assert!(kg.contains(&t("red")));
        assert_eq!(report.ledger.added_triples["h1"], t("red"));
        assert!(report.ledger.replaced_triples.is_empty());
    }

    #[test]
    fn collision_replaces_existing_values() {
        let kg = KnowledgeGraph::new();
        kg.insert(&t("red")).unwrap();

        let report = KgFusionEngine::new(&kg, FusionConfig::default())
            .apply(&[verdict("h1", t("blue"), Verdict::Correct)])
            .unwrap();
        assert!(!kg.contains(&t("red")));
        assert!(kg.contains(&t("blue")));
        assert_eq!(kg.len(), 1);
        assert_eq!(report.ledger.added_triples["h1"], t("blue"));
        assert_eq!(report.ledger.replaced_triples["h1"], vec![t("red")]);
        assert_eq!(report.counters.replaced, 1);
    }

    #[test]
    fn no_op_verdicts_leave_graph_identical() {
        let kg = KnowledgeGraph::new();
        kg.insert(&t("red")).unwrap();
        let before = dump(&kg);

        let mut tie = verdict("h1", t("blue"), Verdict::Undecided);
        tie.correction = Some(t("green"));
        let verdicts = [
            tie,
            verdict("h2", t("red"), Verdict::Correct),
            verdict("h3", t("red"), Verdict::Incorrect),
            verdict("h4", t("purple"), Verdict::Incorrect),
        ];
        let report = KgFusionEngine::new(&kg, FusionConfig::default())
            .apply(&verdicts)
            .unwrap();

        assert_eq!(dump(&kg), before);
        assert!(report.ledger.is_empty());
        assert_eq!(report.counters.mutations(), 0);
        assert_eq!(report.counters.skipped_undecided, 1);
        assert_eq!(report.counters.already_present, 1);
        assert_eq!(report.counters.no_correction, 1);
        assert_eq!(report.counters.not_in_graph, 1);
    }

    #[test]
    fn kappa_gate_skips_low_agreement() {
        let kg = KnowledgeGraph::new();
        let mut low = verdict("h1", t("red"), Verdict::Correct);
        low.fleiss_kappa = Some(0.1);
        let undefined = verdict("h2", t("blue"), Verdict::Correct);

        let config = FusionConfig {
            min_fleiss_kappa: Some(0.2),
        };
        let report = KgFusionEngine::new(&kg, config)
            .apply(&[low, undefined])
            .unwrap();
        assert_eq!(report.counters.skipped_low_agreement, 1);
        assert!(!kg.contains(&t("red")));
        assert!(kg.contains(&t("blue")));
    }
}
