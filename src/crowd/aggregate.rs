//! Majority-vote aggregation and inter-annotator agreement.
//!
//! Filtered rows are grouped by `HITId` (sorted) into one
//! [`AggregatedVerdict`] each. Agreement is measured per `HITTypeId` batch
//! with Fleiss' kappa over a task × {correct, incorrect} count table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::Triple;
use crate::graph::namespace::Namespaces;

use super::{ANSWER_CORRECT, ANSWER_INCORRECT, CrowdTask, FixPosition};

/// Majority outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Undecided,
}

/// How a tied vote is decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// Ties produce [`Verdict::Undecided`] and are never applied to the graph.
    #[default]
    Undecided,
    Correct,
    Incorrect,
}

impl TiePolicy {
    fn verdict(self) -> Verdict {
        match self {
            TiePolicy::Undecided => Verdict::Undecided,
            TiePolicy::Correct => Verdict::Correct,
            TiePolicy::Incorrect => Verdict::Incorrect,
        }
    }
}

/// Vote counts of one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDistribution {
    pub correct: usize,
    pub incorrect: usize,
}

impl VoteDistribution {
    /// Strict majority, or the tie policy's verdict on equal counts.
    pub fn verdict(self, ties: TiePolicy) -> Verdict {
        match self.correct.cmp(&self.incorrect) {
            std::cmp::Ordering::Greater => Verdict::Correct,
            std::cmp::Ordering::Less => Verdict::Incorrect,
            std::cmp::Ordering::Equal => ties.verdict(),
        }
    }

    pub fn total(self) -> usize {
        self.correct + self.incorrect
    }
}

/// Aggregated outcome of one crowd task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedVerdict {
    pub hit_id: String,
    pub hit_type_id: String,
    /// The statement as the crowd saw it, compact form.
    pub statement: [String; 3],
    /// The statement resolved to graph terms.
    pub triple: Triple,
    pub verdict: Verdict,
    pub distribution: VoteDistribution,
    /// Replacement statement proposed by a worker, resolved to graph terms.
    pub correction: Option<Triple>,
    pub fix_position: Option<FixPosition>,
    /// Agreement of the task's batch; absent when undefined.
    pub fleiss_kappa: Option<f64>,
}

/// Groups crowd rows per task and decides each by majority vote.
#[derive(Debug, Clone)]
pub struct Aggregator {
    namespaces: Namespaces,
    ties: TiePolicy,
}

impl Aggregator {
    pub fn new(namespaces: Namespaces, ties: TiePolicy) -> Self {
        Self { namespaces, ties }
    }

    /// Aggregate filtered rows into verdicts, sorted by `HITId`.
    pub fn aggregate(&self, tasks: &[CrowdTask]) -> Vec<AggregatedVerdict> {
        let groups = group_by(tasks, |t| t.hit_id.as_str());
        let kappas = batch_kappas(tasks);

        let verdicts: Vec<AggregatedVerdict> = groups
            .into_iter()
            .map(|(hit_id, rows)| self.aggregate_task(hit_id, &rows, &kappas))
            .collect();

        let undecided = verdicts
            .iter()
            .filter(|v| v.verdict == Verdict::Undecided)
            .count();
        tracing::info!(
            tasks = verdicts.len(),
            batches = kappas.len(),
            undecided,
            "aggregated crowd votes"
        );
        verdicts
    }

    fn aggregate_task(
        &self,
        hit_id: &str,
        rows: &[&CrowdTask],
        kappas: &BTreeMap<&str, Option<f64>>,
    ) -> AggregatedVerdict {
        // Grouping guarantees at least one row.
        let first = rows[0];
        if rows.iter().any(|r| r.statement() != first.statement()) {
            tracing::warn!(hit_id, "workers saw different statements, using the first row");
        }

        let distribution = VoteDistribution {
            correct: rows.iter().filter(|r| r.answer_id == ANSWER_CORRECT).count(),
            incorrect: rows.iter().filter(|r| r.answer_id == ANSWER_INCORRECT).count(),
        };

        let statement = first.statement().map(str::to_string);

        // Smallest WorkerId wins; `min_by` keeps the earliest row on ties.
        let fix = rows
            .iter()
            .filter_map(|r| r.fix().map(|fix| (r.worker_id.as_str(), fix)))
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(_, fix)| fix);

        let correction = fix.map(|(position, value)| {
            let mut fixed = statement.clone();
            let slot = match position {
                FixPosition::Subject => 0,
                FixPosition::Predicate => 1,
                FixPosition::Object => 2,
            };
            fixed[slot] = value.to_string();
            self.resolve(&fixed)
        });

        AggregatedVerdict {
            hit_id: hit_id.to_string(),
            hit_type_id: first.hit_type_id.clone(),
            triple: self.resolve(&statement),
            statement,
            verdict: distribution.verdict(self.ties),
            distribution,
            correction,
            fix_position: fix.map(|(position, _)| position),
            fleiss_kappa: kappas.get(first.hit_type_id.as_str()).copied().flatten(),
        }
    }

    /// Resolve a compact statement to graph terms.
    pub fn resolve(&self, [s, p, o]: &[String; 3]) -> Triple {
        Triple::new(
            self.namespaces.resolve_value(s),
            self.namespaces.resolve_value(p),
            self.namespaces.resolve_value(o),
        )
    }
}

fn group_by<'a, K: Ord + 'a>(
    tasks: &'a [CrowdTask],
    key: impl Fn(&'a CrowdTask) -> K,
) -> BTreeMap<K, Vec<&'a CrowdTask>> {
    let mut groups: BTreeMap<K, Vec<&CrowdTask>> = BTreeMap::new();
    for task in tasks {
        groups.entry(key(task)).or_default().push(task);
    }
    groups
}

/// Fleiss' kappa per `HITTypeId` batch.
fn batch_kappas(tasks: &[CrowdTask]) -> BTreeMap<&str, Option<f64>> {
    group_by(tasks, |t| t.hit_type_id.as_str())
        .into_iter()
        .map(|(batch, rows)| {
            let table: Vec<[usize; 2]> = group_by_refs(&rows)
                .into_values()
                .map(|votes| {
                    [
                        votes.iter().filter(|r| r.answer_id == ANSWER_CORRECT).count(),
                        votes.iter().filter(|r| r.answer_id == ANSWER_INCORRECT).count(),
                    ]
                })
                .collect();
            let kappa = fleiss_kappa(&table);
            tracing::debug!(batch, tasks = table.len(), ?kappa, "batch agreement");
            (batch, kappa)
        })
        .collect()
}

fn group_by_refs<'a>(rows: &[&'a CrowdTask]) -> BTreeMap<&'a str, Vec<&'a CrowdTask>> {
    let mut groups: BTreeMap<&str, Vec<&CrowdTask>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.hit_id.as_str()).or_default().push(row);
    }
    groups
}

/// Fleiss' kappa of an item × category count table.
///
/// Items may have different numbers of raters; items rated fewer than twice
/// do not contribute to observed agreement. Returns `None` when kappa is
/// undefined (no ratings, no item with two raters, or chance agreement of 1).
pub fn fleiss_kappa<const C: usize>(table: &[[usize; C]]) -> Option<f64> {
    let total: usize = table.iter().flatten().sum();
    if total == 0 {
        return None;
    }

    let mut observed = Vec::new();
    for row in table {
        let n: usize = row.iter().sum();
        if n < 2 {
            continue;
        }
        let agreeing: usize = row.iter().map(|&c| c * c).sum::<usize>() - n;
        observed.push(agreeing as f64 / (n * (n - 1)) as f64);
    }
    if observed.is_empty() {
        return None;
    }
    let p_bar = observed.iter().sum::<f64>() / observed.len() as f64;

    let p_e: f64 = (0..C)
        .map(|j| {
            let share = table.iter().map(|row| row[j]).sum::<usize>() as f64 / total as f64;
            share * share
        })
        .sum();
    if (1.0 - p_e).abs() < f64::EPSILON {
        return None;
    }
    Some((p_bar - p_e) / (1.0 - p_e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crowd::fixtures::task;
    use crate::graph::Term;

    fn aggregator() -> Aggregator {
        Aggregator::new(Namespaces::default(), TiePolicy::default())
    }

    #[test]
    fn strict_majority() {
        let d = VoteDistribution {
            correct: 5,
            incorrect: 2,
        };
        assert_eq!(d.verdict(TiePolicy::Undecided), Verdict::Correct);
        let d = VoteDistribution {
            correct: 1,
            incorrect: 3,
        };
        assert_eq!(d.verdict(TiePolicy::Undecided), Verdict::Incorrect);
    }

    #[test]
    fn ties_follow_policy() {
        let d = VoteDistribution {
            correct: 2,
            incorrect: 2,
        };
        assert_eq!(d.verdict(TiePolicy::Undecided), Verdict::Undecided);
        assert_eq!(d.verdict(TiePolicy::Correct), Verdict::Correct);
        assert_eq!(d.verdict(TiePolicy::Incorrect), Verdict::Incorrect);
    }

    #[test]
    fn groups_by_hit_and_counts_votes() {
        let mut rows = Vec::new();
        for (i, answer) in [1, 1, 1, 1, 1, 2, 2].into_iter().enumerate() {
            rows.push(task("h2", &format!("w{i}"), answer));
        }
        rows.push(task("h1", "w0", 2));
        // Unknown answer ids are ignored.
        rows.push(task("h1", "w1", 3));

        let verdicts = aggregator().aggregate(&rows);
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].hit_id, "h1");
        assert_eq!(verdicts[0].verdict, Verdict::Incorrect);
        assert_eq!(
            verdicts[1].distribution,
            VoteDistribution {
                correct: 5,
                incorrect: 2
            }
        );
        assert_eq!(verdicts[1].verdict, Verdict::Correct);
        assert_eq!(
            verdicts[1].triple,
            Triple::new(
                Term::iri("http://www.wikidata.org/entity/Q1"),
                Term::iri("http://www.wikidata.org/prop/direct/P57"),
                Term::iri("http://www.wikidata.org/entity/Q2"),
            )
        );
    }

    #[test]
    fn correction_prefers_smallest_worker_id() {
        let mut a = task("h1", "w9", 2);
        a.fix_position = Some(FixPosition::Object);
        a.fix_value = Some("wd:Q9".into());
        let mut b = task("h1", "w3", 2);
        b.fix_position = Some(FixPosition::Object);
        b.fix_value = Some("1999".into());
        let mut c = task("h1", "w1", 2);
        // Position without value does not count.
        c.fix_position = Some(FixPosition::Subject);

        let v = &aggregator().aggregate(&[a, b, c])[0];
        assert_eq!(v.fix_position, Some(FixPosition::Object));
        let correction = v.correction.as_ref().unwrap();
        assert_eq!(correction.object, Term::literal("1999"));
        assert_eq!(correction.subject, v.triple.subject);
    }

    #[test]
    fn no_fix_means_no_correction() {
        let v = &aggregator().aggregate(&[task("h1", "w1", 2)])[0];
        assert!(v.correction.is_none());
        assert!(v.fix_position.is_none());
    }

    #[test]
    fn fleiss_kappa_known_tables() {
        let k = fleiss_kappa(&[[2, 0], [0, 2], [1, 1]]).unwrap();
        assert!((k - 1.0 / 3.0).abs() < 1e-12);

        let k = fleiss_kappa(&[[2, 0], [0, 2]]).unwrap();
        assert!((k - 1.0).abs() < 1e-12);

        // Classic Fleiss (1971)-style table with constant raters.
        let k = fleiss_kappa(&[[3, 0], [0, 3], [2, 1], [1, 2]]).unwrap();
        // P_bar = (1 + 1 + 1/3 + 1/3) / 4 = 2/3, P_e = 0.5
        assert!((k - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn fleiss_kappa_undefined_cases() {
        assert_eq!(fleiss_kappa::<2>(&[]), None);
        // Everyone picks the same category: chance agreement is 1.
        assert_eq!(fleiss_kappa(&[[3, 0], [2, 0]]), None);
        // No item has two raters.
        assert_eq!(fleiss_kappa(&[[1, 0], [0, 1]]), None);
    }

    #[test]
    fn verdicts_carry_batch_kappa() {
        let rows = vec![
            task("h1", "w1", 1),
            task("h1", "w2", 1),
            task("h2", "w1", 2),
            task("h2", "w2", 2),
        ];
        let verdicts = aggregator().aggregate(&rows);
        assert!(verdicts.iter().all(|v| v.fleiss_kappa == Some(1.0)));

        let unanimous = vec![task("h1", "w1", 1), task("h1", "w2", 1)];
        assert_eq!(aggregator().aggregate(&unanimous)[0].fleiss_kappa, None);
    }
}
