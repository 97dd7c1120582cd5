//! Worker reliability filtering.
//!
//! A worker is dropped entirely, every row they submitted, if any of their
//! rows was finished suspiciously fast or carries an approval-rate bucket
//! outside the trusted whitelist.

use std::collections::BTreeSet;

use super::CrowdTask;

/// Default approval-rate buckets considered trustworthy.
pub const DEFAULT_APPROVAL_WHITELIST: [&str; 5] = ["70%", "80%", "85%", "98%", "99%"];

/// Default minimum work time: rows at or below this are "fast deceivers".
pub const DEFAULT_MAX_FAST_SECS: f64 = 10.0;

/// Result of filtering: surviving rows plus the excluded workers.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub kept: Vec<CrowdTask>,
    pub excluded_workers: BTreeSet<String>,
}

/// Removes fast and untrusted workers from the crowd data.
#[derive(Debug, Clone)]
pub struct ReliabilityFilter {
    fast_threshold_secs: f64,
    approval_whitelist: BTreeSet<String>,
}

impl Default for ReliabilityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAST_SECS, DEFAULT_APPROVAL_WHITELIST)
    }
}

impl ReliabilityFilter {
    pub fn new<I, S>(fast_threshold_secs: f64, approval_whitelist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fast_threshold_secs,
            approval_whitelist: approval_whitelist.into_iter().map(Into::into).collect(),
        }
    }

    /// Workers with at least one row at or below the time threshold.
    pub fn fast_workers<'a>(&self, tasks: &'a [CrowdTask]) -> BTreeSet<&'a str> {
        tasks
            .iter()
            .filter(|t| t.work_time_secs <= self.fast_threshold_secs)
            .map(|t| t.worker_id.as_str())
            .collect()
    }

    /// Workers with at least one row whose approval bucket is not whitelisted.
    pub fn untrusted_workers<'a>(&self, tasks: &'a [CrowdTask]) -> BTreeSet<&'a str> {
        tasks
            .iter()
            .filter(|t| !self.approval_whitelist.contains(t.approval_rate.trim()))
            .map(|t| t.worker_id.as_str())
            .collect()
    }

    /// Drop every row of every fast or untrusted worker.
    ///
    /// Applying the filter to its own output changes nothing.
    pub fn filter(&self, tasks: &[CrowdTask]) -> FilterOutcome {
        let fast = self.fast_workers(tasks);
        let untrusted = self.untrusted_workers(tasks);
        let excluded: BTreeSet<&str> = fast.union(&untrusted).copied().collect();

        let kept: Vec<CrowdTask> = tasks
            .iter()
            .filter(|t| !excluded.contains(t.worker_id.as_str()))
            .cloned()
            .collect();

        tracing::info!(
            rows = tasks.len(),
            kept = kept.len(),
            fast_workers = fast.len(),
            untrusted_workers = untrusted.len(),
            "filtered crowd workers"
        );
        for worker in &excluded {
            tracing::debug!(worker, "excluded crowd worker");
        }

        FilterOutcome {
            kept,
            excluded_workers: excluded.into_iter().map(str::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crowd::fixtures::task;

    #[test]
    fn drops_all_rows_of_fast_workers() {
        let mut fast = task("h1", "w1", 1);
        fast.work_time_secs = 10.0;
        let tasks = vec![fast, task("h2", "w1", 1), task("h1", "w2", 1)];

        let out = ReliabilityFilter::default().filter(&tasks);
        assert_eq!(out.kept.len(), 1);
        assert_eq!(out.kept[0].worker_id, "w2");
        assert_eq!(out.excluded_workers, BTreeSet::from(["w1".to_string()]));
    }

    #[test]
    fn drops_untrusted_approval_buckets() {
        let mut shady = task("h1", "w3", 2);
        shady.approval_rate = "50%".into();
        let tasks = vec![shady, task("h1", "w4", 1)];

        let out = ReliabilityFilter::default().filter(&tasks);
        assert_eq!(out.kept.len(), 1);
        assert!(out.excluded_workers.contains("w3"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut edge = task("h1", "w1", 1);
        edge.work_time_secs = 10.5;
        assert!(ReliabilityFilter::default().filter(&[edge]).excluded_workers.is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let mut fast = task("h1", "w1", 1);
        fast.work_time_secs = 3.0;
        let mut shady = task("h2", "w2", 1);
        shady.approval_rate = "0%".into();
        let tasks = vec![fast, shady, task("h1", "w3", 1), task("h2", "w4", 2)];

        let filter = ReliabilityFilter::default();
        let once = filter.filter(&tasks);
        let twice = filter.filter(&once.kept);
        assert_eq!(once.kept, twice.kept);
        assert!(twice.excluded_workers.is_empty());
    }
}
