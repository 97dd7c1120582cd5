//! Crowd annotations: raw task rows, worker filtering and vote aggregation.
//!
//! Each row is one worker's judgement of a `(subject, predicate, object)`
//! statement given in compact `prefix:local` form. Rows are read once from a
//! tab-separated export and never mutated; [`reliability`] drops untrusted
//! workers and [`aggregate`] turns the remaining votes into one verdict per
//! task.

pub mod aggregate;
pub mod reliability;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CrowdError;

/// Which component of a statement a worker proposed to replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FixPosition {
    Subject,
    Predicate,
    Object,
}

/// `AnswerID` value for "the statement is correct".
pub const ANSWER_CORRECT: i64 = 1;
/// `AnswerID` value for "the statement is incorrect".
pub const ANSWER_INCORRECT: i64 = 2;

/// One raw crowd row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrowdTask {
    #[serde(rename = "HITId")]
    pub hit_id: String,
    #[serde(rename = "HITTypeId")]
    pub hit_type_id: String,
    #[serde(rename = "WorkerId")]
    pub worker_id: String,
    #[serde(rename = "WorkTimeInSeconds")]
    pub work_time_secs: f64,
    /// Approval-rate bucket as exported, e.g. `"99%"`.
    #[serde(rename = "LifetimeApprovalRate")]
    pub approval_rate: String,
    #[serde(rename = "Input1ID")]
    pub subject: String,
    #[serde(rename = "Input2ID")]
    pub predicate: String,
    #[serde(rename = "Input3ID")]
    pub object: String,
    #[serde(rename = "AnswerID")]
    pub answer_id: i64,
    #[serde(rename = "FixPosition", default)]
    pub fix_position: Option<FixPosition>,
    #[serde(rename = "FixValue", default)]
    pub fix_value: Option<String>,
}

impl CrowdTask {
    /// The judged statement in compact form.
    pub fn statement(&self) -> [&str; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// The proposed fix, when the worker supplied both position and value.
    pub fn fix(&self) -> Option<(FixPosition, &str)> {
        let value = self.fix_value.as_deref().filter(|v| !v.is_empty())?;
        Some((self.fix_position?, value))
    }
}

/// Read crowd rows from a tab-separated file with a header line.
///
/// Columns beyond those of [`CrowdTask`] are ignored.
pub fn load_tasks(path: &Path) -> Result<Vec<CrowdTask>, CrowdError> {
    let display = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|source| CrowdError::Io {
        path: display.clone(),
        source,
    })?;
    let tasks = read_tasks(file).map_err(|message| CrowdError::Record {
        path: display.clone(),
        message,
    })?;
    tracing::info!(path = %display, rows = tasks.len(), "loaded crowd data");
    Ok(tasks)
}

/// Parse crowd rows from any reader. Errors carry the offending line.
pub fn read_tasks<R: std::io::Read>(reader: R) -> Result<Vec<CrowdTask>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_reader(reader);
    reader
        .deserialize::<CrowdTask>()
        .map(|row| row.map_err(|e| e.to_string()))
        .collect()
}
