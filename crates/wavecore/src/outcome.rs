use crate::{ExecutionPlan, RunId, UnitError, UnitId, UnitResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a unit within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl UnitStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitStatus::Completed | UnitStatus::Failed | UnitStatus::Skipped
        )
    }
}

/// Why a unit never ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A dependency failed or was itself skipped
    DependencyFailed { dependency: UnitId },
    /// The wave had more runnable units than `max_parallelism`
    ParallelismLimit,
    /// The run was cancelled before the unit's wave started
    Cancelled,
    /// An earlier failure aborted the run (`continue_on_error = false`)
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    PartialFailure,
    Cancelled,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Execution,
    Timeout,
    ContextIncompatible,
    MissingDependency,
    Configuration,
    Panic,
}

impl From<&UnitError> for ErrorKind {
    fn from(error: &UnitError) -> Self {
        match error {
            UnitError::ExecutionFailed(_) => ErrorKind::Execution,
            UnitError::Timeout { .. } => ErrorKind::Timeout,
            UnitError::ContextIncompatible(_) => ErrorKind::ContextIncompatible,
            UnitError::MissingDependency(_) => ErrorKind::MissingDependency,
            UnitError::Configuration(_) => ErrorKind::Configuration,
            UnitError::Panicked(_) => ErrorKind::Panic,
        }
    }
}

/// Structured record of a unit failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitErrorRecord {
    pub unit_id: UnitId,
    pub wave: usize,
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl UnitErrorRecord {
    pub fn new(unit_id: impl Into<UnitId>, wave: usize, error: &UnitError) -> Self {
        Self {
            unit_id: unit_id.into(),
            wave,
            kind: ErrorKind::from(error),
            message: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Execution info for one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitExecution {
    pub unit_id: UnitId,
    pub wave: usize,
    pub status: UnitStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub skip_reason: Option<SkipReason>,
}

impl UnitExecution {
    pub fn pending(unit_id: impl Into<UnitId>, wave: usize) -> Self {
        Self {
            unit_id: unit_id.into(),
            wave,
            status: UnitStatus::Pending,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            error: None,
            skip_reason: None,
        }
    }
}

/// Everything a caller learns about a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub run_id: RunId,
    pub status: RunStatus,
    pub success: bool,
    pub results: HashMap<UnitId, UnitResult>,
    pub executions: HashMap<UnitId, UnitExecution>,
    pub plan: ExecutionPlan,
    pub errors: Vec<UnitErrorRecord>,
    pub completed_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_duration_ms: u64,
}

impl OrchestrationResult {
    pub fn status_of(&self, unit_id: &str) -> Option<UnitStatus> {
        self.executions.get(unit_id).map(|e| e.status)
    }

    pub fn result(&self, unit_id: &str) -> Option<&UnitResult> {
        self.results.get(unit_id)
    }

    /// Ids with the given status, sorted
    pub fn units_with_status(&self, status: UnitStatus) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .executions
            .values()
            .filter(|e| e.status == status)
            .map(|e| e.unit_id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Mean confidence across completed units, `None` if nothing completed
    pub fn average_confidence(&self) -> Option<f64> {
        if self.results.is_empty() {
            return None;
        }
        let total: f64 = self.results.values().map(|r| r.confidence).sum();
        Some(total / self.results.len() as f64)
    }
}
