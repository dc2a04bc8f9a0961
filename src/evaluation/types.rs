// Core types for the evaluation workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::requirements::Record;

/// Identifier of one evaluation run, unique within its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub(crate) u64);

impl RunId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Evaluation in progress with an observer attached
    Running,
    /// Observer detached; the evaluation keeps going
    ObservationDetached,
    /// A newer submission took over the observer before this run finished
    Superseded,
    /// Evaluation finished (successfully or not)
    Completed,
    /// Underlying work was aborted
    Cancelled,
}

impl RunStatus {
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            RunStatus::Running | RunStatus::ObservationDetached | RunStatus::Superseded
        )
    }
}

/// Workflow-level state as seen by an observing view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    Idle,
    Running { run_id: RunId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum WorkflowError {
    #[error("Evaluation failed: {reason}")]
    EvaluatorFailure { reason: String },
    #[error("Result for superseded {run_id} discarded")]
    StaleRunDiscarded { run_id: RunId },
    #[error("{run_id} was never issued by this workflow")]
    InvalidHandle { run_id: RunId },
    #[error("Evaluator does not support aborting {run_id}")]
    AbortUnsupported { run_id: RunId },
    #[error("Evaluation {run_id} was cancelled")]
    Cancelled { run_id: RunId },
}

/// What the evaluator reports when it finishes successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorReport {
    /// Supplied when the evaluator computes the count itself; otherwise the
    /// workflow derives it from the run's record.
    pub missing_count: Option<usize>,
}

impl EvaluatorReport {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn with_count(missing_count: usize) -> Self {
        Self {
            missing_count: Some(missing_count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluatorError {
    #[error("Evaluation backend error: {reason}")]
    Backend { reason: String },
    #[error("Evaluation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl EvaluatorError {
    /// Failure text without the error-kind prefix, as carried by
    /// [`WorkflowError::EvaluatorFailure`].
    pub fn reason(&self) -> String {
        match self {
            Self::Backend { reason } => reason.clone(),
            Self::Timeout { timeout_ms } => format!("timed out after {timeout_ms}ms"),
        }
    }
}

/// Terminal outcome of a run, as delivered to an observer or the notifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Completed { missing_count: usize },
    Failed { error: WorkflowError },
}

impl EvaluationOutcome {
    pub fn missing_count(&self) -> Option<usize> {
        match self {
            EvaluationOutcome::Completed { missing_count } => Some(*missing_count),
            EvaluationOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, EvaluationOutcome::Failed { .. })
    }
}

/// Payload for a detached run that has finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundResult {
    pub run_id: RunId,
    pub outcome: EvaluationOutcome,
    pub completed_at: DateTime<Utc>,
}

/// What an attached observer ends up seeing for its run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Pending,
    Delivered(EvaluationOutcome),
    Detached,
    Superseded,
    Cancelled,
}

impl Observation {
    pub fn is_pending(&self) -> bool {
        matches!(self, Observation::Pending)
    }
}

/// How the workflow disposed of an evaluator result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultDisposition {
    /// Committed to the current count and delivered to the attached observer
    Applied,
    /// Delivered through the background notifier only
    DeliveredInBackground,
    /// Run had been superseded; result dropped
    Discarded,
    /// Unknown run or a result that already arrived
    Ignored,
}

/// One evaluation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: RunId,
    pub correlation_id: String,
    pub record: Record,
    pub status: RunStatus,
    pub result: Option<usize>,
    pub outcome: Option<EvaluationOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl EvaluationRun {
    pub(crate) fn start(id: RunId, correlation_id: String, record: Record) -> Self {
        Self {
            id,
            correlation_id,
            record,
            status: RunStatus::Running,
            result: None,
            outcome: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }
}
