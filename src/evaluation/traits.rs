// Collaborator seams for the evaluation workflow

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::types::{BackgroundResult, EvaluatorError, EvaluatorReport, RunId};
use crate::requirements::Record;

/// Performs the (slow) evaluation of a submitted record.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate a record snapshot. Returning is the completion signal.
    async fn evaluate(&self, run_id: RunId, record: Record)
        -> Result<EvaluatorReport, EvaluatorError>;

    /// Whether dropping the evaluation future actually stops the work.
    fn supports_abort(&self) -> bool {
        false
    }
}

/// Side channel for runs nobody is observing any more.
#[cfg_attr(test, automock)]
pub trait Notifier: Send + Sync {
    /// Called once per successful detach.
    fn notify_background_continuation(&self, run_id: RunId);

    /// Called when a detached run finishes.
    fn notify_background_result(&self, result: BackgroundResult);
}
