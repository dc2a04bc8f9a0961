// Evaluation Module - asynchronous evaluation workflow
//
// Runs are launched against an injected Evaluator and report through an
// injected Notifier once nobody is observing them, so the whole lifecycle can
// be driven deterministically from tests.

pub mod evaluator;
pub mod notifier;
pub mod state_machine;
pub mod traits;
pub mod types;
pub mod workflow;

#[cfg(test)]
pub mod mocks;


pub use evaluator::DelayedEvaluator;
pub use notifier::{ChannelNotifier, CompositeNotifier, Notification, TracingNotifier};
pub use state_machine::RunEvent;
pub use traits::{Evaluator, Notifier};
pub use types::{
    BackgroundResult, EvaluationOutcome, EvaluationRun, EvaluatorError, EvaluatorReport,
    Observation, ResultDisposition, RunId, RunStatus, WorkflowError, WorkflowState,
};
pub use workflow::{ControlOutcome, EvaluationWorkflow, RunHandle, WorkflowOptions};
