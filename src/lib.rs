// Merchant Eval Library - asynchronous merchant profile evaluation
// This exposes the core components for testing and integration

pub mod config;
pub mod evaluation;
pub mod observability;
pub mod requirements;
pub mod shutdown;
pub mod telemetry;

// Re-export key types for easy access
pub use config::{config, init_config, EvaluationConfig, MerchantEvalConfig, ObservabilityConfig};
pub use evaluation::{
    BackgroundResult, ChannelNotifier, CompositeNotifier, ControlOutcome, DelayedEvaluator,
    EvaluationOutcome, EvaluationRun, EvaluationWorkflow, Evaluator, EvaluatorError,
    EvaluatorReport, Notification, Notifier, Observation, ResultDisposition, RunHandle, RunId,
    RunStatus, TracingNotifier, WorkflowError, WorkflowOptions, WorkflowState,
};
pub use observability::{EvaluationMetrics, EvaluationStats};
pub use requirements::{
    count_missing, MerchantProfile, Record, RequiredFieldSet, RequirementChecker,
};
pub use shutdown::ShutdownCoordinator;
pub use telemetry::{
    create_evaluation_span, generate_correlation_id, init_telemetry, shutdown_telemetry,
};
