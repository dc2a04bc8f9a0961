// Test doubles for the evaluation workflow - no timers, no side effects

use async_trait::async_trait;
use std::sync::Mutex;

use super::traits::{Evaluator, Notifier};
use super::types::{BackgroundResult, EvaluatorError, EvaluatorReport, RunId};
use crate::requirements::Record;

/// Evaluator whose work never finishes on its own. Tests deliver results
/// through `EvaluationWorkflow::on_evaluator_result`.
#[derive(Debug, Default)]
pub struct PendingEvaluator {
    pub abortable: bool,
    pub seen: Mutex<Vec<(RunId, Record)>>,
}

impl PendingEvaluator {
    pub fn abortable() -> Self {
        Self {
            abortable: true,
            ..Default::default()
        }
    }

    pub fn seen_records(&self) -> Vec<(RunId, Record)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Evaluator for PendingEvaluator {
    async fn evaluate(
        &self,
        run_id: RunId,
        record: Record,
    ) -> Result<EvaluatorReport, EvaluatorError> {
        self.seen.lock().unwrap().push((run_id, record));
        std::future::pending::<Result<EvaluatorReport, EvaluatorError>>().await
    }

    fn supports_abort(&self) -> bool {
        self.abortable
    }
}

/// Evaluator that finishes as soon as it is polled.
#[derive(Debug, Default)]
pub struct ImmediateEvaluator;

#[async_trait]
impl Evaluator for ImmediateEvaluator {
    async fn evaluate(
        &self,
        _run_id: RunId,
        _record: Record,
    ) -> Result<EvaluatorReport, EvaluatorError> {
        Ok(EvaluatorReport::done())
    }
}

/// Evaluator that panics mid-evaluation.
#[derive(Debug, Default)]
pub struct PanickingEvaluator;

#[async_trait]
impl Evaluator for PanickingEvaluator {
    async fn evaluate(
        &self,
        _run_id: RunId,
        _record: Record,
    ) -> Result<EvaluatorReport, EvaluatorError> {
        panic!("evaluator crashed")
    }
}

/// Every notification the workflow emitted, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedNotification {
    Continuation(RunId),
    Result(BackgroundResult),
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<RecordedNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedNotification> {
        self.events.lock().unwrap().clone()
    }

    pub fn continuations(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, RecordedNotification::Continuation(_)))
            .count()
    }

    pub fn results(&self) -> Vec<BackgroundResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedNotification::Result(result) => Some(result),
                RecordedNotification::Continuation(_) => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_background_continuation(&self, run_id: RunId) {
        self.events
            .lock()
            .unwrap()
            .push(RecordedNotification::Continuation(run_id));
    }

    fn notify_background_result(&self, result: BackgroundResult) {
        self.events
            .lock()
            .unwrap()
            .push(RecordedNotification::Result(result));
    }
}
