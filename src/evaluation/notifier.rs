// Notifier implementations for detached runs

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::traits::Notifier;
use super::types::{BackgroundResult, EvaluationOutcome, RunId};

/// Logs background notifications using the operator-facing wording.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_background_continuation(&self, run_id: RunId) {
        info!(
            run_id = %run_id,
            title = "Evaluation Window Closed",
            "Processing continues in background - refresh page to see results."
        );
    }

    fn notify_background_result(&self, result: BackgroundResult) {
        match &result.outcome {
            EvaluationOutcome::Completed { missing_count } => info!(
                run_id = %result.run_id,
                missing_count = *missing_count,
                "Background evaluation finished - refresh to see updated requirements"
            ),
            EvaluationOutcome::Failed { error } => warn!(
                run_id = %result.run_id,
                error = %error,
                "Background evaluation failed"
            ),
        }
    }
}

/// Messages a UI layer receives from a [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    BackgroundContinuation { run_id: RunId },
    BackgroundResult(BackgroundResult),
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, notification: Notification) {
        // Delivery is best effort once the UI has gone away
        if self.sender.send(notification).is_err() {
            warn!("Notification receiver dropped; background notification lost");
        }
    }
}

impl Notifier for ChannelNotifier {
    fn notify_background_continuation(&self, run_id: RunId) {
        self.forward(Notification::BackgroundContinuation { run_id });
    }

    fn notify_background_result(&self, result: BackgroundResult) {
        self.forward(Notification::BackgroundResult(result));
    }
}

/// Fans notifications out to several notifiers in order.
#[derive(Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifiers.push(Box::new(notifier));
        self
    }
}

impl Notifier for CompositeNotifier {
    fn notify_background_continuation(&self, run_id: RunId) {
        for notifier in &self.notifiers {
            notifier.notify_background_continuation(run_id);
        }
    }

    fn notify_background_result(&self, result: BackgroundResult) {
        for notifier in &self.notifiers {
            notifier.notify_background_result(result.clone());
        }
    }
}
