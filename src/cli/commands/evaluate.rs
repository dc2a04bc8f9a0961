use anyhow::{bail, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, warn};

use merchant_eval::{
    BackgroundResult, ChannelNotifier, CompositeNotifier, EvaluationOutcome, EvaluationWorkflow,
    MerchantEvalConfig, Notification, Observation, RunId, ShutdownCoordinator, TracingNotifier,
};

use super::build_record;

/// How long to wait for detached runs and their background result before exiting.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct EvaluateReport {
    run_id: RunId,
    initial_missing_count: usize,
    displayed_missing_count: usize,
    detached: bool,
    outcome: Option<EvaluationOutcome>,
    background_result: Option<BackgroundResult>,
}

pub struct EvaluateCommand {
    pub fields: Vec<(String, String)>,
    pub profile: Option<PathBuf>,
    pub detach_after: Option<Duration>,
    pub json: bool,
}

impl EvaluateCommand {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self {
            fields,
            profile: None,
            detach_after: None,
            json: false,
        }
    }

    pub fn with_profile(mut self, profile: Option<PathBuf>) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_detach_after_ms(mut self, detach_after_ms: Option<u64>) -> Self {
        self.detach_after = detach_after_ms.map(Duration::from_millis);
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn execute(&self, config: &MerchantEvalConfig) -> Result<()> {
        let record = build_record(self.profile.as_deref(), &self.fields)?;

        let (channel, mut notifications) = ChannelNotifier::channel();
        let notifier = CompositeNotifier::new().with(TracingNotifier).with(channel);
        let workflow = EvaluationWorkflow::from_config(&config.evaluation, Arc::new(notifier));

        let initial_missing_count = workflow.current_missing_count();
        if !self.json {
            println!("🔄 Evaluating merchant profile...");
            println!("📋 Missing required fields: {initial_missing_count}");
        }

        let mut handle = workflow.submit(&record);
        let run_id = handle.run_id();
        info!(run_id = %run_id, "Evaluation submitted");

        let observation = match self.detach_after {
            Some(window) => match timeout(window, handle.wait()).await {
                Ok(observation) => observation,
                Err(_) => {
                    workflow.detach_observation(&handle)?;
                    handle.observation()
                }
            },
            None => handle.wait().await,
        };

        let mut report = EvaluateReport {
            run_id,
            initial_missing_count,
            displayed_missing_count: workflow.current_missing_count(),
            detached: false,
            outcome: None,
            background_result: None,
        };

        match observation {
            Observation::Delivered(outcome) => {
                report.displayed_missing_count = workflow.current_missing_count();
                report.outcome = Some(outcome);
            }
            Observation::Detached => {
                report.detached = true;
                if !self.json {
                    println!("⏳ Evaluation Window Closed");
                    println!(
                        "   Processing continues in background - refresh page to see results."
                    );
                }
                report.background_result =
                    await_background_result(&mut notifications, run_id, DRAIN_TIMEOUT).await;
            }
            other => bail!("Evaluation {run_id} ended without a result: {other:?}"),
        }

        ShutdownCoordinator::new(workflow.clone(), DRAIN_TIMEOUT)
            .shutdown(config.observability.metrics_enabled)
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }

        let failure = report
            .outcome
            .as_ref()
            .or(report.background_result.as_ref().map(|r| &r.outcome))
            .filter(|outcome| outcome.is_failure());
        if let Some(EvaluationOutcome::Failed { error }) = failure {
            bail!("{error}");
        }
        Ok(())
    }
}

async fn await_background_result(
    notifications: &mut mpsc::UnboundedReceiver<Notification>,
    run_id: RunId,
    limit: Duration,
) -> Option<BackgroundResult> {
    let wait = async {
        while let Some(notification) = notifications.recv().await {
            match notification {
                Notification::BackgroundResult(result) if result.run_id == run_id => {
                    return Some(result);
                }
                _ => continue,
            }
        }
        None
    };

    match timeout(limit, wait).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                run_id = %run_id,
                timeout_ms = limit.as_millis() as u64,
                "Gave up waiting for background result"
            );
            None
        }
    }
}

fn print_report(report: &EvaluateReport) {
    if let Some(outcome) = &report.outcome {
        match outcome {
            EvaluationOutcome::Completed { missing_count } => {
                println!("✅ Evaluation {} complete", report.run_id);
                println!("📋 Missing required fields: {missing_count}");
            }
            EvaluationOutcome::Failed { error } => {
                println!("❌ Evaluation {} failed: {error}", report.run_id);
                println!("📋 Missing required fields: {}", report.displayed_missing_count);
            }
        }
    }

    if let Some(result) = &report.background_result {
        match &result.outcome {
            EvaluationOutcome::Completed { missing_count } => {
                println!("🔔 Background evaluation {} finished", result.run_id);
                println!("   Refresh to see updated requirements: {missing_count} missing");
            }
            EvaluationOutcome::Failed { error } => {
                println!("🔔 Background evaluation {} failed: {error}", result.run_id);
            }
        }
        println!(
            "📋 Missing required fields (current view): {}",
            report.displayed_missing_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merchant_eval::Notifier;

    fn run_id(value: u64) -> RunId {
        serde_json::from_value(serde_json::json!(value)).unwrap()
    }

    fn completed(run_id: RunId, missing_count: usize) -> BackgroundResult {
        BackgroundResult {
            run_id,
            outcome: EvaluationOutcome::Completed { missing_count },
            completed_at: chrono::Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_wait_gives_up_after_limit() {
        // Sender stays alive, so only the limit can end the wait
        let (_notifier, mut notifications) = ChannelNotifier::channel();

        let result =
            await_background_result(&mut notifications, run_id(1), Duration::from_secs(120)).await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_background_wait_skips_other_runs() {
        let (notifier, mut notifications) = ChannelNotifier::channel();
        notifier.notify_background_continuation(run_id(1));
        notifier.notify_background_result(completed(run_id(2), 0));
        notifier.notify_background_result(completed(run_id(1), 2));

        let result = await_background_result(&mut notifications, run_id(1), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(result.run_id, run_id(1));
        assert_eq!(result.outcome, EvaluationOutcome::Completed { missing_count: 2 });
    }
}
