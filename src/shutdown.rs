use anyhow::Result;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::evaluation::EvaluationWorkflow;

/// Lets detached evaluations deliver their background result before exit.
pub struct ShutdownCoordinator {
    workflow: EvaluationWorkflow,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(workflow: EvaluationWorkflow, drain_timeout: Duration) -> Self {
        Self {
            workflow,
            drain_timeout,
        }
    }

    /// Wait for every in-flight run to finish, up to the drain timeout.
    ///
    /// Returns the number of runs still in flight when the timeout hit.
    pub async fn drain(&self) -> usize {
        let pending = self.workflow.in_flight();
        if pending == 0 {
            return 0;
        }

        info!(in_flight = pending, "Waiting for in-flight evaluations to finish...");
        match timeout(self.drain_timeout, self.workflow.wait_until_quiescent()).await {
            Ok(()) => {
                info!("All evaluations finished");
                0
            }
            Err(_) => {
                let remaining = self.workflow.in_flight();
                warn!(
                    in_flight = remaining,
                    timeout_ms = self.drain_timeout.as_millis() as u64,
                    "Timeout waiting for evaluations; background results will be lost"
                );
                remaining
            }
        }
    }

    /// Drain runs, stopping early if Ctrl-C arrives.
    pub async fn drain_until_interrupted(&self) -> Result<usize> {
        tokio::select! {
            remaining = self.drain() => Ok(remaining),
            signal = tokio::signal::ctrl_c() => {
                signal?;
                let remaining = self.workflow.in_flight();
                warn!(in_flight = remaining, "Interrupted; abandoning in-flight evaluations");
                Ok(remaining)
            }
        }
    }

    /// Final drain plus metrics report.
    pub async fn shutdown(self, log_metrics: bool) -> Result<()> {
        info!("Initiating graceful shutdown...");
        let remaining = self.drain_until_interrupted().await?;

        if log_metrics {
            self.workflow.metrics().log_stats();
        }

        if remaining > 0 {
            warn!(in_flight = remaining, "Shutdown completed with evaluations still running");
        } else {
            info!("Graceful shutdown completed successfully");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{DelayedEvaluator, TracingNotifier};
    use crate::requirements::{Record, RequirementChecker};
    use std::sync::Arc;

    fn workflow(delay: Duration) -> EvaluationWorkflow {
        EvaluationWorkflow::new(
            RequirementChecker::default(),
            Arc::new(DelayedEvaluator::new(delay).with_heartbeat(None)),
            Arc::new(TracingNotifier),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_detached_run() {
        let workflow = workflow(Duration::from_secs(6));
        let handle = workflow.submit(&Record::new().with("merchantName", "Acme"));
        workflow.detach_observation(&handle).unwrap();

        let coordinator = ShutdownCoordinator::new(workflow.clone(), Duration::from_secs(30));
        assert_eq!(coordinator.drain().await, 0);
        assert_eq!(workflow.metrics().snapshot().background_delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_after_timeout() {
        let workflow = workflow(Duration::from_secs(60));
        let _handle = workflow.submit(&Record::new());

        let coordinator = ShutdownCoordinator::new(workflow.clone(), Duration::from_secs(5));
        assert_eq!(coordinator.drain().await, 1);
    }

    #[tokio::test]
    async fn test_drain_with_nothing_in_flight_returns_immediately() {
        let coordinator =
            ShutdownCoordinator::new(workflow(Duration::from_secs(6)), Duration::ZERO);
        assert_eq!(coordinator.drain().await, 0);
    }
}
