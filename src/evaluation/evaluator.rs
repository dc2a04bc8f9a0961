//! Default evaluator
//!
//! Mirrors the behaviour of the merchant evaluation backend as it exists
//! today: every evaluation succeeds after a fixed delay, and the count is left
//! to the workflow. While waiting it emits a heartbeat tick so operators can
//! see the evaluation is still being polled.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::traits::Evaluator;
use super::types::{EvaluatorError, EvaluatorReport, RunId};
use crate::config::EvaluationConfig;
use crate::requirements::Record;

pub const DEFAULT_EVALUATION_DELAY: Duration = Duration::from_millis(6000);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(2000);

/// Completes every evaluation after a fixed delay.
#[derive(Debug, Clone)]
pub struct DelayedEvaluator {
    delay: Duration,
    heartbeat: Option<Duration>,
}

impl Default for DelayedEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_EVALUATION_DELAY)
    }
}

impl DelayedEvaluator {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            heartbeat: Some(DEFAULT_HEARTBEAT_INTERVAL),
        }
    }

    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.delay_ms),
            heartbeat: (config.heartbeat_interval_ms > 0)
                .then(|| Duration::from_millis(config.heartbeat_interval_ms)),
        }
    }

    /// Disable or change the polling heartbeat.
    pub fn with_heartbeat(mut self, heartbeat: Option<Duration>) -> Self {
        self.heartbeat = heartbeat.filter(|h| !h.is_zero());
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl Evaluator for DelayedEvaluator {
    async fn evaluate(
        &self,
        run_id: RunId,
        record: Record,
    ) -> Result<EvaluatorReport, EvaluatorError> {
        info!(
            run_id = %run_id,
            fields = record.len(),
            delay_ms = self.delay.as_millis() as u64,
            "Evaluating updated merchant data"
        );

        let done = sleep(self.delay);
        tokio::pin!(done);

        match self.heartbeat {
            Some(period) => {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut ticks: u64 = 0;
                loop {
                    tokio::select! {
                        biased;
                        _ = &mut done => break,
                        _ = ticker.tick() => {
                            ticks += 1;
                            debug!(run_id = %run_id, tick = ticks, "Polling backend...");
                        }
                    }
                }
            }
            None => done.await,
        }

        Ok(EvaluatorReport::done())
    }

    fn supports_abort(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_configured_delay() {
        let evaluator = DelayedEvaluator::new(Duration::from_millis(6000));
        let started = Instant::now();

        let report = evaluator
            .evaluate(RunId(1), Record::new().with("merchantName", "Acme"))
            .await
            .unwrap();

        assert_eq!(report, EvaluatorReport::done());
        assert_eq!(started.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_does_not_change_duration() {
        let evaluator = DelayedEvaluator::new(Duration::from_millis(5000))
            .with_heartbeat(Some(Duration::from_millis(2000)));
        let started = Instant::now();

        evaluator.evaluate(RunId(7), Record::new()).await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(5000));
    }

    #[test]
    fn test_zero_heartbeat_from_config_disables_ticks() {
        let config = EvaluationConfig {
            heartbeat_interval_ms: 0,
            ..EvaluationConfig::default()
        };
        let evaluator = DelayedEvaluator::from_config(&config);
        assert!(evaluator.heartbeat.is_none());
        assert_eq!(evaluator.delay(), Duration::from_millis(config.delay_ms));
    }
}
