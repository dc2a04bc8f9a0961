//! Evaluation workflow
//!
//! Owns every run submitted through it. A single mutex guards the active-run
//! slot and the live run table; submit, detach, cancel, reset and result
//! delivery all go through it, so no two submissions can both believe they
//! are current. Notifier callbacks run after the lock is released, but are
//! queued while it is held so they reach the notifier in commit order.
//!
//! A run's observer link is its [`RunHandle`]. Once a newer submission
//! supersedes the run, or the caller detaches, the run can no longer touch the
//! count the observer reads. Detached runs still finish and report through
//! the [`Notifier`]; superseded runs have their result discarded.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::evaluator::DelayedEvaluator;
use super::state_machine::{RunEvent, RunStateMachine};
use super::traits::{Evaluator, Notifier};
use super::types::{
    BackgroundResult, EvaluationOutcome, EvaluationRun, EvaluatorError, EvaluatorReport,
    Observation, ResultDisposition, RunId, RunStatus, WorkflowError, WorkflowState,
};
use crate::config::EvaluationConfig;
use crate::observability::EvaluationMetrics;
use crate::requirements::{Record, RequirementChecker};
use crate::telemetry::{create_evaluation_span, generate_correlation_id};

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Evaluations still running after this long finish as failures
    pub evaluation_timeout: Option<Duration>,
    /// Finished runs kept around for [`EvaluationWorkflow::run`]
    pub history_limit: usize,
    /// Record used to seed the initial missing count
    pub initial_record: Record,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            evaluation_timeout: None,
            history_limit: 32,
            initial_record: Record::new(),
        }
    }
}

impl WorkflowOptions {
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            evaluation_timeout: config.timeout(),
            history_limit: config.history_limit,
            initial_record: Record::new(),
        }
    }
}

/// Result of a detach or cancel request on a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The run moved to the given status
    Changed(RunStatus),
    /// Nothing to do: the run already left the state the request applies to
    Unchanged,
}

/// Caller's link to one submitted run.
#[derive(Debug)]
pub struct RunHandle {
    workflow_id: Uuid,
    run_id: RunId,
    observer: watch::Receiver<Observation>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Current observation without waiting.
    pub fn observation(&self) -> Observation {
        self.observer.borrow().clone()
    }

    /// Wait until the run stops being pending for this observer.
    pub async fn wait(&mut self) -> Observation {
        if let Ok(observation) = self.observer.wait_for(|o| !o.is_pending()).await {
            return (*observation).clone();
        }
        // Workflow dropped while the run was pending
        self.observer.borrow().clone()
    }
}

struct LiveRun {
    run: EvaluationRun,
    lifecycle: RunStateMachine,
    observer: watch::Sender<Observation>,
    abort: Option<AbortHandle>,
}

impl LiveRun {
    fn apply(&mut self, event: RunEvent) -> RunStatus {
        let status = self.lifecycle.handle(event);
        self.run.status = status;
        status
    }
}

#[derive(Default)]
struct RunSlot {
    last_issued: u64,
    active: Option<RunId>,
    live: HashMap<RunId, LiveRun>,
    history: VecDeque<EvaluationRun>,
}

impl RunSlot {
    fn was_issued(&self, run_id: RunId) -> bool {
        run_id.0 > 0 && run_id.0 <= self.last_issued
    }

    fn retire(&mut self, run: EvaluationRun, limit: usize) {
        self.history.push_back(run);
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }

    fn lookup(&self, run_id: RunId) -> Option<&EvaluationRun> {
        self.live
            .get(&run_id)
            .map(|live| &live.run)
            .or_else(|| self.history.iter().rev().find(|run| run.id == run_id))
    }
}

/// Notification committed under the run lock, delivered after it.
enum Dispatch {
    Continuation(RunId),
    Result(BackgroundResult),
}

#[derive(Default)]
struct Outbox {
    queue: VecDeque<Dispatch>,
    draining: bool,
}

/// Clears the draining flag if a notifier panics mid-delivery.
struct DrainGuard<'a> {
    outbox: &'a Mutex<Outbox>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.outbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .draining = false;
        }
    }
}

struct WorkflowInner {
    id: Uuid,
    checker: RequirementChecker,
    evaluator: Arc<dyn Evaluator>,
    notifier: Arc<dyn Notifier>,
    metrics: EvaluationMetrics,
    options: WorkflowOptions,
    slot: Mutex<RunSlot>,
    outbox: Mutex<Outbox>,
    missing_count: watch::Sender<usize>,
    in_flight: watch::Sender<usize>,
}

impl WorkflowInner {
    fn lock(&self) -> MutexGuard<'_, RunSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a notification. Callers hold the run lock, which fixes the
    /// delivery order.
    fn enqueue(&self, _slot: &RunSlot, dispatch: Dispatch) {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queue
            .push_back(dispatch);
    }

    /// Deliver queued notifications in order. Must be called without the run
    /// lock. If another caller is already draining, it delivers ours too.
    fn flush_notifications(&self) {
        {
            let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }

        let _guard = DrainGuard {
            outbox: &self.outbox,
        };
        loop {
            let next = {
                let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
                match outbox.queue.pop_front() {
                    Some(dispatch) => dispatch,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            match next {
                Dispatch::Continuation(run_id) => {
                    self.notifier.notify_background_continuation(run_id)
                }
                Dispatch::Result(result) => self.notifier.notify_background_result(result),
            }
        }
    }

    fn publish_in_flight(&self, slot: &RunSlot) {
        self.in_flight.send_replace(slot.live.len());
    }

    /// Cut the observer link of the active run, if any.
    fn supersede_active(&self, slot: &mut RunSlot) -> Option<RunId> {
        let previous = slot.active.take()?;
        if let Some(live) = slot.live.get_mut(&previous) {
            if live.apply(RunEvent::Supersede) == RunStatus::Superseded {
                live.observer.send_replace(Observation::Superseded);
                info!(run_id = %previous, "Superseded run will no longer update the observer");
            }
        }
        Some(previous)
    }

    fn check_handle(&self, slot: &RunSlot, handle: &RunHandle) -> Result<(), WorkflowError> {
        if handle.workflow_id != self.id || !slot.was_issued(handle.run_id) {
            warn!(run_id = %handle.run_id, "Rejected handle not issued by this workflow");
            return Err(WorkflowError::InvalidHandle {
                run_id: handle.run_id,
            });
        }
        Ok(())
    }

    fn resolve_outcome(
        &self,
        record: &Record,
        result: Result<EvaluatorReport, EvaluatorError>,
    ) -> EvaluationOutcome {
        match result {
            Ok(report) => EvaluationOutcome::Completed {
                missing_count: report
                    .missing_count
                    .unwrap_or_else(|| self.checker.count_missing(record)),
            },
            Err(error) => EvaluationOutcome::Failed {
                error: WorkflowError::EvaluatorFailure {
                    reason: error.reason(),
                },
            },
        }
    }

    fn on_evaluator_result(
        &self,
        run_id: RunId,
        result: Result<EvaluatorReport, EvaluatorError>,
    ) -> ResultDisposition {
        let mut slot = self.lock();

        let Some(mut live) = slot.live.remove(&run_id) else {
            debug!(run_id = %run_id, "Ignoring result for a run that is no longer live");
            return ResultDisposition::Ignored;
        };

        let was_detached = match live.run.status {
            RunStatus::Running => false,
            RunStatus::ObservationDetached => true,
            RunStatus::Superseded => {
                live.run.completed_at = Some(Utc::now());
                let stale = WorkflowError::StaleRunDiscarded { run_id };
                slot.retire(live.run, self.options.history_limit);
                self.publish_in_flight(&slot);
                drop(slot);

                self.metrics.record_stale_discarded();
                debug!(run_id = %run_id, reason = %stale, "Discarded result of superseded run");
                return ResultDisposition::Discarded;
            }
            RunStatus::Completed | RunStatus::Cancelled => {
                slot.live.insert(run_id, live);
                return ResultDisposition::Ignored;
            }
        };

        let outcome = self.resolve_outcome(&live.run.record, result);
        let completed_at = Utc::now();
        live.apply(RunEvent::Finish);
        live.run.result = outcome.missing_count();
        live.run.outcome = Some(outcome.clone());
        live.run.completed_at = Some(completed_at);

        if outcome.is_failure() {
            self.metrics.record_failed();
        } else {
            self.metrics.record_completed();
        }

        if was_detached {
            info!(
                run_id = %run_id,
                failed = outcome.is_failure(),
                "Delivering detached run result in background"
            );
            self.enqueue(
                &slot,
                Dispatch::Result(BackgroundResult {
                    run_id,
                    outcome,
                    completed_at,
                }),
            );
            slot.retire(live.run, self.options.history_limit);
            self.publish_in_flight(&slot);
            drop(slot);

            self.metrics.record_background_delivered();
            self.flush_notifications();
            return ResultDisposition::DeliveredInBackground;
        }

        match &outcome {
            EvaluationOutcome::Completed { missing_count } => {
                self.missing_count.send_replace(*missing_count);
                info!(run_id = %run_id, missing_count = *missing_count, "Evaluation completed");
            }
            EvaluationOutcome::Failed { error } => {
                warn!(
                    run_id = %run_id,
                    error = %error,
                    "Evaluation failed; missing count unchanged"
                );
            }
        }
        live.observer.send_replace(Observation::Delivered(outcome));
        if slot.active == Some(run_id) {
            slot.active = None;
        }
        slot.retire(live.run, self.options.history_limit);
        self.publish_in_flight(&slot);

        ResultDisposition::Applied
    }
}

/// Manages evaluation runs for one observing view.
///
/// Cloning is cheap; clones share the same runs and count.
#[derive(Clone)]
pub struct EvaluationWorkflow {
    inner: Arc<WorkflowInner>,
}

impl EvaluationWorkflow {
    pub fn new(
        checker: RequirementChecker,
        evaluator: Arc<dyn Evaluator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_options(checker, evaluator, notifier, WorkflowOptions::default())
    }

    pub fn with_options(
        checker: RequirementChecker,
        evaluator: Arc<dyn Evaluator>,
        notifier: Arc<dyn Notifier>,
        options: WorkflowOptions,
    ) -> Self {
        let seeded = checker.count_missing(&options.initial_record);
        let (missing_count, _) = watch::channel(seeded);
        let (in_flight, _) = watch::channel(0);

        Self {
            inner: Arc::new(WorkflowInner {
                id: Uuid::new_v4(),
                checker,
                evaluator,
                notifier,
                metrics: EvaluationMetrics::new(),
                options,
                slot: Mutex::new(RunSlot::default()),
                outbox: Mutex::new(Outbox::default()),
                missing_count,
                in_flight,
            }),
        }
    }

    /// Workflow backed by the default fixed-delay evaluator.
    pub fn from_config(config: &EvaluationConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_options(
            RequirementChecker::new(config.required_field_set()),
            Arc::new(DelayedEvaluator::from_config(config)),
            notifier,
            WorkflowOptions::from_config(config),
        )
    }

    /// Submit a record for evaluation.
    ///
    /// Must be called from within a tokio runtime. The missing count is not
    /// touched until the run completes.
    pub fn submit(&self, record: &Record) -> RunHandle {
        let snapshot = record.clone();
        let correlation_id = generate_correlation_id();

        let (run_id, handle) = {
            let mut slot = self.inner.lock();
            slot.last_issued += 1;
            let run_id = RunId(slot.last_issued);

            if let Some(previous) = self.inner.supersede_active(&mut slot) {
                debug!(
                    run_id = %run_id,
                    superseded = %previous,
                    "New submission replaces active run"
                );
            }

            let (observer, receiver) = watch::channel(Observation::Pending);
            slot.live.insert(
                run_id,
                LiveRun {
                    run: EvaluationRun::start(run_id, correlation_id.clone(), snapshot.clone()),
                    lifecycle: RunStateMachine::new(run_id),
                    observer,
                    abort: None,
                },
            );
            slot.active = Some(run_id);
            self.inner.publish_in_flight(&slot);

            let handle = RunHandle {
                workflow_id: self.inner.id,
                run_id,
                observer: receiver,
            };
            (run_id, handle)
        };

        self.inner.metrics.record_submitted();
        let span = create_evaluation_span(run_id, &correlation_id);
        info!(parent: &span, run_id = %run_id, fields = snapshot.len(), "Evaluation submitted");

        let evaluator = Arc::clone(&self.inner.evaluator);
        let timeout = self.inner.options.evaluation_timeout;
        let work = tokio::spawn(
            async move {
                let evaluation = evaluator.evaluate(run_id, snapshot);
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, evaluation)
                        .await
                        .unwrap_or(Err(EvaluatorError::Timeout {
                            timeout_ms: limit.as_millis() as u64,
                        })),
                    None => evaluation.await,
                }
            }
            .instrument(span.clone()),
        );

        if let Some(live) = self.inner.lock().live.get_mut(&run_id) {
            live.abort = Some(work.abort_handle());
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(
            async move {
                let result = match work.await {
                    Ok(result) => result,
                    // cancel() already retired the run
                    Err(join_error) if join_error.is_cancelled() => return,
                    Err(join_error) => Err(EvaluatorError::Backend {
                        reason: format!("evaluator panicked: {join_error}"),
                    }),
                };
                inner.on_evaluator_result(run_id, result);
            }
            .instrument(span),
        );

        handle
    }

    /// Stop observing a run without stopping its evaluation.
    ///
    /// Only a running, attached run changes; everything else is a no-op.
    pub fn detach_observation(&self, handle: &RunHandle) -> Result<ControlOutcome, WorkflowError> {
        let run_id = handle.run_id;
        {
            let mut slot = self.inner.lock();
            self.inner.check_handle(&slot, handle)?;

            let Some(live) = slot.live.get_mut(&run_id) else {
                debug!(run_id = %run_id, "Detach after run finished is a no-op");
                return Ok(ControlOutcome::Unchanged);
            };
            if live.run.status != RunStatus::Running {
                debug!(run_id = %run_id, status = ?live.run.status, "Detach ignored");
                return Ok(ControlOutcome::Unchanged);
            }

            live.apply(RunEvent::Detach);
            live.observer.send_replace(Observation::Detached);
            if slot.active == Some(run_id) {
                slot.active = None;
            }
            self.inner.enqueue(&slot, Dispatch::Continuation(run_id));
        }

        self.inner.metrics.record_detached();
        self.inner.flush_notifications();
        Ok(ControlOutcome::Changed(RunStatus::ObservationDetached))
    }

    /// Abort the underlying evaluation. Only available when the evaluator
    /// supports it; otherwise use [`detach_observation`](Self::detach_observation).
    pub fn cancel(&self, handle: &RunHandle) -> Result<ControlOutcome, WorkflowError> {
        let run_id = handle.run_id;
        let mut slot = self.inner.lock();
        self.inner.check_handle(&slot, handle)?;

        if !self.inner.evaluator.supports_abort() {
            return Err(WorkflowError::AbortUnsupported { run_id });
        }

        let Some(mut live) = slot.live.remove(&run_id) else {
            return Ok(ControlOutcome::Unchanged);
        };

        let was_attached = live.run.status == RunStatus::Running;
        let was_detached = live.run.status == RunStatus::ObservationDetached;
        let completed_at = Utc::now();
        live.apply(RunEvent::Abort);
        live.run.completed_at = Some(completed_at);
        if let Some(abort) = live.abort.take() {
            abort.abort();
        }
        if was_attached {
            live.observer.send_replace(Observation::Cancelled);
        }
        if was_detached {
            // Detached runs only end through the notifier
            let outcome = EvaluationOutcome::Failed {
                error: WorkflowError::Cancelled { run_id },
            };
            live.run.outcome = Some(outcome.clone());
            self.inner.enqueue(
                &slot,
                Dispatch::Result(BackgroundResult {
                    run_id,
                    outcome,
                    completed_at,
                }),
            );
        }
        if slot.active == Some(run_id) {
            slot.active = None;
        }
        slot.retire(live.run, self.inner.options.history_limit);
        self.inner.publish_in_flight(&slot);
        drop(slot);

        self.inner.metrics.record_cancelled();
        if was_detached {
            self.inner.metrics.record_background_delivered();
        }
        self.inner.flush_notifications();
        info!(run_id = %run_id, "Evaluation cancelled");
        Ok(ControlOutcome::Changed(RunStatus::Cancelled))
    }

    /// Return to `Idle`, superseding the active run if there is one.
    pub fn reset(&self) -> Option<RunId> {
        let mut slot = self.inner.lock();
        self.inner.supersede_active(&mut slot)
    }

    /// Completion entry point for evaluator results. The first result for a
    /// run wins; later ones are ignored.
    pub fn on_evaluator_result(
        &self,
        run_id: RunId,
        result: Result<EvaluatorReport, EvaluatorError>,
    ) -> ResultDisposition {
        self.inner.on_evaluator_result(run_id, result)
    }

    /// Last committed missing-requirements count.
    pub fn current_missing_count(&self) -> usize {
        *self.inner.missing_count.borrow()
    }

    /// Receive every committed change to the missing count.
    pub fn subscribe_missing_count(&self) -> watch::Receiver<usize> {
        self.inner.missing_count.subscribe()
    }

    pub fn state(&self) -> WorkflowState {
        match self.inner.lock().active {
            Some(run_id) => WorkflowState::Running { run_id },
            None => WorkflowState::Idle,
        }
    }

    /// Snapshot of a live or recently finished run.
    pub fn run(&self, run_id: RunId) -> Option<EvaluationRun> {
        self.inner.lock().lookup(run_id).cloned()
    }

    /// Runs whose evaluator has not reported yet (attached, detached or superseded).
    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    /// Wait until every submitted run has finished or been cancelled.
    pub async fn wait_until_quiescent(&self) {
        let mut in_flight = self.inner.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot close early
        let _ = in_flight.wait_for(|count| *count == 0).await;
    }

    pub fn checker(&self) -> &RequirementChecker {
        &self.inner.checker
    }

    pub fn metrics(&self) -> &EvaluationMetrics {
        &self.inner.metrics
    }
}
