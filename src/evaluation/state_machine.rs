use statig::prelude::*;

use super::types::{RunId, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// Observer stopped watching; work continues
    Detach,
    /// A newer submission took over the observer
    Supersede,
    /// Evaluator delivered a result (success or failure)
    Finish,
    /// Underlying work was aborted
    Abort,
}

/// Per-run lifecycle. Terminal states ignore every event.
pub struct RunLifecycle {
    run_id: RunId,
}

impl RunLifecycle {
    pub fn new(run_id: RunId) -> Self {
        Self { run_id }
    }
}

#[state_machine(initial = "State::running()")]
impl RunLifecycle {
    #[state]
    fn running(&mut self, event: &RunEvent) -> Outcome<State> {
        match event {
            RunEvent::Detach => {
                tracing::info!(run_id = %self.run_id, "Observation detached, evaluation continues");
                Transition(State::observation_detached())
            }
            RunEvent::Supersede => {
                tracing::debug!(run_id = %self.run_id, "Run superseded by newer submission");
                Transition(State::superseded())
            }
            RunEvent::Finish => Transition(State::completed()),
            RunEvent::Abort => Transition(State::cancelled()),
        }
    }

    #[state]
    fn observation_detached(&mut self, event: &RunEvent) -> Outcome<State> {
        match event {
            RunEvent::Finish => {
                tracing::debug!(run_id = %self.run_id, "Detached run finished");
                Transition(State::completed())
            }
            RunEvent::Abort => Transition(State::cancelled()),
            RunEvent::Detach | RunEvent::Supersede => Handled,
        }
    }

    #[state]
    fn superseded(&mut self, event: &RunEvent) -> Outcome<State> {
        match event {
            RunEvent::Abort => Transition(State::cancelled()),
            _ => Handled,
        }
    }

    #[state]
    fn completed(&mut self, event: &RunEvent) -> Outcome<State> {
        let _ = event;
        Handled
    }

    #[state]
    fn cancelled(&mut self, event: &RunEvent) -> Outcome<State> {
        let _ = event;
        Handled
    }
}

/// Run status tracked by a statig machine.
pub(crate) struct RunStateMachine {
    machine: StateMachine<RunLifecycle>,
}

impl RunStateMachine {
    pub(crate) fn new(run_id: RunId) -> Self {
        Self {
            machine: RunLifecycle::new(run_id).state_machine(),
        }
    }

    pub(crate) fn handle(&mut self, event: RunEvent) -> RunStatus {
        self.machine.handle(&event);
        self.status()
    }

    pub(crate) fn status(&self) -> RunStatus {
        match self.machine.state() {
            State::Running { .. } => RunStatus::Running,
            State::ObservationDetached { .. } => RunStatus::ObservationDetached,
            State::Superseded { .. } => RunStatus::Superseded,
            State::Completed { .. } => RunStatus::Completed,
            State::Cancelled { .. } => RunStatus::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attached_run_completes() {
        let mut sm = RunStateMachine::new(RunId(1));
        assert_eq!(sm.status(), RunStatus::Running);
        assert_eq!(sm.handle(RunEvent::Finish), RunStatus::Completed);
    }

    #[test]
    fn test_detached_run_still_completes() {
        let mut sm = RunStateMachine::new(RunId(1));
        assert_eq!(sm.handle(RunEvent::Detach), RunStatus::ObservationDetached);
        // Repeated detach and a later submission leave a detached run alone
        assert_eq!(sm.handle(RunEvent::Detach), RunStatus::ObservationDetached);
        assert_eq!(sm.handle(RunEvent::Supersede), RunStatus::ObservationDetached);
        assert_eq!(sm.handle(RunEvent::Finish), RunStatus::Completed);
    }

    #[test]
    fn test_superseded_run_ignores_detach_and_finish() {
        let mut sm = RunStateMachine::new(RunId(2));
        assert_eq!(sm.handle(RunEvent::Supersede), RunStatus::Superseded);
        assert_eq!(sm.handle(RunEvent::Detach), RunStatus::Superseded);
        assert_eq!(sm.handle(RunEvent::Finish), RunStatus::Superseded);
    }

    #[test]
    fn test_terminal_states_absorb_events() {
        let mut sm = RunStateMachine::new(RunId(3));
        sm.handle(RunEvent::Finish);
        for event in [RunEvent::Detach, RunEvent::Supersede, RunEvent::Abort, RunEvent::Finish] {
            assert_eq!(sm.handle(event), RunStatus::Completed);
        }

        let mut sm = RunStateMachine::new(RunId(4));
        assert_eq!(sm.handle(RunEvent::Abort), RunStatus::Cancelled);
        assert_eq!(sm.handle(RunEvent::Finish), RunStatus::Cancelled);
    }
}
