//! State transition history tracking.
//!
//! Every state change a machine instance makes is appended here, so tests and
//! the view can inspect the exact path a mutation took.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single state change.
///
/// Internal transitions (context updates that keep the state) are not
/// recorded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being transitioned from
    pub from: S,
    /// The state being transitioned to
    pub to: S,
    /// Label of the trigger that caused the change (`SUBMIT`, `done`, ...)
    pub trigger: String,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
    /// Invocation attempt active when the transition happened
    pub attempt: u64,
}

/// Ordered history of state transitions.
///
/// # Example
///
/// ```rust
/// use caseflow::core::{StateHistory, StateTransition};
/// use caseflow::mutation::MutationState;
/// use chrono::Utc;
///
/// let history = StateHistory::new()
///     .record(StateTransition {
///         from: MutationState::Idle,
///         to: MutationState::Loading,
///         trigger: "SUBMIT".into(),
///         timestamp: Utc::now(),
///         attempt: 1,
///     })
///     .record(StateTransition {
///         from: MutationState::Loading,
///         to: MutationState::Success,
///         trigger: "done".into(),
///         timestamp: Utc::now(),
///         attempt: 1,
///     });
///
/// let path = history.get_path();
/// assert_eq!(path.len(), 3); // Idle -> Loading -> Success
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    transitions: Vec<StateTransition<S>>,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a transition, returning the extended history.
    pub fn record(mut self, transition: StateTransition<S>) -> Self {
        self.transitions.push(transition);
        self
    }

    pub(crate) fn push(&mut self, transition: StateTransition<S>) {
        self.transitions.push(transition);
    }

    /// Get the path of states traversed.
    ///
    /// Returns the initial state followed by the `to` state of each
    /// transition.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Number of times the machine entered `state`.
    pub fn entries_into(&self, state: &S) -> usize {
        self.transitions.iter().filter(|t| &t.to == state).count()
    }

    /// Calculate total duration from first to last transition.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Get all transitions.
    pub fn transitions(&self) -> &[StateTransition<S>] {
        &self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Loading,
        Success,
        Failure,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "Idle",
                Self::Loading => "Loading",
                Self::Success => "Success",
                Self::Failure => "Failure",
            }
        }
    }

    fn step(
        from: TestState,
        to: TestState,
        trigger: &str,
        attempt: u64,
    ) -> StateTransition<TestState> {
        StateTransition {
            from,
            to,
            trigger: trigger.to_string(),
            timestamp: Utc::now(),
            attempt,
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<TestState> = StateHistory::new();
        assert!(history.transitions().is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let history = StateHistory::new()
            .record(step(TestState::Idle, TestState::Loading, "SUBMIT", 1))
            .record(step(TestState::Loading, TestState::Failure, "error", 1))
            .record(step(TestState::Failure, TestState::Loading, "SUBMIT", 2));

        let path = history.get_path();
        assert_eq!(
            path,
            vec![
                &TestState::Idle,
                &TestState::Loading,
                &TestState::Failure,
                &TestState::Loading
            ]
        );
        assert_eq!(history.entries_into(&TestState::Loading), 2);
        assert_eq!(history.entries_into(&TestState::Success), 0);
    }

    #[test]
    fn duration_calculates_elapsed_time() {
        let submit = step(TestState::Idle, TestState::Loading, "SUBMIT", 1);
        let history = StateHistory::new().record(submit);

        std::thread::sleep(std::time::Duration::from_millis(10));

        let history = history.record(step(TestState::Loading, TestState::Success, "done", 1));

        let duration = history.duration();
        assert!(duration.unwrap() >= std::time::Duration::from_millis(10));
    }

    #[test]
    fn history_serializes_correctly() {
        let submit = step(TestState::Idle, TestState::Loading, "SUBMIT", 1);
        let history = StateHistory::new().record(submit);

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: StateHistory<TestState> = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.transitions().len(), 1);
        assert_eq!(deserialized.transitions()[0].trigger, "SUBMIT");
    }
}
