//! Immutable, validated machine definition.

use super::transition::{Invoke, Transition};
use crate::core::{Event, Signal, State, Trigger};
use crate::readiness::Readiness;

/// A machine table produced by
/// [`MachineBuilder::build`](crate::builder::MachineBuilder::build).
///
/// Definitions are shared (`Arc`) between every running instance.
pub struct MachineDefinition<S: State, E, C, Env> {
    pub(crate) name: String,
    pub(crate) initial: S,
    pub(crate) transitions: Vec<Transition<S, E, C, Env>>,
    pub(crate) invocations: Vec<(S, Invoke<E, C, Env>)>,
    pub(crate) gates: Vec<(S, Readiness)>,
}

impl<S: State, E: Event, C, Env> MachineDefinition<S, E, C, Env> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial(&self) -> &S {
        &self.initial
    }

    pub fn transitions(&self) -> &[Transition<S, E, C, Env>] {
        &self.transitions
    }

    /// First transition that fires for `signal` in `current`, in declaration
    /// order (pure).
    pub fn select(
        &self,
        current: &S,
        signal: &Signal<E>,
        context: &C,
    ) -> Option<&Transition<S, E, C, Env>> {
        self.transitions
            .iter()
            .find(|t| t.can_fire(current, signal, context))
    }

    /// Triggers `state` declares, without evaluating guards.
    pub fn triggers_from<'a>(&'a self, state: &'a S) -> impl Iterator<Item = &'a Trigger> + 'a {
        self.transitions
            .iter()
            .filter(move |t| t.from == *state)
            .map(|t| &t.trigger)
    }

    /// Does `state` accept the user event tagged `name`?
    pub fn accepts(&self, state: &S, name: &str) -> bool {
        self.triggers_from(state)
            .any(|trigger| matches!(trigger, Trigger::Event(tag) if tag == name))
    }

    pub(crate) fn invocation_for(&self, state: &S) -> Option<&Invoke<E, C, Env>> {
        self.invocations
            .iter()
            .find(|(s, _)| s == state)
            .map(|(_, invoke)| invoke)
    }

    pub(crate) fn readiness_for(&self, state: &S) -> Option<&Readiness> {
        self.gates.iter().find(|(s, _)| s == state).map(|(_, r)| r)
    }

    pub fn invokes_in(&self, state: &S) -> bool {
        self.invocation_for(state).is_some()
    }

    pub fn waits_in(&self, state: &S) -> bool {
        self.readiness_for(state).is_some()
    }
}
