//! Events, triggers and the signals a machine reacts to.

use crate::error::MutationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for user-facing machine events.
///
/// Events are tagged values sent by the view (form submit, field update).
/// `names` lists every tag the type can produce so a machine definition that
/// references an undeclared event is rejected when it is built.
pub trait Event: Clone + Debug + Send + Sync + 'static {
    /// Tag of this event, e.g. `"SUBMIT"`.
    fn name(&self) -> &str;

    /// Every tag this event type declares.
    fn names() -> &'static [&'static str];
}

/// What a transition listens for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    /// A user event with the given tag.
    Event(String),
    /// The state's invocation resolved successfully.
    Done,
    /// The state's invocation failed.
    Error,
    /// The state's readiness gate opened.
    Ready,
    /// The state's readiness gate gave up.
    Timeout,
}

impl Trigger {
    pub fn event(name: impl Into<String>) -> Self {
        Trigger::Event(name.into())
    }

    /// Label used in logs and history.
    pub fn label(&self) -> &str {
        match self {
            Trigger::Event(name) => name,
            Trigger::Done => "done",
            Trigger::Error => "error",
            Trigger::Ready => "ready",
            Trigger::Timeout => "timeout",
        }
    }

    /// Does this trigger accept `signal`?
    pub fn matches<E: Event>(&self, signal: &Signal<E>) -> bool {
        match (self, signal) {
            (Trigger::Event(name), Signal::Event(event)) => name == event.name(),
            (Trigger::Done, Signal::Done(_)) => true,
            (Trigger::Error, Signal::Error(_)) => true,
            (Trigger::Ready, Signal::Ready) => true,
            (Trigger::Timeout, Signal::Timeout(_)) => true,
            _ => false,
        }
    }
}

/// A signal delivered to a machine: either a user event or the outcome of
/// something the machine started itself.
#[derive(Clone, Debug)]
pub enum Signal<E> {
    Event(E),
    Done(Arc<Value>),
    Error(Arc<MutationError>),
    Ready,
    Timeout(Arc<MutationError>),
}

impl<E: Event> Signal<E> {
    pub fn label(&self) -> &str {
        match self {
            Signal::Event(event) => event.name(),
            Signal::Done(_) => "done",
            Signal::Error(_) => "error",
            Signal::Ready => "ready",
            Signal::Timeout(_) => "timeout",
        }
    }

    pub fn event(&self) -> Option<&E> {
        match self {
            Signal::Event(event) => Some(event),
            _ => None,
        }
    }

    /// Response body of a successful invocation.
    pub fn output(&self) -> Option<&Value> {
        match self {
            Signal::Done(value) => Some(value),
            _ => None,
        }
    }

    /// Error carried by a failed invocation or an expired readiness gate.
    pub fn error(&self) -> Option<&Arc<MutationError>> {
        match self {
            Signal::Error(error) | Signal::Timeout(error) => Some(error),
            _ => None,
        }
    }
}
