//! Resolved transitions and invocations.

use super::registry::SideEffect;
use crate::core::{Event, Guard, Signal, State, Trigger};
use crate::error::MutationError;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Pure context update applied when a transition fires.
pub type Reducer<E, C> = Arc<dyn Fn(&mut C, &Signal<E>) + Send + Sync>;

pub type InvokeFuture = BoxFuture<'static, Result<Value, MutationError>>;

/// Starts the asynchronous work a state performs on entry (usually the HTTP
/// action). Called once per entry.
pub type Invoke<E, C, Env> = Arc<dyn Fn(InvokeScope<E, C, Env>) -> InvokeFuture + Send + Sync>;

/// Owned inputs for one invocation.
pub struct InvokeScope<E, C, Env> {
    pub env: Env,
    /// Context as it was when the state was entered.
    pub context: C,
    /// Sends events back into the machine while this entry is current.
    pub events: EventSink<E>,
    pub attempt: u64,
    /// Cancelled when the machine is torn down.
    pub abort: CancellationToken,
}

/// Handle an invocation uses to report intermediate events (upload progress).
pub struct EventSink<E> {
    deliver: Arc<dyn Fn(E) -> bool + Send + Sync>,
}

impl<E> EventSink<E> {
    pub(crate) fn new<F>(deliver: F) -> Self
    where
        F: Fn(E) -> bool + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// A sink that drops everything it is given.
    pub fn detached() -> Self {
        Self::new(|_| false)
    }

    /// Returns `false` if the machine is gone.
    pub fn send(&self, event: E) -> bool {
        (self.deliver)(event)
    }
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            deliver: Arc::clone(&self.deliver),
        }
    }
}

pub struct NamedEffect<E, C, Env> {
    pub name: String,
    pub run: SideEffect<E, C, Env>,
}

impl<E, C, Env> Clone for NamedEffect<E, C, Env> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            run: Arc::clone(&self.run),
        }
    }
}

/// One row of the transition table with its effects resolved.
///
/// `target: None` is an internal transition: the reducer and effects run,
/// the state (and any invocation in progress) is left alone.
pub struct Transition<S: State, E, C, Env> {
    pub from: S,
    pub trigger: Trigger,
    pub target: Option<S>,
    pub guard: Option<Guard<C>>,
    pub assign: Option<Reducer<E, C>>,
    pub effects: Vec<NamedEffect<E, C, Env>>,
}

impl<S: State, E: Event, C, Env> Transition<S, E, C, Env> {
    /// Check if this transition fires for `signal` in `current` (pure).
    pub fn can_fire(&self, current: &S, signal: &Signal<E>, context: &C) -> bool {
        if *current != self.from || !self.trigger.matches(signal) {
            return false;
        }
        self.guard.as_ref().is_none_or(|g| g.check(context))
    }

    pub fn is_internal(&self) -> bool {
        self.target.is_none()
    }
}

impl<S: State, E, C, Env> Clone for Transition<S, E, C, Env> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            trigger: self.trigger.clone(),
            target: self.target.clone(),
            guard: self.guard.clone(),
            assign: self.assign.clone(),
            effects: self.effects.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{MutationEvent, MutationState};

    #[derive(Clone)]
    struct Draft {
        comment: String,
    }

    type Submit = Transition<MutationState, MutationEvent<()>, Draft, ()>;

    fn submit(guard: Option<Guard<Draft>>) -> Submit {
        Transition {
            from: MutationState::Idle,
            trigger: Trigger::event("SUBMIT"),
            target: Some(MutationState::Loading),
            guard,
            assign: None,
            effects: Vec::new(),
        }
    }

    #[test]
    fn can_fire_matches_state_and_trigger() {
        let transition = submit(None);
        let draft = Draft {
            comment: "looks fine".into(),
        };

        let submit = Signal::Event(MutationEvent::Submit);
        let progress = Signal::Event(MutationEvent::Progress(3));

        assert!(transition.can_fire(&MutationState::Idle, &submit, &draft));
        assert!(!transition.can_fire(&MutationState::Loading, &submit, &draft));
        assert!(!transition.can_fire(&MutationState::Idle, &progress, &draft));
    }

    #[test]
    fn can_fire_respects_guard() {
        let transition = submit(Some(Guard::new(|d: &Draft| !d.comment.is_empty())));

        assert!(!transition.can_fire(
            &MutationState::Idle,
            &Signal::Event(MutationEvent::Submit),
            &Draft { comment: String::new() }
        ));
    }

    #[test]
    fn detached_sink_rejects_events() {
        let sink: EventSink<MutationEvent<()>> = EventSink::detached();
        assert!(!sink.send(MutationEvent::Submit));
    }
}
