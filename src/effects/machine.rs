//! Running machine instances.
//!
//! A [`Machine`] owns one instance of a [`MachineDefinition`]. Signals go
//! through a mailbox and are applied one at a time; a signal sent from inside
//! an effect is queued behind the current one instead of re-entering.
//!
//! Entering a state with an invocation spawns it on the tokio runtime.
//! Its outcome is tagged with the entry epoch and dropped if the machine
//! has moved on or has been stopped by the time it arrives.

use super::definition::MachineDefinition;
use super::registry::{EffectScope, MachineInfo};
use super::transition::{EventSink, InvokeScope};
use crate::core::{Event, Signal, State, StateHistory, StateTransition};
use crate::readiness::{wait_until_ready, ReadinessOutcome};
use crate::snapshot::Snapshot;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

struct Inner<S: State, C> {
    state: S,
    context: C,
    /// Shared with published snapshots; cloned only when a state change is
    /// recorded while a snapshot still holds it.
    history: Arc<StateHistory<S>>,
    epoch: u64,
    attempt: u64,
}

struct Envelope<E> {
    signal: Signal<E>,
    /// Entry epoch an invocation outcome belongs to; `None` for user events.
    epoch: Option<u64>,
}

/// What a fired transition leaves behind once the lock is released.
struct Fired<S: State, C> {
    from: S,
    entered: Option<S>,
    context: C,
    epoch: u64,
    attempt: u64,
    snapshot: Snapshot<S, C>,
}

struct Shared<S: State, E, C, Env> {
    id: Uuid,
    definition: Arc<MachineDefinition<S, E, C, Env>>,
    env: Env,
    inner: Mutex<Inner<S, C>>,
    mailbox: Mutex<VecDeque<Envelope<E>>>,
    draining: AtomicBool,
    shutdown: CancellationToken,
    snapshots: watch::Sender<Snapshot<S, C>>,
}

/// A running machine. Dropping it stops it.
pub struct Machine<S, E, C, Env>
where
    S: State,
    E: Event,
    C: Clone + Send + Sync + 'static,
    Env: Clone + Send + Sync + 'static,
{
    shared: Arc<Shared<S, E, C, Env>>,
}

/// Cloneable handle for sending events to a machine without owning it.
pub struct MachineSender<E> {
    deliver: Arc<dyn Fn(E) -> bool + Send + Sync>,
}

impl<E> MachineSender<E> {
    /// Returns `false` once the machine has been dropped or stopped.
    pub fn send(&self, event: E) -> bool {
        (self.deliver)(event)
    }
}

impl<E> Clone for MachineSender<E> {
    fn clone(&self) -> Self {
        Self {
            deliver: Arc::clone(&self.deliver),
        }
    }
}

impl<S, E, C, Env> Machine<S, E, C, Env>
where
    S: State,
    E: Event,
    C: Clone + Send + Sync + 'static,
    Env: Clone + Send + Sync + 'static,
{
    /// Start an instance in the definition's initial state.
    ///
    /// Must be called inside a tokio runtime if any state invokes work or
    /// waits on readiness.
    pub fn start(definition: Arc<MachineDefinition<S, E, C, Env>>, env: Env, context: C) -> Self {
        let id = Uuid::new_v4();
        let initial = definition.initial().clone();
        let attempt = u64::from(definition.invokes_in(&initial));
        let inner = Inner {
            state: initial.clone(),
            context: context.clone(),
            history: Arc::new(StateHistory::new()),
            epoch: 0,
            attempt,
        };
        let (snapshots, _) = watch::channel(snapshot_of(id, definition.name(), &inner));

        let shared = Arc::new(Shared {
            id,
            definition,
            env,
            inner: Mutex::new(inner),
            mailbox: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            snapshots,
        });
        debug!(
            machine = %shared.definition.name(),
            id = %id,
            state = initial.name(),
            "machine.started"
        );
        shared.enter(&initial, context, 0, attempt);

        Self { shared }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        self.shared.definition.name()
    }

    pub fn definition(&self) -> &MachineDefinition<S, E, C, Env> {
        &self.shared.definition
    }

    pub fn state(&self) -> S {
        self.shared.inner.lock().state.clone()
    }

    pub fn context(&self) -> C {
        self.shared.inner.lock().context.clone()
    }

    pub fn history(&self) -> StateHistory<S> {
        StateHistory::clone(&self.shared.inner.lock().history)
    }

    /// Number of invocations started so far.
    pub fn attempt(&self) -> u64 {
        self.shared.inner.lock().attempt
    }

    pub fn snapshot(&self) -> Snapshot<S, C> {
        self.shared.snapshots.borrow().clone()
    }

    /// Receive a snapshot after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<S, C>> {
        self.shared.snapshots.subscribe()
    }

    /// Deliver a user event. Events with no matching transition in the
    /// current state are ignored.
    pub fn send(&self, event: E) {
        self.shared.enqueue(Envelope {
            signal: Signal::Event(event),
            epoch: None,
        });
    }

    pub fn sender(&self) -> MachineSender<E> {
        let weak: Weak<Shared<S, E, C, Env>> = Arc::downgrade(&self.shared);
        MachineSender {
            deliver: Arc::new(move |event: E| match weak.upgrade() {
                Some(shared) if !shared.shutdown.is_cancelled() => {
                    shared.enqueue(Envelope {
                        signal: Signal::Event(event),
                        epoch: None,
                    });
                    true
                }
                _ => false,
            }),
        }
    }

    /// Tear the instance down. Pending outcomes and queued events are
    /// discarded; no further transitions or effects run.
    pub fn stop(&self) {
        if self.shared.shutdown.is_cancelled() {
            return;
        }
        self.shared.shutdown.cancel();
        self.shared.mailbox.lock().clear();
        debug!(machine = %self.name(), id = %self.id(), "machine.stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Wait until the machine reaches a state for which `done` holds and
    /// return that snapshot. Returns `None` if the machine stops first.
    pub async fn wait_for<F>(&self, done: F) -> Option<Snapshot<S, C>>
    where
        F: Fn(&S) -> bool,
    {
        let mut rx = self.subscribe();
        tokio::select! {
            biased;
            _ = self.shared.shutdown.cancelled() => None,
            found = rx.wait_for(|snapshot| done(&snapshot.state)) => found.ok().map(|s| s.clone()),
        }
    }
}

impl<S, E, C, Env> Drop for Machine<S, E, C, Env>
where
    S: State,
    E: Event,
    C: Clone + Send + Sync + 'static,
    Env: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}

fn snapshot_of<S: State, C: Clone>(id: Uuid, machine: &str, inner: &Inner<S, C>) -> Snapshot<S, C> {
    Snapshot {
        id,
        machine: machine.to_string(),
        state: inner.state.clone(),
        context: inner.context.clone(),
        history: Arc::clone(&inner.history),
        attempt: inner.attempt,
        updated_at: Utc::now(),
    }
}

impl<S, E, C, Env> Shared<S, E, C, Env>
where
    S: State,
    E: Event,
    C: Clone + Send + Sync + 'static,
    Env: Clone + Send + Sync + 'static,
{
    fn enqueue(self: &Arc<Self>, envelope: Envelope<E>) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.mailbox.lock().push_back(envelope);
        self.drain();
    }

    fn drain(self: &Arc<Self>) {
        loop {
            if self.draining.swap(true, Ordering::AcqRel) {
                return;
            }
            loop {
                let next = self.mailbox.lock().pop_front();
                let Some(envelope) = next else { break };
                self.process(envelope);
            }
            self.draining.store(false, Ordering::Release);
            // An enqueue may have slipped in between the last pop and the store.
            if self.mailbox.lock().is_empty() {
                return;
            }
        }
    }

    fn current_epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    fn process(self: &Arc<Self>, envelope: Envelope<E>) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let Envelope { signal, epoch } = envelope;
        let name = self.definition.name();

        let (transition, fired) = {
            let mut inner = self.inner.lock();
            if epoch.is_some_and(|epoch| epoch != inner.epoch) {
                trace!(machine = %name, signal = signal.label(), "machine.stale_outcome");
                return;
            }
            let selected = self.definition.select(&inner.state, &signal, &inner.context);
            let Some(transition) = selected else {
                trace!(
                    machine = %name,
                    state = inner.state.name(),
                    signal = signal.label(),
                    "machine.ignored"
                );
                return;
            };

            if let Some(assign) = &transition.assign {
                assign(&mut inner.context, &signal);
            }
            let from = inner.state.clone();
            let entered = transition.target.clone();
            if let Some(to) = &entered {
                inner.epoch += 1;
                if self.definition.invokes_in(to) {
                    inner.attempt += 1;
                }
                let record = StateTransition {
                    from: from.clone(),
                    to: to.clone(),
                    trigger: transition.trigger.label().to_string(),
                    timestamp: Utc::now(),
                    attempt: inner.attempt,
                };
                Arc::make_mut(&mut inner.history).push(record);
                inner.state = to.clone();
            }

            let fired = Fired {
                from,
                entered,
                context: inner.context.clone(),
                epoch: inner.epoch,
                attempt: inner.attempt,
                snapshot: snapshot_of(self.id, name, &inner),
            };
            (transition, fired)
        };

        let to = fired.entered.as_ref().unwrap_or(&fired.from);
        debug!(
            machine = %name,
            id = %self.id,
            from = fired.from.name(),
            to = to.name(),
            trigger = transition.trigger.label(),
            "machine.transition"
        );

        let scope = EffectScope {
            env: &self.env,
            context: &fired.context,
            signal: &signal,
            machine: MachineInfo {
                name,
                id: self.id,
                attempt: fired.attempt,
                from: fired.from.name(),
                to: to.name(),
            },
        };
        for effect in &transition.effects {
            trace!(machine = %name, effect = %effect.name, "machine.effect");
            (effect.run)(&scope);
        }

        self.snapshots.send_replace(fired.snapshot);

        if let Some(state) = &fired.entered {
            self.enter(state, fired.context, fired.epoch, fired.attempt);
        }
    }

    /// Start the work `state` performs on entry.
    fn enter(self: &Arc<Self>, state: &S, context: C, epoch: u64, attempt: u64) {
        if self.shutdown.is_cancelled() {
            return;
        }

        if let Some(invoke) = self.definition.invocation_for(state) {
            let scope = InvokeScope {
                env: self.env.clone(),
                context,
                events: self.sink(epoch),
                attempt,
                abort: self.shutdown.child_token(),
            };
            let pending = invoke(scope);
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = shared.shutdown.cancelled() => return,
                    outcome = pending => outcome,
                };
                let signal = match outcome {
                    Ok(value) => Signal::Done(Arc::new(value)),
                    Err(error) => {
                        warn!(
                            machine = %shared.definition.name(),
                            id = %shared.id,
                            attempt,
                            error = %error,
                            "machine.invoke_failed"
                        );
                        Signal::Error(Arc::new(error))
                    }
                };
                shared.enqueue(Envelope {
                    signal,
                    epoch: Some(epoch),
                });
            });
        }

        if let Some(readiness) = self.definition.readiness_for(state) {
            let readiness = readiness.clone();
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                let still_waiting = || shared.current_epoch() == epoch;
                let outcome = wait_until_ready(&readiness, &shared.shutdown, still_waiting).await;
                let signal = match outcome {
                    None => return,
                    Some(ReadinessOutcome::Ready { attempts }) => {
                        trace!(machine = %shared.definition.name(), attempts, "machine.ready");
                        Signal::Ready
                    }
                    Some(ReadinessOutcome::Expired(error)) => Signal::Timeout(Arc::new(error)),
                };
                shared.enqueue(Envelope {
                    signal,
                    epoch: Some(epoch),
                });
            });
        }
    }

    /// Events an invocation emits belong to the entry that started it.
    fn sink(self: &Arc<Self>, epoch: u64) -> EventSink<E> {
        let weak = Arc::downgrade(self);
        EventSink::new(move |event| match weak.upgrade() {
            Some(shared) if !shared.shutdown.is_cancelled() => {
                shared.enqueue(Envelope {
                    signal: Signal::Event(event),
                    epoch: Some(epoch),
                });
                true
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, TransitionBuilder};
    use crate::effects::EffectRegistry;
    use crate::error::MutationError;
    use crate::mutation::{MutationEvent, MutationState};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    type FormEvent = MutationEvent<String>;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Form {
        comment: String,
        saved: Option<serde_json::Value>,
    }

    type Definition = Arc<MachineDefinition<MutationState, FormEvent, Form, ()>>;

    fn gated_definition(gate: Arc<Notify>, calls: Arc<AtomicUsize>) -> Definition {
        MachineBuilder::new("answer_draft")
            .initial(MutationState::Idle)
            .transition(
                TransitionBuilder::new()
                    .from(MutationState::Idle)
                    .on("SUBMIT")
                    .to(MutationState::Loading),
            )
            .transition(
                TransitionBuilder::new()
                    .from(MutationState::Loading)
                    .on_done()
                    .to(MutationState::Success)
                    .assign(|form: &mut Form, signal: &Signal<FormEvent>| {
                        form.saved = signal.output().cloned();
                    }),
            )
            .transition(
                TransitionBuilder::new()
                    .from(MutationState::Loading)
                    .on_error()
                    .to(MutationState::Failure),
            )
            .transition(
                TransitionBuilder::new()
                    .from(MutationState::Loading)
                    .on("UPDATE")
                    .assign(|form: &mut Form, signal: &Signal<FormEvent>| {
                        if let Some(MutationEvent::Update(comment)) = signal.event() {
                            form.comment = comment.clone();
                        }
                    }),
            )
            .invoke(MutationState::Loading, move |_scope| {
                let gate = Arc::clone(&gate);
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    gate.notified().await;
                    Ok::<_, MutationError>(json!({"id": 12}))
                }
            })
            .registry(EffectRegistry::new())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn outcome_is_applied_after_invocation_resolves() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let definition = gated_definition(Arc::clone(&gate), Arc::clone(&calls));
        let machine = Machine::start(definition, (), Form::default());

        machine.send(MutationEvent::Submit);
        assert_eq!(machine.state(), MutationState::Loading);
        gate.notify_one();

        let snapshot = machine.wait_for(|s| *s == MutationState::Success).await.unwrap();
        assert_eq!(snapshot.context.saved, Some(json!({"id": 12})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(machine.attempt(), 1);
    }

    #[tokio::test]
    async fn submit_while_loading_is_ignored() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let definition = gated_definition(Arc::clone(&gate), Arc::clone(&calls));
        let machine = Machine::start(definition, (), Form::default());

        machine.send(MutationEvent::Submit);
        machine.send(MutationEvent::Submit);
        machine.send(MutationEvent::Submit);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(machine.history().transitions().len(), 1);
    }

    #[tokio::test]
    async fn stopped_machine_discards_late_outcome() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let definition = gated_definition(Arc::clone(&gate), calls);
        let machine = Machine::start(definition, (), Form::default());
        let mut snapshots = machine.subscribe();

        machine.send(MutationEvent::Submit);
        let _ = snapshots.borrow_and_update();
        machine.stop();
        gate.notify_one();
        tokio::task::yield_now().await;

        assert_eq!(machine.state(), MutationState::Loading);
        assert!(!snapshots.has_changed().unwrap_or(false));
        assert!(!machine.sender().send(MutationEvent::Submit));
    }

    #[tokio::test]
    async fn sender_reaches_running_machine() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let definition = gated_definition(gate, Arc::clone(&calls));
        let machine = Machine::start(definition, (), Form::default());

        assert!(machine.sender().send(MutationEvent::Submit));
        assert_eq!(machine.state(), MutationState::Loading);
    }

    #[tokio::test]
    async fn context_updates_share_the_published_history() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let definition = gated_definition(Arc::clone(&gate), calls);
        let machine = Machine::start(definition, (), Form::default());

        machine.send(MutationEvent::Submit);
        let loading = machine.snapshot();
        machine.send(MutationEvent::Update("typo fixed".into()));
        let updated = machine.snapshot();

        assert_eq!(updated.context.comment, "typo fixed");
        assert!(Arc::ptr_eq(&loading.history, &updated.history));

        gate.notify_one();
        let settled = machine.wait_for(|s| *s == MutationState::Success).await.unwrap();
        assert!(!Arc::ptr_eq(&loading.history, &settled.history));
        assert_eq!(settled.history.transitions().len(), 2);
        assert_eq!(loading.history.transitions().len(), 1);
    }
}
