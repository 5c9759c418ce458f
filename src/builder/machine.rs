//! Builder for machine definitions.

use crate::builder::error::{BuildError, BuildErrors};
use crate::builder::transition::{TransitionBuilder, TransitionSpec};
use crate::core::{Event, State, Trigger};
use crate::effects::{
    EffectRegistry, EffectScope, Invoke, InvokeFuture, InvokeScope, MachineDefinition, NamedEffect,
    Transition,
};
use crate::error::MutationError;
use crate::readiness::Readiness;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<BuildError>>;

/// Builder for machine definitions with a fluent API.
///
/// Problems are collected rather than reported one at a time: `build`
/// returns every missing piece and dangling reference it finds.
pub struct MachineBuilder<S: State, E: Event, C, Env> {
    name: String,
    initial: Option<S>,
    transitions: Vec<TransitionBuilder<S, E, C>>,
    invocations: Vec<(S, Invoke<E, C, Env>)>,
    gates: Vec<(S, Readiness)>,
    registry: EffectRegistry<E, C, Env>,
}

impl<S, E, C, Env> MachineBuilder<S, E, C, Env>
where
    S: State,
    E: Event,
    C: Send + Sync + 'static,
    Env: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: None,
            transitions: Vec::new(),
            invocations: Vec::new(),
            gates: Vec::new(),
            registry: EffectRegistry::new(),
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Replace the effect registry transitions are resolved against.
    pub fn registry(mut self, registry: EffectRegistry<E, C, Env>) -> Self {
        self.registry = registry;
        self
    }

    /// Register one more effect.
    pub fn effect<F>(mut self, name: impl Into<String>, effect: F) -> Self
    where
        F: Fn(&EffectScope<'_, E, C, Env>) + Send + Sync + 'static,
    {
        self.registry.insert(name, Arc::new(effect));
        self
    }

    pub fn transition(mut self, builder: TransitionBuilder<S, E, C>) -> Self {
        self.transitions.push(builder);
        self
    }

    pub fn transitions(
        mut self,
        builders: impl IntoIterator<Item = TransitionBuilder<S, E, C>>,
    ) -> Self {
        self.transitions.extend(builders);
        self
    }

    /// Run `action` every time `state` is entered.
    pub fn invoke<F, Fut>(self, state: S, action: F) -> Self
    where
        F: Fn(InvokeScope<E, C, Env>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, MutationError>> + Send + 'static,
    {
        let invoke: Invoke<E, C, Env> =
            Arc::new(move |scope: InvokeScope<E, C, Env>| -> InvokeFuture {
                Box::pin(action(scope))
            });
        self.invoke_with(state, invoke)
    }

    pub fn invoke_with(mut self, state: S, invoke: Invoke<E, C, Env>) -> Self {
        self.invocations.push((state, invoke));
        self
    }

    /// Hold `state` until `readiness` opens (`ready`) or gives up (`timeout`).
    pub fn await_ready(mut self, state: S, readiness: Readiness) -> Self {
        self.gates.push((state, readiness));
        self
    }

    /// Build the definition.
    pub fn build(self) -> Result<Arc<MachineDefinition<S, E, C, Env>>, BuildErrors> {
        let MachineBuilder {
            name,
            initial,
            transitions,
            invocations,
            gates,
            registry,
        } = self;

        let mut checks: Vec<Check> = Vec::new();
        if initial.is_none() {
            checks.push(Validation::fail(BuildError::MissingInitialState));
        }
        if transitions.is_empty() {
            checks.push(Validation::fail(BuildError::NoTransitions));
        }
        for (index, (state, _)) in invocations.iter().enumerate() {
            if invocations[..index].iter().any(|(earlier, _)| earlier == state) {
                checks.push(Validation::fail(BuildError::DuplicateInvocation {
                    state: state.name().to_string(),
                }));
            }
        }

        let mut resolved = Vec::with_capacity(transitions.len());
        for builder in transitions {
            match builder.build() {
                Ok(spec) => {
                    let (transition, problems) = resolve(spec, &registry, &invocations, &gates);
                    checks.extend(problems.into_iter().map(Validation::fail));
                    resolved.push(transition);
                }
                Err(error) => checks.push(Validation::fail(error)),
            }
        }

        let failed = |errors: Vec<BuildError>| BuildErrors {
            machine: name.clone(),
            errors,
        };
        if let Validation::Failure(errors) = Validation::all_vec(checks) {
            return Err(failed(errors.iter().cloned().collect()));
        }
        let Some(initial) = initial else {
            return Err(failed(vec![BuildError::MissingInitialState]));
        };

        tracing::debug!(machine = %name, transitions = resolved.len(), "machine.defined");
        Ok(Arc::new(MachineDefinition {
            name,
            initial,
            transitions: resolved,
            invocations,
            gates,
        }))
    }
}

/// Resolve effect names and check the trigger has a source.
fn resolve<S, E, C, Env>(
    spec: TransitionSpec<S, E, C>,
    registry: &EffectRegistry<E, C, Env>,
    invocations: &[(S, Invoke<E, C, Env>)],
    gates: &[(S, Readiness)],
) -> (Transition<S, E, C, Env>, Vec<BuildError>)
where
    S: State,
    E: Event,
{
    let from = spec.from.name().to_string();
    let trigger = spec.trigger.label().to_string();
    let mut problems = Vec::new();

    match &spec.trigger {
        Trigger::Event(event) if !E::names().contains(&event.as_str()) => {
            problems.push(BuildError::UnknownEvent {
                event: event.clone(),
                from: from.clone(),
            });
        }
        Trigger::Done | Trigger::Error if !invocations.iter().any(|(s, _)| *s == spec.from) => {
            problems.push(BuildError::MissingInvocation {
                state: from.clone(),
                trigger: trigger.clone(),
            });
        }
        Trigger::Ready | Trigger::Timeout if !gates.iter().any(|(s, _)| *s == spec.from) => {
            problems.push(BuildError::MissingReadiness {
                state: from.clone(),
                trigger: trigger.clone(),
            });
        }
        _ => {}
    }

    let mut effects = Vec::with_capacity(spec.effects.len());
    for name in spec.effects {
        match registry.get(&name) {
            Some(run) => effects.push(NamedEffect { name, run }),
            None => problems.push(BuildError::UnknownEffect {
                effect: name,
                from: from.clone(),
                trigger: trigger.clone(),
            }),
        }
    }

    let transition = Transition {
        from: spec.from,
        trigger: spec.trigger,
        target: spec.target,
        guard: spec.guard,
        assign: spec.assign,
        effects,
    };
    (transition, problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{MutationEvent, MutationState};
    use crate::readiness::ReadySignal;

    type Builder = MachineBuilder<MutationState, MutationEvent<()>, (), ()>;

    fn submit() -> TransitionBuilder<MutationState, MutationEvent<()>, ()> {
        TransitionBuilder::new()
            .from(MutationState::Idle)
            .on("SUBMIT")
            .to(MutationState::Loading)
    }

    #[test]
    fn builder_validates_required_fields() {
        let errors = Builder::new("empty").build().err().unwrap();

        assert_eq!(errors.machine, "empty");
        assert!(errors.contains(&BuildError::MissingInitialState));
        assert!(errors.contains(&BuildError::NoTransitions));
        assert_eq!(errors.errors.len(), 2);
    }

    #[test]
    fn builder_collects_every_dangling_reference() {
        let errors = Builder::new("referral_send")
            .initial(MutationState::Idle)
            .transition(submit().effect("missing_effect"))
            .transition(
                TransitionBuilder::new()
                    .from(MutationState::Loading)
                    .on_done()
                    .to(MutationState::Success),
            )
            .transition(
                TransitionBuilder::new()
                    .from(MutationState::Success)
                    .on("ARCHIVE")
                    .to(MutationState::Idle),
            )
            .transition(
                TransitionBuilder::new()
                    .from(MutationState::Waiting)
                    .on_timeout()
                    .to(MutationState::TimedOut),
            )
            .build()
            .err()
            .unwrap();

        assert_eq!(errors.errors.len(), 4);
        assert!(errors.contains(&BuildError::UnknownEffect {
            effect: "missing_effect".into(),
            from: "Idle".into(),
            trigger: "SUBMIT".into(),
        }));
        assert!(errors.contains(&BuildError::MissingInvocation {
            state: "Loading".into(),
            trigger: "done".into(),
        }));
        assert!(errors.contains(&BuildError::UnknownEvent {
            event: "ARCHIVE".into(),
            from: "Success".into(),
        }));
        assert!(errors.contains(&BuildError::MissingReadiness {
            state: "Waiting".into(),
            trigger: "timeout".into(),
        }));
    }

    #[test]
    fn builder_rejects_second_invocation_for_a_state() {
        let errors = Builder::new("double")
            .initial(MutationState::Idle)
            .transition(submit())
            .invoke(MutationState::Loading, |_| async { Ok(Value::Null) })
            .invoke(MutationState::Loading, |_| async { Ok(Value::Null) })
            .build()
            .err()
            .unwrap();

        assert_eq!(
            errors.errors,
            vec![BuildError::DuplicateInvocation { state: "Loading".into() }]
        );
    }

    #[test]
    fn fluent_api_builds_definition() {
        let definition = Builder::new("referral_send")
            .initial(MutationState::Idle)
            .effect("noop", |_| {})
            .transition(submit())
            .transition(
                TransitionBuilder::new()
                    .from(MutationState::Loading)
                    .on_done()
                    .to(MutationState::Waiting)
                    .effect("noop"),
            )
            .transition(
                TransitionBuilder::new()
                    .from(MutationState::Waiting)
                    .on_ready()
                    .to(MutationState::Success),
            )
            .invoke(MutationState::Loading, |_| async { Ok(Value::Null) })
            .await_ready(MutationState::Waiting, Readiness::signal(ReadySignal::new()))
            .build()
            .unwrap();

        assert_eq!(definition.name(), "referral_send");
        assert_eq!(definition.initial(), &MutationState::Idle);
        assert_eq!(definition.transitions().len(), 3);
        assert!(definition.invokes_in(&MutationState::Loading));
        assert!(definition.waits_in(&MutationState::Waiting));
        assert!(definition.accepts(&MutationState::Idle, "SUBMIT"));
        assert!(!definition.accepts(&MutationState::Loading, "SUBMIT"));
    }
}
