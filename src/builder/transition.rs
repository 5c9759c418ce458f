//! Builder for transition table rows.

use crate::builder::error::BuildError;
use crate::core::{Guard, Signal, State, Trigger};
use crate::effects::Reducer;
use std::sync::Arc;

/// A validated row whose effects are still names. The machine builder
/// resolves them against its registry.
pub struct TransitionSpec<S: State, E, C> {
    pub from: S,
    pub trigger: Trigger,
    pub target: Option<S>,
    pub guard: Option<Guard<C>>,
    pub assign: Option<Reducer<E, C>>,
    pub effects: Vec<String>,
}

/// Builder for constructing transitions with a fluent API.
pub struct TransitionBuilder<S: State, E, C> {
    from: Option<S>,
    trigger: Option<Trigger>,
    target: Option<S>,
    guard: Option<Guard<C>>,
    assign: Option<Reducer<E, C>>,
    effects: Vec<String>,
}

impl<S: State, E, C> TransitionBuilder<S, E, C> {
    pub fn new() -> Self {
        Self {
            from: None,
            trigger: None,
            target: None,
            guard: None,
            assign: None,
            effects: Vec::new(),
        }
    }

    /// Set the source state (required).
    pub fn from(mut self, state: S) -> Self {
        self.from = Some(state);
        self
    }

    /// React to the user event tagged `event`.
    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.trigger = Some(Trigger::event(event));
        self
    }

    /// React to the source state's invocation resolving.
    pub fn on_done(mut self) -> Self {
        self.trigger = Some(Trigger::Done);
        self
    }

    /// React to the source state's invocation failing.
    pub fn on_error(mut self) -> Self {
        self.trigger = Some(Trigger::Error);
        self
    }

    pub fn on_ready(mut self) -> Self {
        self.trigger = Some(Trigger::Ready);
        self
    }

    pub fn on_timeout(mut self) -> Self {
        self.trigger = Some(Trigger::Timeout);
        self
    }

    /// Set the target state. Without one the transition is internal.
    pub fn to(mut self, state: S) -> Self {
        self.target = Some(state);
        self
    }

    /// Add a guard predicate over the context (optional).
    pub fn guard(mut self, guard: Guard<C>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Add a guard using a closure (optional).
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Update the context when the transition fires.
    pub fn assign<F>(mut self, reducer: F) -> Self
    where
        F: Fn(&mut C, &Signal<E>) + Send + Sync + 'static,
    {
        self.assign = Some(Arc::new(reducer));
        self
    }

    pub fn assign_with(mut self, reducer: Reducer<E, C>) -> Self {
        self.assign = Some(reducer);
        self
    }

    /// Run the named effect after the transition commits.
    pub fn effect(mut self, name: impl Into<String>) -> Self {
        self.effects.push(name.into());
        self
    }

    pub fn effects<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.effects.extend(names.into_iter().map(Into::into));
        self
    }

    /// Build the transition.
    pub fn build(self) -> Result<TransitionSpec<S, E, C>, BuildError> {
        let from = self.from.ok_or(BuildError::MissingFromState)?;
        let trigger = self.trigger.ok_or(BuildError::MissingTrigger)?;

        if self.target.is_none() && self.assign.is_none() && self.effects.is_empty() {
            return Err(BuildError::EmptyTransition {
                from: from.name().to_string(),
                trigger: trigger.label().to_string(),
            });
        }

        Ok(TransitionSpec {
            from,
            trigger,
            target: self.target,
            guard: self.guard,
            assign: self.assign,
            effects: self.effects,
        })
    }
}

impl<S: State, E, C> Default for TransitionBuilder<S, E, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{MutationEvent, MutationState};

    type Builder = TransitionBuilder<MutationState, MutationEvent<()>, u32>;

    #[test]
    fn builder_validates_required_fields() {
        let result = Builder::new().on("SUBMIT").to(MutationState::Loading).build();
        assert!(matches!(result, Err(BuildError::MissingFromState)));

        let result = Builder::new().from(MutationState::Idle).to(MutationState::Loading).build();
        assert!(matches!(result, Err(BuildError::MissingTrigger)));
    }

    #[test]
    fn builder_rejects_transition_that_does_nothing() {
        let result = Builder::new().from(MutationState::Idle).on("UPDATE").build();

        assert!(matches!(
            result,
            Err(BuildError::EmptyTransition { ref from, ref trigger })
                if from == "Idle" && trigger == "UPDATE"
        ));
    }

    #[test]
    fn internal_transition_with_reducer_builds() {
        let spec = Builder::new()
            .from(MutationState::Loading)
            .on("PROGRESS")
            .assign(|count: &mut u32, _| *count += 1)
            .build()
            .unwrap();

        assert!(spec.target.is_none());
        assert_eq!(spec.trigger, Trigger::event("PROGRESS"));
    }

    #[test]
    fn fluent_api_keeps_effect_order() {
        let spec = Builder::new()
            .from(MutationState::Loading)
            .on_done()
            .to(MutationState::Success)
            .effect("invalidate_answers")
            .effects(["navigate_to_answer", "notify"])
            .when(|count| *count < 3)
            .build()
            .unwrap();

        assert_eq!(spec.effects, vec!["invalidate_answers", "navigate_to_answer", "notify"]);
        assert!(spec.guard.as_ref().is_some_and(|g| g.check(&2)));
        assert_eq!(spec.target, Some(MutationState::Success));
    }
}
