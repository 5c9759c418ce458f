//! Build errors for machine and transition builders.

use thiserror::Error;

/// Errors that can occur when building machine definitions and transitions.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("No transitions defined. Add at least one transition")]
    NoTransitions,

    #[error("Transition source state not specified. Call .from(state)")]
    MissingFromState,

    #[error("Transition trigger not specified. Call .on(event) or one of the .on_* outcomes")]
    MissingTrigger,

    #[error("Transition from '{from}' on '{trigger}' has no target, assign or effect")]
    EmptyTransition { from: String, trigger: String },

    #[error("Unknown effect '{effect}' in transition from '{from}' on '{trigger}'")]
    UnknownEffect {
        effect: String,
        from: String,
        trigger: String,
    },

    #[error("Unknown event '{event}' in transition from '{from}'")]
    UnknownEvent { event: String, from: String },

    #[error("State '{state}' handles '{trigger}' but invokes nothing. Call .invoke(state, ..)")]
    MissingInvocation { state: String, trigger: String },

    #[error("State '{state}' handles '{trigger}' but has no readiness gate")]
    MissingReadiness { state: String, trigger: String },

    #[error("State '{state}' has more than one invocation")]
    DuplicateInvocation { state: String },
}

/// Every problem found while building one definition.
#[derive(Debug, Error)]
#[error("machine '{machine}' has {} definition error(s)", .errors.len())]
pub struct BuildErrors {
    pub machine: String,
    pub errors: Vec<BuildError>,
}

impl BuildErrors {
    pub fn contains(&self, error: &BuildError) -> bool {
        self.errors.contains(error)
    }
}
