//! Builder API for machine definitions.
//!
//! This module provides fluent builders and macros for declaring mutation
//! machines with minimal boilerplate. Definitions are validated as a whole
//! when built.

pub mod error;
pub mod machine;
pub mod macros;
pub mod transition;

pub use error::{BuildError, BuildErrors};
pub use machine::MachineBuilder;
pub use transition::{TransitionBuilder, TransitionSpec};

use crate::core::State;

/// Transition on a user event with no guard, reducer or effects.
///
/// # Example
///
/// ```
/// use caseflow::builder::on_event;
/// use caseflow::mutation::{MutationEvent, MutationState};
///
/// let submit =
///     on_event::<_, MutationEvent<()>, ()>(MutationState::Idle, "SUBMIT", MutationState::Loading);
/// ```
pub fn on_event<S: State, E, C>(from: S, event: &str, to: S) -> TransitionBuilder<S, E, C> {
    TransitionBuilder::new().from(from).on(event).to(to)
}

/// Transition on a user event that only fires while `guard` holds.
pub fn guarded_event<S, E, C, F>(
    from: S,
    event: &str,
    to: S,
    guard: F,
) -> TransitionBuilder<S, E, C>
where
    S: State,
    F: Fn(&C) -> bool + Send + Sync + 'static,
{
    on_event(from, event, to).when(guard)
}
