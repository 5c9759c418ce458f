//! Core machine types and logic.
//!
//! This module contains the pure part of the mutation machine:
//! - State definitions via the `State` trait
//! - Events, triggers and signals
//! - Guard predicates over the machine context
//! - Transition history
//!
//! Nothing here performs I/O; the runtime lives in [`crate::effects`].

mod event;
mod guard;
mod history;
mod state;

pub use event::{Event, Signal, Trigger};
pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use state::State;
