//! The imperative shell around the pure core.
//!
//! Definitions are pure tables; this module runs them: spawning invocations,
//! waiting on readiness gates, applying reducers and running effects in
//! declaration order once a transition commits.
//!
//! # Key Concepts
//!
//! - **Transitions**: a `(state, trigger, guard)` row with a reducer, an
//!   optional target and named effects
//! - **Invocations**: async work started on entry to a state, settled by the
//!   `done` / `error` triggers
//! - **Effects**: fire-and-forget callbacks looked up by name in an
//!   [`EffectRegistry`]
//! - **Machine**: a running instance with a mailbox, history and snapshot feed

pub mod builtin;
mod definition;
mod machine;
mod registry;
mod transition;

pub use builtin::REPORT_FAILURE;
pub use definition::MachineDefinition;
pub use machine::{Machine, MachineSender};
pub use registry::{EffectRegistry, EffectScope, MachineInfo, SideEffect};
pub use transition::{
    EventSink, Invoke, InvokeFuture, InvokeScope, NamedEffect, Reducer, Transition,
};
