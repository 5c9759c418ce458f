//! Caseflow: mutation machines for a referral case-management client
//!
//! Every user-initiated write (send a referral, submit an answer draft,
//! request a validation, upload an attachment) runs through a small state
//! machine. The machine performs the HTTP call, keeps the user's input when
//! it fails, and only runs follow-up effects (cache invalidation, navigation,
//! failure reporting) once the call has settled.
//!
//! The crate keeps the "pure core, imperative shell" split:
//!
//! - [`core`]: states, events, guards and history; no I/O
//! - [`builder`]: declarative, validated machine definitions
//! - [`effects`]: the runtime that spawns invocations and runs effects
//! - [`mutation`]: the canonical submit/load/settle table most forms use
//!
//! around which sit the collaborators the effects talk to: [`http`],
//! [`cache`], [`readiness`] gates, shared [`provider`]s and the [`env`] that
//! bundles them.
//!
//! # Example
//!
//! ```rust,no_run
//! use caseflow::config::ClientConfig;
//! use caseflow::effects::{EffectRegistry, Machine};
//! use caseflow::env::{ClientEnv, Navigator, TracingTelemetry};
//! use caseflow::http::HttpRequest;
//! use caseflow::mutation::{self, MutationEvent, MutationOptions, MutationState};
//! use std::sync::Arc;
//!
//! struct Router;
//!
//! impl Navigator for Router {
//!     fn push(&self, path: &str) {
//!         println!("navigate to {path}");
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let page = r#"{"apiBase": "https://cases.example/api/", "token": "s3cret"}"#;
//! let config = ClientConfig::from_json(page)?;
//! let env = ClientEnv::with_reqwest(config, Arc::new(Router), Arc::new(TracingTelemetry));
//!
//! let definition = mutation::define::<(), _, _>(
//!     "referral_close",
//!     EffectRegistry::standard(),
//!     mutation::http_invoke(|referral: &i64| {
//!         HttpRequest::post(format!("referrals/{referral}/close/"))
//!     }),
//!     MutationOptions::new(),
//! )?;
//!
//! let machine = Machine::start(definition, env, 42_i64);
//! machine.send(MutationEvent::Submit);
//! machine.wait_for(|s| *s != MutationState::Loading).await;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod core;
pub mod effects;
pub mod env;
pub mod error;
pub mod http;
pub mod mutation;
pub mod provider;
pub mod readiness;
pub mod snapshot;

// Re-export commonly used types
pub use builder::{BuildError, BuildErrors, MachineBuilder, TransitionBuilder};
pub use core::{Event, Guard, Signal, State, StateHistory, StateTransition, Trigger};
pub use effects::{EffectRegistry, Machine, MachineDefinition};
pub use error::{ErrorKind, MutationError};
pub use snapshot::Snapshot;
