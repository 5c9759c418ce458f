//! The canonical mutation machine.
//!
//! Almost every form in the client follows the same shape: collect input,
//! submit once, show progress, then either succeed (run success effects,
//! possibly after waiting on a view) or fail (keep the input, report the
//! error, allow a resubmit). [`define`] builds that table from a handful of
//! [`MutationOptions`].
//!
//! ```text
//! Idle    --SUBMIT--> Loading
//! Loading --done-->   Success   (Waiting when a readiness gate is set)
//! Loading --error-->  Failure
//! Failure --SUBMIT--> Loading
//! Success --SUBMIT--> Loading   (repeatable only)
//! Waiting --ready-->  Success
//! Waiting --timeout-> TimedOut
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use caseflow::cache::keys;
//! use caseflow::effects::{builtin, EffectRegistry, REPORT_FAILURE};
//! use caseflow::env::ClientEnv;
//! use caseflow::http::HttpRequest;
//! use caseflow::mutation::{self, MutationOptions};
//! use serde_json::json;
//!
//! #[derive(Clone)]
//! struct Comment {
//!     referral: i64,
//!     text: String,
//! }
//!
//! let registry = EffectRegistry::<_, Comment, ClientEnv>::standard().register(
//!     "invalidate_messages",
//!     |scope| {
//!         use caseflow::env::HasCache;
//!         scope.env.cache().invalidate(&keys::referral_messages(scope.context.referral));
//!     },
//! );
//!
//! let definition = mutation::define::<String, _, _>(
//!     "referral_message",
//!     registry,
//!     mutation::http_invoke(|c: &Comment| {
//!         HttpRequest::post("referralmessages/")
//!             .json(json!({"referral": c.referral, "content": c.text}))
//!     }),
//!     MutationOptions::new()
//!         .repeatable()
//!         .on_success(["invalidate_messages"])
//!         .update(|c: &mut Comment, text: &String| c.text = text.clone()),
//! )
//! .unwrap();
//! ```

use crate::builder::{BuildErrors, MachineBuilder, TransitionBuilder};
use crate::core::{Event, Guard, Signal};
use crate::effects::{
    EffectRegistry, Invoke, InvokeFuture, InvokeScope, MachineDefinition, REPORT_FAILURE,
};
use crate::env::HasHttp;
use crate::error::MutationError;
use crate::http::HttpRequest;
use crate::readiness::Readiness;
use std::fmt::Debug;
use std::sync::Arc;

pub const SUBMIT: &str = "SUBMIT";
pub const UPDATE: &str = "UPDATE";
pub const PROGRESS: &str = "PROGRESS";

crate::state_enum! {
    /// Where a mutation currently is.
    pub enum MutationState {
        Idle,
        Loading,
        /// The call succeeded; waiting for the view it produced.
        Waiting,
        Success,
        Failure,
        TimedOut,
    }
    final: [Success, TimedOut]
    error: [Failure, TimedOut]
}

/// Events a mutation form sends. `U` is the form's field patch.
#[derive(Clone, Debug)]
pub enum MutationEvent<U> {
    Submit,
    Update(U),
    /// Upload progress, 0..=100.
    Progress(u8),
}

impl<U> Event for MutationEvent<U>
where
    U: Clone + Debug + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        match self {
            Self::Submit => SUBMIT,
            Self::Update(_) => UPDATE,
            Self::Progress(_) => PROGRESS,
        }
    }

    fn names() -> &'static [&'static str] {
        &[SUBMIT, UPDATE, PROGRESS]
    }
}

type Patch<C, U> = Arc<dyn Fn(&mut C, &U) + Send + Sync>;
type Percent<C> = Arc<dyn Fn(&mut C, u8) + Send + Sync>;

/// Knobs for [`define`].
pub struct MutationOptions<C, U> {
    repeatable: bool,
    on_success: Vec<String>,
    on_failure: Vec<String>,
    on_ready: Vec<String>,
    readiness: Option<Readiness>,
    update: Option<Patch<C, U>>,
    progress: Option<Percent<C>>,
    submit_guard: Option<Guard<C>>,
}

impl<C, U> MutationOptions<C, U> {
    /// Single-shot mutation that reports failures.
    pub fn new() -> Self {
        Self {
            repeatable: false,
            on_success: Vec::new(),
            on_failure: vec![REPORT_FAILURE.to_string()],
            on_ready: Vec::new(),
            readiness: None,
            update: None,
            progress: None,
            submit_guard: None,
        }
    }

    /// Allow `SUBMIT` again after success.
    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn on_success<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.on_success = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the failure effects (default: `report_failure`).
    pub fn on_failure<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.on_failure = names.into_iter().map(Into::into).collect();
        self
    }

    /// Effects run once the readiness gate opens.
    pub fn on_ready<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.on_ready = names.into_iter().map(Into::into).collect();
        self
    }

    /// Wait in `Waiting` after the call succeeds.
    pub fn wait_for(mut self, readiness: Readiness) -> Self {
        self.readiness = Some(readiness);
        self
    }

    /// Apply `UPDATE` patches to the context, in any state.
    pub fn update<F>(mut self, patch: F) -> Self
    where
        F: Fn(&mut C, &U) + Send + Sync + 'static,
    {
        self.update = Some(Arc::new(patch));
        self
    }

    /// Record `PROGRESS` events while loading.
    pub fn track_progress<F>(mut self, record: F) -> Self
    where
        F: Fn(&mut C, u8) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(record));
        self
    }

    /// Ignore `SUBMIT` unless `guard` holds.
    pub fn submit_when<F>(mut self, guard: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.submit_guard = Some(Guard::new(guard));
        self
    }
}

impl<C, U> Default for MutationOptions<C, U> {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the canonical mutation table around `invoke`.
pub fn define<U, C, Env>(
    name: &str,
    registry: EffectRegistry<MutationEvent<U>, C, Env>,
    invoke: Invoke<MutationEvent<U>, C, Env>,
    options: MutationOptions<C, U>,
) -> Result<Arc<MachineDefinition<MutationState, MutationEvent<U>, C, Env>>, BuildErrors>
where
    U: Clone + Debug + Send + Sync + 'static,
    C: Send + Sync + 'static,
    Env: Send + Sync + 'static,
{
    use MutationState::*;

    let MutationOptions {
        repeatable,
        on_success,
        on_failure,
        on_ready,
        readiness,
        update,
        progress,
        submit_guard,
    } = options;

    let submit = |from: MutationState| {
        let builder = TransitionBuilder::new().from(from).on(SUBMIT).to(Loading);
        match &submit_guard {
            Some(guard) => builder.guard(guard.clone()),
            None => builder,
        }
    };

    let mut builder = MachineBuilder::new(name)
        .initial(Idle)
        .registry(registry)
        .transition(submit(Idle))
        .transition(submit(Failure));
    if repeatable {
        builder = builder.transition(submit(Success));
    }

    let settled = if readiness.is_some() { Waiting } else { Success };
    builder = builder
        .transition(
            TransitionBuilder::new()
                .from(Loading)
                .on_done()
                .to(settled)
                .effects(on_success),
        )
        .transition(
            TransitionBuilder::new()
                .from(Loading)
                .on_error()
                .to(Failure)
                .effects(on_failure.clone()),
        )
        .invoke_with(Loading, invoke);

    if let Some(readiness) = readiness {
        builder = builder
            .await_ready(Waiting, readiness)
            .transition(
                TransitionBuilder::new()
                    .from(Waiting)
                    .on_ready()
                    .to(Success)
                    .effects(on_ready),
            )
            .transition(
                TransitionBuilder::new()
                    .from(Waiting)
                    .on_timeout()
                    .to(TimedOut)
                    .effects(on_failure),
            );
    }

    if let Some(update) = update {
        for state in MutationState::ALL.iter().cloned() {
            let patch = Arc::clone(&update);
            builder = builder.transition(TransitionBuilder::new().from(state).on(UPDATE).assign(
                move |context: &mut C, signal: &Signal<MutationEvent<U>>| {
                    if let Some(MutationEvent::Update(fields)) = signal.event() {
                        patch(context, fields);
                    }
                },
            ));
        }
    }

    if let Some(progress) = progress {
        builder = builder.transition(TransitionBuilder::new().from(Loading).on(PROGRESS).assign(
            move |context: &mut C, signal: &Signal<MutationEvent<U>>| {
                if let Some(MutationEvent::Progress(percent)) = signal.event() {
                    progress(context, *percent);
                }
            },
        ));
    }

    builder.build()
}

/// Invocation that performs the request built from the context.
pub fn http_invoke<U, C, Env, F>(request: F) -> Invoke<MutationEvent<U>, C, Env>
where
    U: Send + 'static,
    C: Send + 'static,
    Env: HasHttp + Send + 'static,
    F: Fn(&C) -> HttpRequest + Send + Sync + 'static,
{
    Arc::new(move |scope: InvokeScope<MutationEvent<U>, C, Env>| -> InvokeFuture {
        let request = request(&scope.context).abort_on(scope.abort.clone());
        let http = scope.env.http().clone();
        Box::pin(async move { http.perform_value(request).await.map_err(MutationError::from) })
    })
}

/// Like [`http_invoke`], reporting upload progress as
/// [`MutationEvent::Progress`].
pub fn upload_invoke<U, C, Env, F>(request: F) -> Invoke<MutationEvent<U>, C, Env>
where
    U: Send + 'static,
    C: Send + 'static,
    Env: HasHttp + Send + 'static,
    F: Fn(&C) -> HttpRequest + Send + Sync + 'static,
{
    Arc::new(move |scope: InvokeScope<MutationEvent<U>, C, Env>| -> InvokeFuture {
        let events = scope.events.clone();
        let request = request(&scope.context)
            .abort_on(scope.abort.clone())
            .on_progress(move |percent| {
                events.send(MutationEvent::Progress(percent));
            });
        let http = scope.env.http().clone();
        Box::pin(async move { http.perform_value(request).await.map_err(MutationError::from) })
    })
}
