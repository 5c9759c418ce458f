//! Readiness gates: hold a machine in a waiting state until a view that
//! another component renders is usable.
//!
//! Two sources are supported:
//!
//! - [`Readiness::Poll`]: evaluate a predicate every `interval` until it
//!   holds or the [`PollPolicy`] budget runs out.
//! - [`Readiness::Signal`]: wait for an explicit [`ReadySignal`] fired by
//!   the component that creates the view, with an optional deadline.
//!
//! Either wait stops as soon as the owning machine is torn down or leaves the
//! waiting state.
//!
//! # Example
//!
//! ```rust
//! use caseflow::readiness::{PollPolicy, Readiness};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let form_rendered = Arc::new(AtomicBool::new(false));
//! let rendered = Arc::clone(&form_rendered);
//!
//! let readiness = Readiness::poll(
//!     move || rendered.load(Ordering::SeqCst),
//!     PollPolicy::builder()
//!         .interval(Duration::from_millis(100))
//!         .max_attempts(20)
//!         .build(),
//! );
//! ```

mod policy;
mod signal;
mod violations;

pub use policy::{PollPolicy, PollPolicyBuilder, PollProgress};
pub use signal::ReadySignal;
pub use violations::PollViolation;

use crate::error::MutationError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stillwater::validation::Validation;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Predicate polled by [`Readiness::Poll`].
pub type ReadinessPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
pub struct ReadinessPoll {
    pub predicate: ReadinessPredicate,
    pub policy: PollPolicy,
}

#[derive(Clone)]
pub enum Readiness {
    Poll(ReadinessPoll),
    Signal {
        signal: ReadySignal,
        deadline: Option<Duration>,
    },
}

impl Readiness {
    pub fn poll<F>(predicate: F, policy: PollPolicy) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Readiness::Poll(ReadinessPoll {
            predicate: Arc::new(predicate),
            policy,
        })
    }

    pub fn signal(signal: ReadySignal) -> Self {
        Readiness::Signal {
            signal,
            deadline: None,
        }
    }

    pub fn signal_with_deadline(signal: ReadySignal, deadline: Duration) -> Self {
        Readiness::Signal {
            signal,
            deadline: Some(deadline),
        }
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Poll(poll) => f.debug_struct("Poll").field("policy", &poll.policy).finish(),
            Readiness::Signal { deadline, .. } => {
                f.debug_struct("Signal").field("deadline", deadline).finish()
            }
        }
    }
}

/// How a readiness wait ended.
#[derive(Debug)]
pub enum ReadinessOutcome {
    Ready { attempts: usize },
    Expired(MutationError),
}

/// Wait on `readiness`.
///
/// Returns `None` when `shutdown` fires or `still_waiting` reports the
/// caller has moved on; nothing is evaluated after that point.
pub async fn wait_until_ready<F>(
    readiness: &Readiness,
    shutdown: &CancellationToken,
    still_waiting: F,
) -> Option<ReadinessOutcome>
where
    F: Fn() -> bool,
{
    match readiness {
        Readiness::Poll(poll) => poll_until_ready(poll, shutdown, still_waiting).await,
        Readiness::Signal { signal, deadline } => {
            let started_at = Instant::now();
            let opened = async {
                match deadline {
                    Some(deadline) => tokio::time::timeout(*deadline, signal.wait()).await.is_ok(),
                    None => {
                        signal.wait().await;
                        true
                    }
                }
            };
            let opened = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                opened = opened => opened,
            };
            if !still_waiting() {
                return None;
            }
            if opened {
                return Some(ReadinessOutcome::Ready { attempts: 1 });
            }
            let violations = deadline
                .map(|deadline| {
                    vec![PollViolation::DeadlineExceeded {
                        deadline,
                        elapsed: started_at.elapsed(),
                    }]
                })
                .unwrap_or_default();
            Some(ReadinessOutcome::Expired(MutationError::PollTimeout {
                attempts: 0,
                violations,
            }))
        }
    }
}

async fn poll_until_ready<F>(
    poll: &ReadinessPoll,
    shutdown: &CancellationToken,
    still_waiting: F,
) -> Option<ReadinessOutcome>
where
    F: Fn() -> bool,
{
    let started_at = Instant::now();
    let interval = poll.policy.interval();
    let mut attempts = 0;

    loop {
        // The budget is checked against the tick about to be taken, so no
        // evaluation ever happens past a bound.
        let next = PollProgress {
            attempts: attempts + 1,
            elapsed: started_at.elapsed() + interval,
        };
        if let Validation::Failure(violations) = poll.policy.enforce(&next) {
            let out_of_attempts = violations
                .iter()
                .any(|v| matches!(v, PollViolation::MaxAttemptsExceeded { .. }));
            if let (false, Some(deadline)) = (out_of_attempts, poll.policy.deadline()) {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return None,
                    _ = tokio::time::sleep_until(started_at + deadline) => {}
                }
                if !still_waiting() {
                    return None;
                }
            }
            let elapsed = started_at.elapsed();
            let violations = violations
                .iter()
                .map(|violation| match violation {
                    PollViolation::DeadlineExceeded { deadline, .. } => {
                        PollViolation::DeadlineExceeded {
                            deadline: *deadline,
                            elapsed,
                        }
                    }
                    other => other.clone(),
                })
                .collect();
            tracing::debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "readiness.expired");
            return Some(ReadinessOutcome::Expired(MutationError::PollTimeout {
                attempts,
                violations,
            }));
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return None,
            _ = tokio::time::sleep(interval) => {}
        }
        if !still_waiting() {
            return None;
        }

        attempts += 1;
        if (poll.predicate)() {
            return Some(ReadinessOutcome::Ready { attempts });
        }
    }
}
