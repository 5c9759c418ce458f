//! Polling budget, checked with `Validation` so every exceeded bound is
//! reported at once.

use super::violations::PollViolation;
use crate::config::PollSettings;
use std::time::Duration;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Where a poll stands, or would stand after its next tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PollProgress {
    pub attempts: usize,
    pub elapsed: Duration,
}

/// Tick interval plus the bounds after which a poll gives up.
#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    interval: Duration,
    max_attempts: Option<usize>,
    deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_settings(&PollSettings::default())
    }
}

impl PollPolicy {
    pub fn builder() -> PollPolicyBuilder {
        PollPolicyBuilder::new()
    }

    pub fn from_settings(settings: &PollSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.interval_ms.max(1)),
            max_attempts: settings.max_attempts,
            deadline: settings.deadline_ms.map(Duration::from_millis),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Check `progress` against every bound, accumulating all violations.
    ///
    /// The deadline is exclusive: a poll may not evaluate at or after it.
    pub fn enforce(&self, progress: &PollProgress) -> Validation<(), NonEmptyVec<PollViolation>> {
        let mut checks: Vec<Validation<(), NonEmptyVec<PollViolation>>> = Vec::new();

        if let Some(max) = self.max_attempts {
            let check = if progress.attempts > max {
                Validation::fail(PollViolation::MaxAttemptsExceeded {
                    max,
                    current: progress.attempts,
                })
            } else {
                Validation::success(())
            };
            checks.push(check);
        }

        if let Some(deadline) = self.deadline {
            let check = if progress.elapsed >= deadline {
                Validation::fail(PollViolation::DeadlineExceeded {
                    deadline,
                    elapsed: progress.elapsed,
                })
            } else {
                Validation::success(())
            };
            checks.push(check);
        }

        Validation::all_vec(checks).map(|_| ())
    }
}

pub struct PollPolicyBuilder {
    interval: Duration,
    max_attempts: Option<usize>,
    deadline: Option<Duration>,
}

impl PollPolicyBuilder {
    pub fn new() -> Self {
        let defaults = PollPolicy::default();
        Self {
            interval: defaults.interval,
            max_attempts: defaults.max_attempts,
            deadline: defaults.deadline,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Cap the number of predicate evaluations. `0` expires without
    /// evaluating at all.
    pub fn max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = Some(n);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Remove the attempt cap. Combine with a deadline, or the poll relies
    /// solely on teardown to stop.
    pub fn unlimited_attempts(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    pub fn build(self) -> PollPolicy {
        PollPolicy {
            interval: self.interval,
            max_attempts: self.max_attempts,
            deadline: self.deadline,
        }
    }
}

impl Default for PollPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
