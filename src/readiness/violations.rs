//! Ways a readiness wait can run out of budget.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PollViolation {
    #[error("Maximum attempts ({max}) exceeded (current: {current})")]
    MaxAttemptsExceeded { max: usize, current: usize },

    #[error("Deadline ({deadline:?}) exceeded (elapsed: {elapsed:?})")]
    DeadlineExceeded {
        deadline: Duration,
        elapsed: Duration,
    },
}
