//! Failure taxonomy for mutations.

use crate::http::{HttpError, HttpErrorKind};
use crate::readiness::PollViolation;
use thiserror::Error;

/// Why a mutation ended in a failure state.
#[derive(Debug, Error)]
pub enum MutationError {
    /// The HTTP action failed (no response, non-2xx, undecodable body, aborted).
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The request succeeded but the response is semantically unusable,
    /// e.g. a field the caller relies on is missing.
    #[error("invalid response: {0}")]
    Application(String),

    /// The readiness gate never opened.
    #[error("readiness gate expired after {attempts} attempt(s): {}", describe(.violations))]
    PollTimeout {
        attempts: usize,
        violations: Vec<PollViolation>,
    },
}

/// Coarse classification used by the view to pick an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Server,
    Application,
    Aborted,
    PollTimeout,
}

impl MutationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MutationError::Http(err) => match &err.kind {
                HttpErrorKind::Transport { .. } => ErrorKind::Transport,
                HttpErrorKind::Server { .. } => ErrorKind::Server,
                HttpErrorKind::Application { .. } => ErrorKind::Application,
                HttpErrorKind::Aborted => ErrorKind::Aborted,
            },
            MutationError::Application(_) => ErrorKind::Application,
            MutationError::PollTimeout { .. } => ErrorKind::PollTimeout,
        }
    }

    /// HTTP status of a server error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            MutationError::Http(err) => err.status(),
            _ => None,
        }
    }
}

fn describe(violations: &[PollViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
