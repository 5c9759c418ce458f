//! Errors produced by the HTTP action.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Method and URL of the request that failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
}

impl RequestSummary {
    pub fn new(method: &Method, url: &Url) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
        }
    }
}

impl fmt::Display for RequestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HttpErrorKind {
    /// No response was received.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The backend answered with a non-2xx status.
    #[error("server responded {status}: {body}")]
    Server { status: u16, body: Value },

    /// A 2xx response whose body could not be decoded.
    #[error("unexpected response body: {message}")]
    Application { message: String },

    /// The caller cancelled the request.
    #[error("request aborted")]
    Aborted,
}

/// A failed HTTP action, tagged with the request it belongs to.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{request}: {kind}")]
pub struct HttpError {
    pub request: RequestSummary,
    pub kind: HttpErrorKind,
}

impl HttpError {
    pub fn transport(request: RequestSummary, message: impl Into<String>) -> Self {
        Self {
            request,
            kind: HttpErrorKind::Transport {
                message: message.into(),
            },
        }
    }

    pub fn server(request: RequestSummary, status: u16, body: Value) -> Self {
        Self {
            request,
            kind: HttpErrorKind::Server { status, body },
        }
    }

    pub fn application(request: RequestSummary, message: impl Into<String>) -> Self {
        Self {
            request,
            kind: HttpErrorKind::Application {
                message: message.into(),
            },
        }
    }

    pub fn aborted(request: RequestSummary) -> Self {
        Self {
            request,
            kind: HttpErrorKind::Aborted,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            HttpErrorKind::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.kind, HttpErrorKind::Aborted)
    }
}

/// Failure reported by a [`Transport`](super::Transport) implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}
