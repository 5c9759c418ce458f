//! HTTP action: exactly one JSON or multipart request per call.
//!
//! [`HttpClient::perform`] never panics and never returns an untyped error:
//! transport failures, non-2xx statuses, undecodable bodies and aborts all
//! come back as an [`HttpError`] naming the request.

mod client;
mod error;
mod progress;
mod request;
mod transport;

pub use client::HttpClient;
pub use error::{HttpError, HttpErrorKind, RequestSummary, TransportError};
pub use progress::ProgressTracker;
pub use request::{FilePart, FormValue, HttpRequest, ProgressFn, RequestBody};
pub use transport::{ByteProgress, PreparedRequest, RawResponse, ReqwestTransport, Transport};

pub use reqwest::Method;
