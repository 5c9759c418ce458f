//! Request description handed to [`HttpClient`](super::HttpClient).

use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Progress callback receiving whole percentages.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A file attached to a multipart request.
#[derive(Clone, Debug, PartialEq)]
pub struct FilePart {
    pub file_name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl FilePart {
    pub fn new(
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Ordered `(field, value)` pairs.
    Multipart(Vec<(String, FormValue)>),
}

impl RequestBody {
    /// Total size of the file parts, the denominator for upload progress.
    pub fn upload_size(&self) -> u64 {
        match self {
            RequestBody::Multipart(fields) => fields
                .iter()
                .map(|(_, value)| match value {
                    FormValue::File(file) => file.len(),
                    FormValue::Text(_) => 0,
                })
                .sum(),
            _ => 0,
        }
    }
}

/// One network call: method, path relative to the API base, and body.
#[derive(Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub(crate) progress: Option<ProgressFn>,
    pub(crate) abort: Option<CancellationToken>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            progress: None,
            abort: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Append a text field, switching the body to multipart.
    pub fn text(self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.field(field.into(), FormValue::Text(value.into()))
    }

    /// Append a file field, switching the body to multipart.
    pub fn file(self, field: impl Into<String>, file: FilePart) -> Self {
        self.field(field.into(), FormValue::File(file))
    }

    fn field(mut self, field: String, value: FormValue) -> Self {
        match &mut self.body {
            RequestBody::Multipart(fields) => fields.push((field, value)),
            _ => self.body = RequestBody::Multipart(vec![(field, value)]),
        }
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Resolve with [`HttpErrorKind::Aborted`](super::HttpErrorKind::Aborted)
    /// once `token` is cancelled.
    pub fn abort_on(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .field("progress", &self.progress.is_some())
            .field("abort", &self.abort.is_some())
            .finish()
    }
}
