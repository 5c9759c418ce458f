//! The HTTP action: one request in, one typed result out.

use super::error::{HttpError, RequestSummary};
use super::progress::ProgressTracker;
use super::request::{HttpRequest, RequestBody};
use super::transport::{ByteProgress, PreparedRequest, Transport};
use crate::config::ClientConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{trace, warn};

/// Performs requests against the configured backend.
///
/// Cheap to clone. Never touches the query cache; that is the machine's job.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl HttpClient {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform `request` and decode the response body into `T`.
    pub async fn perform<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, HttpError> {
        let summary = self.summary(&request);
        let value = self.perform_value(request).await?;
        serde_json::from_value(value)
            .map_err(|err| HttpError::application(summary, err.to_string()))
    }

    /// Perform `request` and return the raw JSON body (`null` when empty).
    pub async fn perform_value(&self, request: HttpRequest) -> Result<Value, HttpError> {
        let HttpRequest {
            method,
            path,
            body,
            progress,
            abort,
        } = request;

        let url = match self.config.endpoint(&path) {
            Ok(url) => url,
            Err(err) => {
                let summary = RequestSummary {
                    method: method.to_string(),
                    url: path,
                };
                return Err(HttpError::transport(summary, format!("invalid URL: {err}")));
            }
        };
        let summary = RequestSummary::new(&method, &url);

        let tracker = progress.map(|sink| Arc::new(ProgressTracker::new(sink)));
        let byte_progress = tracker.clone().map(|tracker| {
            Arc::new(move |sent: u64, total: u64| tracker.report_bytes(sent, total)) as ByteProgress
        });

        let prepared = PreparedRequest {
            headers: self.headers(&body),
            method,
            url,
            body,
        };

        trace!(request = %summary, "http.send");
        let sending = self.transport.send(prepared, byte_progress);
        let outcome = match abort {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(HttpError::aborted(summary)),
                outcome = sending => outcome,
            },
            None => sending.await,
        };

        let response = outcome.map_err(|err| HttpError::transport(summary.clone(), err.0))?;

        if !(200..300).contains(&response.status) {
            let body = serde_json::from_slice(&response.body).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&response.body).into_owned())
            });
            warn!(request = %summary, status = response.status, "http.error_status");
            return Err(HttpError::server(summary, response.status, body));
        }

        if let Some(tracker) = &tracker {
            tracker.finish();
        }

        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&response.body)
            .map_err(|err| HttpError::application(summary, format!("body is not JSON: {err}")))
    }

    fn headers(&self, body: &RequestBody) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(token) = &self.config.token {
            headers.push(("Authorization".to_string(), format!("Token {token}")));
        }
        if matches!(body, RequestBody::Json(_)) {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers
    }

    fn summary(&self, request: &HttpRequest) -> RequestSummary {
        let url = self
            .config
            .endpoint(&request.path)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| request.path.clone());
        RequestSummary {
            method: request.method.to_string(),
            url,
        }
    }
}
