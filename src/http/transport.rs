//! Transport abstraction and its reqwest implementation.

use super::error::TransportError;
use super::request::{FormValue, RequestBody};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// Byte-level progress: `(sent, total)`.
pub type ByteProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A request with its URL resolved and headers attached.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Performs one network round trip.
///
/// Implementations report upload progress through `progress` when the body
/// is multipart; they never interpret the status code.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: PreparedRequest,
        progress: Option<ByteProgress>,
    ) -> Result<RawResponse, TransportError>;
}

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    chunk_size: usize,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
        }
    }

    fn form(
        &self,
        fields: Vec<(String, FormValue)>,
        total: u64,
        progress: Option<ByteProgress>,
    ) -> Result<Form, TransportError> {
        let sent = Arc::new(AtomicU64::new(0));

        let mut form = Form::new();
        for (name, value) in fields {
            form = match value {
                FormValue::Text(text) => form.text(name, text),
                FormValue::File(file) => {
                    let length = file.len();
                    let chunks = chunk(&file.bytes, self.chunk_size);
                    let sent = Arc::clone(&sent);
                    let progress = progress.clone();
                    // Bytes are counted as reqwest pulls each chunk off the stream.
                    let stream = futures::stream::iter(chunks.into_iter().map(move |piece| {
                        let so_far = sent.fetch_add(piece.len() as u64, Ordering::Relaxed)
                            + piece.len() as u64;
                        if let Some(progress) = &progress {
                            progress(so_far, total);
                        }
                        Ok::<Bytes, std::io::Error>(piece)
                    }));
                    let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), length)
                        .file_name(file.file_name)
                        .mime_str(&file.mime)?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: PreparedRequest,
        progress: Option<ByteProgress>,
    ) -> Result<RawResponse, TransportError> {
        let mut builder = self.client.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let total = request.body.upload_size();
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_vec(&value).map_err(|err| {
                TransportError(format!("failed to encode request body: {err}"))
            })?),
            RequestBody::Multipart(fields) => {
                builder.multipart(self.form(fields, total, progress)?)
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(RawResponse { status, body })
    }
}

fn chunk(bytes: &Bytes, size: usize) -> Vec<Bytes> {
    (0..bytes.len())
        .step_by(size)
        .map(|start| bytes.slice(start..(start + size).min(bytes.len())))
        .collect()
}
