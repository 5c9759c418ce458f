//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use caseflow::cache::{CacheKey, QueryFn};
use caseflow::config::ClientConfig;
use caseflow::env::{ClientEnv, FailureReport, Navigator, Telemetry};
use caseflow::http::{
    ByteProgress, HttpError, PreparedRequest, RawResponse, Transport, TransportError,
};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use url::Url;

pub const API_BASE: &str = "https://cases.example/api/";
pub const TOKEN: &str = "t0ken";

/// How the mock answers one request.
pub enum Reply {
    Json(u16, Value),
    Text(u16, &'static str),
    Fail(&'static str),
    /// Hold the reply until the gate is notified.
    Gated(Arc<Notify>, Box<Reply>),
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Json(200, body)
    }

    pub fn gated(gate: &Arc<Notify>, reply: Reply) -> Self {
        Reply::Gated(Arc::clone(gate), Box::new(reply))
    }
}

/// Transport that answers from a script and records what it was sent.
///
/// Multipart bodies report byte progress in `chunk`-sized steps, yielding
/// between steps like a real socket would.
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<PreparedRequest>>,
    chunk: u64,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            chunk: 1024 * 1024,
        })
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: PreparedRequest,
        progress: Option<ByteProgress>,
    ) -> Result<RawResponse, TransportError> {
        let total = request.body.upload_size();
        self.requests.lock().push(request);
        let next = self.replies.lock().pop_front();
        let mut reply = next.unwrap_or_else(|| Reply::ok(json!({})));

        if let Some(progress) = progress {
            let mut sent = 0;
            while sent < total {
                sent = (sent + self.chunk).min(total);
                progress(sent, total);
                tokio::task::yield_now().await;
            }
        }

        loop {
            match reply {
                Reply::Gated(gate, inner) => {
                    gate.notified().await;
                    reply = *inner;
                }
                Reply::Json(status, body) => {
                    return Ok(RawResponse {
                        status,
                        body: Bytes::from(body.to_string()),
                    })
                }
                Reply::Text(status, body) => {
                    return Ok(RawResponse {
                        status,
                        body: Bytes::from_static(body.as_bytes()),
                    })
                }
                Reply::Fail(message) => return Err(TransportError(message.to_string())),
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn push(&self, path: &str) {
        self.paths.lock().push(path.to_string());
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    reports: Mutex<Vec<FailureReport>>,
}

impl RecordingTelemetry {
    pub fn reports(&self) -> Vec<FailureReport> {
        self.reports.lock().clone()
    }
}

impl Telemetry for RecordingTelemetry {
    fn capture_exception(&self, report: FailureReport) {
        self.reports.lock().push(report);
    }
}

pub struct Harness {
    pub env: ClientEnv,
    pub transport: Arc<MockTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub telemetry: Arc<RecordingTelemetry>,
}

pub fn config() -> ClientConfig {
    ClientConfig::new(Url::parse(API_BASE).unwrap())
        .unwrap()
        .with_token(TOKEN)
}

pub fn harness() -> Harness {
    let transport = MockTransport::new();
    let navigator = Arc::new(RecordingNavigator::default());
    let telemetry = Arc::new(RecordingTelemetry::default());
    let env = ClientEnv::new(
        config(),
        transport.clone(),
        navigator.clone(),
        telemetry.clone(),
    );
    Harness {
        env,
        transport,
        navigator,
        telemetry,
    }
}

/// Fetcher that counts calls and returns `value` every time.
pub fn counting_fetcher(value: Value) -> (QueryFn, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let fetcher: QueryFn =
        Arc::new(move |_key: CacheKey| -> BoxFuture<'static, Result<Value, HttpError>> {
            counter.fetch_add(1, Ordering::SeqCst);
            let value = value.clone();
            Box::pin(async move { Ok(value) })
        });
    (fetcher, calls)
}

/// Let spawned tasks run until nothing is ready.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
