//! Collaborators a machine reaches through its environment.
//!
//! Effects and invocations only see the capabilities they ask for
//! (`Env: HasCache + HasTelemetry`, ...), so tests can supply a mock
//! environment without touching global state.

use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::error::MutationError;
use crate::http::{HttpClient, ReqwestTransport, Transport};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Router collaborator. Only called from success-path effects.
pub trait Navigator: Send + Sync {
    fn push(&self, path: &str);
}

/// Error collector. Fire-and-forget: must not block.
pub trait Telemetry: Send + Sync {
    fn capture_exception(&self, report: FailureReport);
}

/// A failed attempt, with enough context to find the request that caused it.
#[derive(Clone, Debug)]
pub struct FailureReport {
    pub machine: String,
    pub instance: Uuid,
    pub state: String,
    pub attempt: u64,
    pub error: Arc<MutationError>,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) attempt {} failed in {}: {}",
            self.machine, self.instance, self.attempt, self.state, self.error
        )
    }
}

/// Telemetry that writes failures to the `tracing` pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn capture_exception(&self, report: FailureReport) {
        tracing::error!(
            machine = %report.machine,
            instance = %report.instance,
            state = %report.state,
            attempt = report.attempt,
            error = %report.error,
            "mutation.failed"
        );
    }
}

pub trait HasCache {
    fn cache(&self) -> &QueryCache;
}

pub trait HasHttp {
    fn http(&self) -> &HttpClient;
}

pub trait HasNavigator {
    fn navigator(&self) -> &dyn Navigator;
}

pub trait HasTelemetry {
    fn telemetry(&self) -> &dyn Telemetry;
}

/// The environment the client runs machines in.
#[derive(Clone)]
pub struct ClientEnv {
    config: Arc<ClientConfig>,
    http: HttpClient,
    cache: QueryCache,
    navigator: Arc<dyn Navigator>,
    telemetry: Arc<dyn Telemetry>,
}

impl ClientEnv {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            http: HttpClient::new(transport, Arc::clone(&config)),
            config,
            cache: QueryCache::new(),
            navigator,
            telemetry,
        }
    }

    /// Environment backed by a real `reqwest` transport.
    pub fn with_reqwest(
        config: ClientConfig,
        navigator: Arc<dyn Navigator>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let transport = ReqwestTransport::new(reqwest::Client::new(), config.upload_chunk_size);
        Self::new(config, Arc::new(transport), navigator, telemetry)
    }

    /// Share an existing cache instead of the fresh one `new` creates.
    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl HasCache for ClientEnv {
    fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

impl HasHttp for ClientEnv {
    fn http(&self) -> &HttpClient {
        &self.http
    }
}

impl HasNavigator for ClientEnv {
    fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }
}

impl HasTelemetry for ClientEnv {
    fn telemetry(&self) -> &dyn Telemetry {
        self.telemetry.as_ref()
    }
}
