//! Shared context values: one fetch, many readers.
//!
//! A [`Provider`] loads a value once when mounted and publishes it as an
//! `Arc<T>` on a watch channel, so every consumer observes the same object.
//! Consumers get a [`ProviderHandle`] to read, refetch or replace it.
//! Dropping the provider stops it.

pub mod models;

pub use models::{MembershipRole, Referral, ReferralState, UnitMembership, User};

use crate::http::{HttpClient, HttpError, HttpRequest};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub type ProviderFetch<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, HttpError>> + Send + Sync>;

#[derive(Debug)]
pub enum ProviderState<T> {
    Loading,
    Ready(Arc<T>),
    Failed(Arc<HttpError>),
}

impl<T> ProviderState<T> {
    pub fn value(&self) -> Option<&Arc<T>> {
        match self {
            ProviderState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> Clone for ProviderState<T> {
    fn clone(&self) -> Self {
        match self {
            ProviderState::Loading => ProviderState::Loading,
            ProviderState::Ready(value) => ProviderState::Ready(Arc::clone(value)),
            ProviderState::Failed(error) => ProviderState::Failed(Arc::clone(error)),
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Fetch(Arc<HttpError>),

    #[error("provider '{0}' is unmounted")]
    Unmounted(String),

    #[error("provider '{0}' was updated while the fetch was in flight")]
    Superseded(String),
}

struct Inner<T> {
    name: String,
    fetch: ProviderFetch<T>,
    state: watch::Sender<ProviderState<T>>,
    latest: AtomicU64,
    shutdown: CancellationToken,
}

impl<T> Inner<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    async fn load(&self) -> Result<Arc<T>, ProviderError> {
        if self.shutdown.is_cancelled() {
            return Err(ProviderError::Unmounted(self.name.clone()));
        }
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                return Err(ProviderError::Unmounted(self.name.clone()));
            }
            fetched = (self.fetch)() => fetched,
        };
        if self.latest.load(Ordering::SeqCst) != seq {
            trace!(provider = %self.name, seq, "provider.superseded");
            return self
                .state
                .borrow()
                .value()
                .cloned()
                .ok_or_else(|| ProviderError::Superseded(self.name.clone()));
        }

        match fetched {
            Ok(value) => {
                let mut published = None;
                self.state.send_if_modified(|state| {
                    if let ProviderState::Ready(current) = state {
                        if **current == value {
                            published = Some(Arc::clone(current));
                            return false;
                        }
                    }
                    let value = Arc::new(value);
                    published = Some(Arc::clone(&value));
                    *state = ProviderState::Ready(value);
                    true
                });
                debug!(provider = %self.name, "provider.loaded");
                published.ok_or_else(|| ProviderError::Superseded(self.name.clone()))
            }
            Err(error) => {
                let error = Arc::new(error);
                // A failed refetch keeps serving the value already loaded.
                self.state.send_if_modified(|state| match state {
                    ProviderState::Ready(_) => false,
                    _ => {
                        *state = ProviderState::Failed(Arc::clone(&error));
                        true
                    }
                });
                debug!(provider = %self.name, error = %error, "provider.failed");
                Err(ProviderError::Fetch(error))
            }
        }
    }
}

/// Owner of a shared value. Dropping it unmounts.
pub struct Provider<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    handle: ProviderHandle<T>,
}

/// What consumers under a provider are given.
pub struct ProviderHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ProviderHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ProviderHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl<T> Provider<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    /// Start loading. Must be called inside a tokio runtime.
    pub fn mount(name: impl Into<String>, fetch: ProviderFetch<T>) -> Self {
        let (state, _) = watch::channel(ProviderState::Loading);
        let inner = Arc::new(Inner {
            name: name.into(),
            fetch,
            state,
            latest: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        });

        let initial = Arc::clone(&inner);
        tokio::spawn(async move {
            let _ = initial.load().await;
        });

        Self {
            handle: ProviderHandle { inner },
        }
    }

    pub fn handle(&self) -> ProviderHandle<T> {
        self.handle.clone()
    }

    /// Stop the provider. In-flight fetches are dropped unpublished.
    pub fn unmount(&self) {
        if !self.handle.inner.shutdown.is_cancelled() {
            self.handle.inner.shutdown.cancel();
            debug!(provider = %self.handle.inner.name, "provider.unmounted");
        }
    }
}

impl<T> std::ops::Deref for Provider<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    type Target = ProviderHandle<T>;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<T> Drop for Provider<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.unmount();
    }
}

impl<T> ProviderHandle<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn value(&self) -> Option<Arc<T>> {
        self.inner.state.borrow().value().cloned()
    }

    pub fn state(&self) -> ProviderState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProviderState<T>> {
        self.inner.state.subscribe()
    }

    /// Fetch again. An equal value leaves the published `Arc` in place and
    /// notifies nobody.
    pub async fn refetch(&self) -> Result<Arc<T>, ProviderError> {
        self.inner.load().await
    }

    /// Replace the value locally; any fetch in flight is discarded.
    pub fn set_value(&self, value: T) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.latest.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_replace(ProviderState::Ready(Arc::new(value)));
    }

    /// Wait for the first loaded value. `None` if loading failed or the
    /// provider was unmounted.
    pub async fn ready(&self) -> Option<Arc<T>> {
        let mut rx = self.subscribe();
        tokio::select! {
            biased;
            _ = self.inner.shutdown.cancelled() => None,
            state = rx.wait_for(|state| !matches!(state, ProviderState::Loading)) => {
                state.ok().and_then(|state| state.value().cloned())
            }
        }
    }

    pub fn is_mounted(&self) -> bool {
        !self.inner.shutdown.is_cancelled()
    }
}

/// The signed-in user.
pub fn current_user(http: HttpClient) -> Provider<User> {
    Provider::mount(
        "current_user",
        Arc::new(move || -> BoxFuture<'static, Result<User, HttpError>> {
            let http = http.clone();
            Box::pin(async move { http.perform::<User>(HttpRequest::get("users/whoami/")).await })
        }),
    )
}

/// The referral a page is about.
pub fn current_referral(http: HttpClient, id: i64) -> Provider<Referral> {
    Provider::mount(
        format!("referral:{id}"),
        Arc::new(move || -> BoxFuture<'static, Result<Referral, HttpError>> {
            let http = http.clone();
            let request = HttpRequest::get(format!("referrals/{id}/"));
            Box::pin(async move { http.perform::<Referral>(request).await })
        }),
    )
}
