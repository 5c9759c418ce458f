//! Keyed store of fetched server resources.

use super::key::CacheKey;
use crate::http::HttpError;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Loads the value for a key.
pub type QueryFn =
    Arc<dyn Fn(CacheKey) -> BoxFuture<'static, Result<Value, HttpError>> + Send + Sync>;

/// Why [`QuerySubscription::fresh`] produced no value.
#[derive(Clone, Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Fetch(Arc<HttpError>),

    #[error("query cache for {0} is gone")]
    Closed(CacheKey),
}

/// Read-only snapshot returned by [`QueryCache::get`].
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub key: CacheKey,
    pub value: Arc<Value>,
    pub stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Everything a subscriber can observe about one key.
#[derive(Clone, Debug, Default)]
pub struct QueryState {
    pub value: Option<Arc<Value>>,
    pub stale: bool,
    pub fetching: bool,
    pub error: Option<Arc<HttpError>>,
    pub updated_at: Option<DateTime<Utc>>,
}

struct Entry {
    state: watch::Sender<QueryState>,
    fetcher: Option<QueryFn>,
    subscribers: usize,
    in_flight: Option<u64>,
    latest: u64,
}

impl Entry {
    fn new() -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            state,
            fetcher: None,
            subscribers: 0,
            in_flight: None,
            latest: 0,
        }
    }

    /// Mark a new fetch as the latest one and hand back what is needed to run it.
    fn begin_fetch(&mut self) -> Option<(u64, QueryFn)> {
        let fetcher = self.fetcher.clone()?;
        self.latest += 1;
        self.in_flight = Some(self.latest);
        self.state.send_modify(|state| state.fetching = true);
        Some((self.latest, fetcher))
    }
}

/// Shared query cache.
///
/// Cheap to clone; all clones see the same entries. The only ways to change
/// what is stored are [`set`](Self::set), [`invalidate`](Self::invalidate)
/// and the fetches the cache starts itself.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<CacheKey, Entry>>>,
}

struct PendingFetch {
    key: CacheKey,
    seq: u64,
    fetcher: QueryFn,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for `key`.
    ///
    /// A stale value is still returned; if the key has a fetcher and nothing
    /// is in flight, a background refetch starts.
    pub fn get(&self, key: &CacheKey) -> Option<CachedEntry> {
        let (entry, pending) = {
            let mut entries = self.entries.lock();
            let entry = entries.get_mut(key)?;
            let state = entry.state.borrow().clone();
            let pending = if state.stale && entry.in_flight.is_none() {
                entry.begin_fetch().map(|(seq, fetcher)| PendingFetch {
                    key: key.clone(),
                    seq,
                    fetcher,
                })
            } else {
                None
            };
            let cached = state.value.map(|value| CachedEntry {
                key: key.clone(),
                value,
                stale: state.stale,
                updated_at: state.updated_at,
            });
            (cached, pending)
        };

        if let Some(pending) = pending {
            trace!(key = %pending.key, "cache.revalidate");
            self.spawn(pending);
        }
        entry
    }

    /// Everything known about `key`, without triggering a fetch.
    pub fn state(&self, key: &CacheKey) -> Option<QueryState> {
        self.entries
            .lock()
            .get(key)
            .map(|entry| entry.state.borrow().clone())
    }

    /// Store a fresh value. Supersedes any fetch in flight for the key.
    pub fn set(&self, key: CacheKey, value: Value) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.latest += 1;
        entry.in_flight = None;
        entry.state.send_modify(|state| {
            state.value = Some(Arc::new(value));
            state.stale = false;
            state.fetching = false;
            state.error = None;
            state.updated_at = Some(Utc::now());
        });
        trace!(key = %key, "cache.set");
    }

    /// Register how `key` is loaded, without subscribing to it.
    pub fn register(&self, key: CacheKey, fetcher: QueryFn) {
        let mut entries = self.entries.lock();
        entries.entry(key).or_insert_with(Entry::new).fetcher = Some(fetcher);
    }

    /// Subscribe to `key`. Starts a fetch if nothing usable is cached.
    pub fn subscribe(&self, key: CacheKey, fetcher: QueryFn) -> QuerySubscription {
        let (receiver, pending) = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
            entry.fetcher = Some(fetcher);
            entry.subscribers += 1;
            let needs_fetch = {
                let state = entry.state.borrow();
                state.value.is_none() || state.stale
            };
            let pending = if needs_fetch && entry.in_flight.is_none() {
                entry.begin_fetch().map(|(seq, fetcher)| PendingFetch {
                    key: key.clone(),
                    seq,
                    fetcher,
                })
            } else {
                None
            };
            (entry.state.subscribe(), pending)
        };

        if let Some(pending) = pending {
            self.spawn(pending);
        }
        QuerySubscription {
            cache: self.clone(),
            key,
            receiver,
        }
    }

    /// Mark every entry under `prefix` stale and refetch the subscribed ones.
    ///
    /// Keys that already have a fetch in flight are not fetched again.
    /// Returns the number of entries marked.
    pub fn invalidate(&self, prefix: &CacheKey) -> usize {
        let mut pending = Vec::new();
        let mut matched = 0;
        {
            let mut entries = self.entries.lock();
            for (key, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
                matched += 1;
                entry.state.send_modify(|state| state.stale = true);
                if entry.subscribers > 0 && entry.in_flight.is_none() {
                    if let Some((seq, fetcher)) = entry.begin_fetch() {
                        pending.push(PendingFetch {
                            key: key.clone(),
                            seq,
                            fetcher,
                        });
                    }
                }
            }
        }

        debug!(prefix = %prefix, matched, refetching = pending.len(), "cache.invalidate");
        for fetch in pending {
            self.spawn(fetch);
        }
        matched
    }

    /// Refetch `key` unless a fetch is already in flight. Returns whether one
    /// was started.
    pub fn refetch(&self, key: &CacheKey) -> bool {
        let pending = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                return false;
            };
            if entry.in_flight.is_some() {
                return false;
            }
            entry.begin_fetch()
        };
        self.start(key, pending)
    }

    /// Start a fetch even if one is in flight; the older one is discarded
    /// when it lands.
    pub fn reload(&self, key: &CacheKey) -> bool {
        let pending = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                return false;
            };
            entry.begin_fetch()
        };
        self.start(key, pending)
    }

    fn start(&self, key: &CacheKey, pending: Option<(u64, QueryFn)>) -> bool {
        match pending {
            Some((seq, fetcher)) => {
                self.spawn(PendingFetch {
                    key: key.clone(),
                    seq,
                    fetcher,
                });
                true
            }
            None => false,
        }
    }

    fn spawn(&self, fetch: PendingFetch) {
        let PendingFetch { key, seq, fetcher } = fetch;
        let cache = self.clone();
        let request = fetcher(key.clone());
        tokio::spawn(async move {
            let result = request.await;
            cache.settle(&key, seq, result);
        });
    }

    fn settle(&self, key: &CacheKey, seq: u64, result: Result<Value, HttpError>) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.latest != seq {
            trace!(key = %key, seq, latest = entry.latest, "cache.discard_superseded");
            return;
        }
        entry.in_flight = None;
        match result {
            Ok(value) => entry.state.send_modify(|state| {
                state.value = Some(Arc::new(value));
                state.stale = false;
                state.fetching = false;
                state.error = None;
                state.updated_at = Some(Utc::now());
            }),
            Err(error) => {
                debug!(key = %key, error = %error, "cache.fetch_failed");
                entry.state.send_modify(|state| {
                    state.fetching = false;
                    state.error = Some(Arc::new(error));
                });
            }
        }
    }

    fn release(&self, key: &CacheKey) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
        }
    }
}

/// Live view of one key. Dropping it unsubscribes.
pub struct QuerySubscription {
    cache: QueryCache,
    key: CacheKey,
    receiver: watch::Receiver<QueryState>,
}

impl QuerySubscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn current(&self) -> QueryState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<QueryState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait for the fetch in flight to settle.
    ///
    /// Resolves with the fresh value, or with the error the last fetch
    /// failed with. A stale value kept after a failed refetch is not fresh.
    pub async fn fresh(&mut self) -> Result<Arc<Value>, QueryError> {
        let state = self
            .receiver
            .wait_for(|state| {
                let settled = state.error.is_some() || (state.value.is_some() && !state.stale);
                !state.fetching && settled
            })
            .await
            .map_err(|_| QueryError::Closed(self.key.clone()))?;
        match (&state.error, &state.value) {
            (Some(error), _) => Err(QueryError::Fetch(Arc::clone(error))),
            (None, Some(value)) => Ok(Arc::clone(value)),
            (None, None) => Err(QueryError::Closed(self.key.clone())),
        }
    }
}

impl Drop for QuerySubscription {
    fn drop(&mut self) {
        self.cache.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys;
    use crate::http::{HttpErrorKind, Method, RequestSummary};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use url::Url;

    /// Fetcher that counts calls and blocks until `gate` is notified.
    fn gated_fetcher(calls: Arc<AtomicUsize>, gate: Arc<Notify>) -> QueryFn {
        Arc::new(move |_key: CacheKey| -> BoxFuture<'static, Result<Value, HttpError>> {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                gate.notified().await;
                Ok(json!({ "fetch": n }))
            })
        })
    }

    fn counting_fetcher(calls: Arc<AtomicUsize>) -> QueryFn {
        Arc::new(move |_key: CacheKey| -> BoxFuture<'static, Result<Value, HttpError>> {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok(json!({ "fetch": n })) })
        })
    }

    /// Fetcher that fails for the first `failures` calls, then succeeds.
    fn flaky_fetcher(calls: Arc<AtomicUsize>, failures: usize) -> QueryFn {
        Arc::new(move |key: CacheKey| -> BoxFuture<'static, Result<Value, HttpError>> {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                if n <= failures {
                    let url = Url::parse("https://cases.example/api/").unwrap();
                    let request = RequestSummary::new(&Method::GET, &url);
                    Err(HttpError::transport(request, format!("offline ({key})")))
                } else {
                    Ok(json!({ "fetch": n }))
                }
            })
        })
    }

    #[test]
    fn get_on_unknown_key_is_absent() {
        let cache = QueryCache::new();
        assert!(cache.get(&keys::referral(1)).is_none());
    }

    #[tokio::test]
    async fn set_then_get_returns_fresh_snapshot() {
        let cache = QueryCache::new();
        cache.set(keys::referral(1), json!({"id": 1}));

        let entry = cache.get(&keys::referral(1)).unwrap();
        assert_eq!(*entry.value, json!({"id": 1}));
        assert!(!entry.stale);
    }

    #[tokio::test]
    async fn invalidate_marks_every_key_under_prefix() {
        let cache = QueryCache::new();
        cache.set(keys::referral_answer("a"), json!(1));
        cache.set(keys::referral_answer("b"), json!(2));
        cache.set(keys::referral(9), json!(3));

        let matched = cache.invalidate(&keys::referral_answers());

        assert_eq!(matched, 2);
        assert!(cache.get(&keys::referral_answer("a")).unwrap().stale);
        assert!(!cache.get(&keys::referral(9)).unwrap().stale);
    }

    #[tokio::test]
    async fn repeated_invalidations_coalesce_into_one_refetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let key = keys::referral_answers_for(7);
        cache.set(key.clone(), json!({"fetch": 0}));

        let fetcher = gated_fetcher(Arc::clone(&calls), Arc::clone(&gate));
        let mut subscription = cache.subscribe(key.clone(), fetcher);
        for _ in 0..5 {
            cache.invalidate(&keys::referral_answers());
        }
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // stale value is served while the refetch is pending
        assert_eq!(*cache.get(&key).unwrap().value, json!({"fetch": 0}));

        gate.notify_one();
        let value = subscription.fresh().await.unwrap();
        assert_eq!(*value, json!({"fetch": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_read_revalidates_in_background() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = keys::referral(5);
        cache.register(key.clone(), counting_fetcher(Arc::clone(&calls)));
        cache.set(key.clone(), json!({"fetch": 0}));

        cache.invalidate(&key);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let entry = cache.get(&key).unwrap();
        assert!(entry.stale);
        assert_eq!(*entry.value, json!({"fetch": 0}));
        // the refetch is in flight: a second read does not start another
        cache.get(&key);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::task::yield_now().await;
        let entry = cache.get(&key).unwrap();
        assert!(!entry.stale);
        assert_eq!(*entry.value, json!({"fetch": 1}));
    }

    #[tokio::test]
    async fn reload_discards_the_older_in_flight_fetch() {
        let cache = QueryCache::new();
        let key = keys::referral(2);
        let started = Arc::new(AtomicUsize::new(0));
        let gates: Arc<Vec<Arc<Notify>>> =
            Arc::new(vec![Arc::new(Notify::new()), Arc::new(Notify::new())]);

        let fetcher: QueryFn = {
            let started = Arc::clone(&started);
            let gates = Arc::clone(&gates);
            Arc::new(move |_key: CacheKey| -> BoxFuture<'static, Result<Value, HttpError>> {
                let n = started.fetch_add(1, Ordering::SeqCst);
                let gate = Arc::clone(&gates[n]);
                Box::pin(async move {
                    gate.notified().await;
                    Ok(json!({ "request": n }))
                })
            })
        };

        let mut subscription = cache.subscribe(key.clone(), fetcher);
        assert!(cache.reload(&key));
        tokio::task::yield_now().await;

        // newest request lands first, then the older one arrives late
        gates[1].notify_one();
        let value = subscription.fresh().await.unwrap();
        assert_eq!(*value, json!({"request": 1}));

        gates[0].notify_one();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(*cache.get(&key).unwrap().value, json!({"request": 1}));
    }

    #[tokio::test]
    async fn set_supersedes_in_flight_fetch() {
        let cache = QueryCache::new();
        let key = keys::current_user();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let fetcher = gated_fetcher(Arc::clone(&calls), Arc::clone(&gate));
        let _subscription = cache.subscribe(key.clone(), fetcher);
        tokio::task::yield_now().await;
        cache.set(key.clone(), json!({"local": true}));

        gate.notify_one();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(*cache.get(&key).unwrap().value, json!({"local": true}));
    }

    #[tokio::test]
    async fn dropped_subscription_stops_invalidation_refetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = keys::referral_messages(3);

        let mut subscription = cache.subscribe(key.clone(), counting_fetcher(Arc::clone(&calls)));
        subscription.fresh().await.unwrap();
        drop(subscription);

        cache.invalidate(&key);
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_settles_fresh_with_the_error() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = keys::referral_attachments(4);

        let mut subscription = cache.subscribe(key.clone(), flaky_fetcher(Arc::clone(&calls), 1));
        let error = subscription.fresh().await.unwrap_err();

        match error {
            QueryError::Fetch(error) => {
                assert!(matches!(error.kind, HttpErrorKind::Transport { .. }))
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
        let state = subscription.current();
        assert!(state.value.is_none());
        assert!(!state.fetching);

        assert!(cache.refetch(&key));
        assert_eq!(*subscription.fresh().await.unwrap(), json!({"fetch": 2}));
        assert!(subscription.current().error.is_none());
    }

    #[tokio::test]
    async fn failed_refetch_keeps_the_stale_value_but_is_not_fresh() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = keys::referral(8);
        cache.set(key.clone(), json!({"fetch": 0}));

        let mut subscription = cache.subscribe(key.clone(), flaky_fetcher(Arc::clone(&calls), 1));
        cache.invalidate(&key);

        assert!(matches!(subscription.fresh().await, Err(QueryError::Fetch(_))));
        let entry = cache.get(&key).unwrap();
        assert_eq!(*entry.value, json!({"fetch": 0}));
        assert!(entry.stale);
    }
}
