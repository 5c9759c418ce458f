//! Effects most mutations need: cache invalidation, cache writes,
//! navigation and failure reporting.

use super::registry::{EffectScope, SideEffect};
use crate::cache::CacheKey;
use crate::core::{Event, Signal};
use crate::env::{FailureReport, HasCache, HasNavigator, HasTelemetry};
use std::sync::Arc;

/// Name under which [`EffectRegistry::standard`](super::EffectRegistry::standard)
/// registers [`report_failure`].
pub const REPORT_FAILURE: &str = "report_failure";

/// Send the failure carried by the signal to telemetry.
pub fn report_failure<E, C, Env>() -> SideEffect<E, C, Env>
where
    E: Event,
    Env: HasTelemetry,
{
    Arc::new(|scope: &EffectScope<'_, E, C, Env>| {
        if let Some(error) = scope.signal.error() {
            scope.env.telemetry().capture_exception(FailureReport {
                machine: scope.machine.name.to_string(),
                instance: scope.machine.id,
                state: scope.machine.from.to_string(),
                attempt: scope.machine.attempt,
                error: Arc::clone(error),
            });
        }
    })
}

/// Invalidate the prefixes computed from context and signal.
pub fn invalidate<E, C, Env, F>(keys: F) -> SideEffect<E, C, Env>
where
    Env: HasCache,
    F: Fn(&C, &Signal<E>) -> Vec<CacheKey> + Send + Sync + 'static,
{
    Arc::new(move |scope: &EffectScope<'_, E, C, Env>| {
        for key in keys(scope.context, scope.signal) {
            scope.env.cache().invalidate(&key);
        }
    })
}

/// Invalidate a fixed list of prefixes.
pub fn invalidate_keys<E, C, Env>(keys: Vec<CacheKey>) -> SideEffect<E, C, Env>
where
    Env: HasCache,
{
    Arc::new(move |scope: &EffectScope<'_, E, C, Env>| {
        for key in &keys {
            scope.env.cache().invalidate(key);
        }
    })
}

/// Store the response body of a successful invocation under a key.
pub fn write_cache<E, C, Env, F>(key: F) -> SideEffect<E, C, Env>
where
    E: Event,
    Env: HasCache,
    F: Fn(&C) -> CacheKey + Send + Sync + 'static,
{
    Arc::new(move |scope: &EffectScope<'_, E, C, Env>| {
        if let Some(value) = scope.signal.output() {
            scope.env.cache().set(key(scope.context), value.clone());
        }
    })
}

/// Navigate to the path computed from context and signal, if any.
pub fn navigate<E, C, Env, F>(path: F) -> SideEffect<E, C, Env>
where
    Env: HasNavigator,
    F: Fn(&C, &Signal<E>) -> Option<String> + Send + Sync + 'static,
{
    Arc::new(move |scope: &EffectScope<'_, E, C, Env>| {
        if let Some(path) = path(scope.context, scope.signal) {
            scope.env.navigator().push(&path);
        }
    })
}
