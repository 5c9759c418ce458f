//! Named side effects.
//!
//! A transition lists effect names; the builder resolves them against an
//! [`EffectRegistry`] once, when the definition is built, so a misspelled
//! name is a build error instead of a silently skipped effect.

use super::builtin::{report_failure, REPORT_FAILURE};
use crate::core::{Event, Signal};
use crate::env::HasTelemetry;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Which machine and transition an effect is running for.
#[derive(Clone, Copy, Debug)]
pub struct MachineInfo<'a> {
    pub name: &'a str,
    pub id: Uuid,
    pub attempt: u64,
    pub from: &'a str,
    pub to: &'a str,
}

/// Everything an effect may look at. The context is the post-transition
/// value; effects cannot change it.
pub struct EffectScope<'a, E, C, Env> {
    pub env: &'a Env,
    pub context: &'a C,
    pub signal: &'a Signal<E>,
    pub machine: MachineInfo<'a>,
}

pub type SideEffect<E, C, Env> = Arc<dyn Fn(&EffectScope<'_, E, C, Env>) + Send + Sync>;

pub struct EffectRegistry<E, C, Env> {
    effects: HashMap<String, SideEffect<E, C, Env>>,
}

impl<E, C, Env> EffectRegistry<E, C, Env> {
    pub fn new() -> Self {
        Self {
            effects: HashMap::new(),
        }
    }

    /// Register `effect` under `name`, replacing any previous entry.
    pub fn register<F>(mut self, name: impl Into<String>, effect: F) -> Self
    where
        F: Fn(&EffectScope<'_, E, C, Env>) + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(effect));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, effect: SideEffect<E, C, Env>) {
        self.effects.insert(name.into(), effect);
    }

    pub fn get(&self, name: &str) -> Option<SideEffect<E, C, Env>> {
        self.effects.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.effects.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }
}

impl<E, C, Env> EffectRegistry<E, C, Env>
where
    E: Event,
    Env: HasTelemetry,
{
    /// Registry pre-populated with [`REPORT_FAILURE`].
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.insert(REPORT_FAILURE, report_failure());
        registry
    }
}

impl<E, C, Env> Default for EffectRegistry<E, C, Env> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, C, Env> Clone for EffectRegistry<E, C, Env> {
    fn clone(&self) -> Self {
        Self {
            effects: self.effects.clone(),
        }
    }
}
