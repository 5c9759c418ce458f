//! Point-in-time view of a running machine.
//!
//! A [`Snapshot`] is what the view renders from: the current state, the
//! context, and the path taken so far. Every applied transition publishes a
//! new one; subscribers receive them through a `tokio::sync::watch` channel.

use crate::core::{State, StateHistory};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(bound(serialize = "S: State, C: Serialize"))]
pub struct Snapshot<S: State, C> {
    pub id: Uuid,
    pub machine: String,
    pub state: S,
    pub context: C,
    /// Shared with the machine until its next state change.
    pub history: Arc<StateHistory<S>>,
    pub attempt: u64,
    pub updated_at: DateTime<Utc>,
}

impl<S: State, C> Snapshot<S, C> {
    pub fn matches(&self, state: &S) -> bool {
        self.state == *state
    }

    pub fn is_final(&self) -> bool {
        self.state.is_final()
    }

    pub fn is_error(&self) -> bool {
        self.state.is_error()
    }

    /// Serialize to JSON for debugging tools and logs.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>
    where
        C: Serialize,
    {
        serde_json::to_value(self)
    }
}
