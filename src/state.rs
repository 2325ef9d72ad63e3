//! Shared state cache assembled from the two passive feeds
//!
//! Owns the light-level map (written by the lighting session) and the
//! component state map (written by the status file watcher). Readers get
//! snapshot copies; writers replace entries wholesale. Locks are held only
//! for the copy or replace, never across I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Last-parsed state of one watched component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    /// Parsed key/value attributes from the component's status file
    pub attributes: serde_json::Value,
    /// When the attributes last changed
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time consistent cache of light levels and component states
#[derive(Default)]
pub struct StateCache {
    light_status: RwLock<HashMap<u32, u8>>,
    component_states: RwLock<HashMap<String, ComponentState>>,
    last_light_update: RwLock<Option<DateTime<Utc>>>,
    last_file_update: RwLock<Option<DateTime<Utc>>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot copy of the light level map (address -> 0..=100)
    pub async fn light_status(&self) -> HashMap<u32, u8> {
        self.light_status.read().await.clone()
    }

    /// Snapshot copy of the component state map
    pub async fn component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.read().await.clone()
    }

    /// Record a light level reported by the lighting session
    pub async fn set_light_status(&self, address: u32, level: u8) {
        self.light_status.write().await.insert(address, level);
        *self.last_light_update.write().await = Some(Utc::now());
    }

    /// Replace a component's state wholesale.
    ///
    /// Identical attributes leave the existing entry (timestamp included)
    /// untouched, so re-parsing an unchanged status file is a no-op.
    /// Returns whether the entry changed.
    pub async fn set_component_state(&self, id: &str, attributes: serde_json::Value) -> bool {
        let mut states = self.component_states.write().await;
        if states.get(id).is_some_and(|s| s.attributes == attributes) {
            return false;
        }
        states.insert(
            id.to_string(),
            ComponentState {
                attributes,
                updated_at: Utc::now(),
            },
        );
        drop(states);
        *self.last_file_update.write().await = Some(Utc::now());
        true
    }

    /// Timestamp of the last lighting update, if any
    pub async fn last_light_update(&self) -> Option<DateTime<Utc>> {
        *self.last_light_update.read().await
    }

    /// Timestamp of the last status file change, if any
    pub async fn last_file_update(&self) -> Option<DateTime<Utc>> {
        *self.last_file_update.read().await
    }
}
