// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Instance Registry
//!
//! In-memory registry of running instances. Entries are created after the
//! starter reports a successful start and removed after it reports a
//! successful stop.
//!
//! Lookups share a read lock. Inserts and removals take the write lock only
//! for the map update itself; each entry additionally carries a lifecycle
//! lock so two stops of the same instance cannot both reach the starter.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::completion::ConfigDocument;
use crate::error::{Error, Result};
use crate::role::Role;
use crate::starter::{InstanceState, Starter};

/// A registered instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    /// Id assigned by the starter.
    pub instance_id: String,
    /// Role the instance plays.
    pub role: Role,
    /// Configuration the instance was started with.
    pub config: ConfigDocument,
    /// When the instance was registered.
    pub started_at: DateTime<Utc>,
}

impl InstanceRecord {
    /// Record an instance started now.
    pub fn new(instance_id: impl Into<String>, role: Role, config: ConfigDocument) -> Self {
        Self {
            instance_id: instance_id.into(),
            role,
            config,
            started_at: Utc::now(),
        }
    }

    /// Combine with a state reported by the starter.
    pub fn with_state(&self, state: InstanceState) -> InstanceStatus {
        InstanceStatus {
            instance_id: self.instance_id.clone(),
            role: self.role,
            state,
            started_at: self.started_at,
            config: self.config.clone(),
        }
    }
}

/// Status document returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    /// Id assigned by the starter.
    pub instance_id: String,
    /// Role the instance plays.
    pub role: Role,
    /// State reported by the starter.
    pub state: InstanceState,
    /// When the instance was registered.
    pub started_at: DateTime<Utc>,
    /// Configuration the instance was started with.
    pub config: ConfigDocument,
}

#[derive(Debug)]
struct Entry {
    record: InstanceRecord,
    lifecycle: Mutex<()>,
}

/// Registry of running instances.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    entries: RwLock<HashMap<String, Arc<Entry>>>,
}

impl InstanceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance.
    ///
    /// Returns false, leaving the existing entry alone, if the id is taken.
    pub async fn insert(&self, record: InstanceRecord) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&record.instance_id) {
            warn!(instance_id = %record.instance_id, "Instance id already registered");
            return false;
        }

        info!(
            instance_id = %record.instance_id,
            role = %record.role,
            "Registered instance"
        );
        entries.insert(
            record.instance_id.clone(),
            Arc::new(Entry {
                record,
                lifecycle: Mutex::new(()),
            }),
        );
        true
    }

    /// All registered instances, ordered by id.
    pub async fn list(&self) -> Vec<InstanceRecord> {
        let entries = self.entries.read().await;
        let mut records: Vec<InstanceRecord> =
            entries.values().map(|e| e.record.clone()).collect();
        records.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        records
    }

    /// Ids of all registered instances.
    pub async fn ids(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Look up one instance.
    pub async fn get(&self, instance_id: &str) -> Option<InstanceRecord> {
        let entries = self.entries.read().await;
        entries.get(instance_id).map(|e| e.record.clone())
    }

    /// Number of registered instances.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Stop an instance through `starter` and unregister it.
    ///
    /// The entry stays registered if the starter fails to stop it.
    pub async fn stop(&self, instance_id: &str, starter: &dyn Starter) -> Result<InstanceRecord> {
        let entry = self
            .entries
            .read()
            .await
            .get(instance_id)
            .cloned()
            .ok_or_else(|| Error::InstanceNotFound(instance_id.to_string()))?;

        let _lifecycle = entry.lifecycle.lock().await;

        // A concurrent stop may have removed the entry while we waited.
        let still_registered = self
            .entries
            .read()
            .await
            .get(instance_id)
            .is_some_and(|current| Arc::ptr_eq(current, &entry));
        if !still_registered {
            return Err(Error::InstanceNotFound(instance_id.to_string()));
        }

        starter
            .stop(instance_id)
            .await
            .map_err(|e| Error::StopFailure {
                instance_id: instance_id.to_string(),
                reason: e.to_string(),
            })?;

        self.entries.write().await.remove(instance_id);
        info!(instance_id = %instance_id, "Unregistered instance");

        Ok(entry.record.clone())
    }

    /// Stop every registered instance. Returns the ids that failed to stop.
    pub async fn stop_all(&self, starter: &dyn Starter) -> Vec<String> {
        let mut failed = Vec::new();
        for instance_id in self.ids().await {
            match self.stop(&instance_id, starter).await {
                Ok(_) | Err(Error::InstanceNotFound(_)) => {}
                Err(e) => {
                    warn!(instance_id = %instance_id, error = %e, "Failed to stop instance");
                    failed.push(instance_id);
                }
            }
        }
        debug!(failed = failed.len(), "Stopped all instances");
        failed
    }
}
