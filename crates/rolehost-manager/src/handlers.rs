// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Control API handlers.
//!
//! Sequence role resolution, configuration completion, the starter and the
//! registry. Transport-agnostic: the HTTP layer in [`crate::server`] only
//! extracts arguments and serializes results.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::completion::{CompletionContext, ConfigDocument};
use crate::error::{Error, Result};
use crate::registry::{InstanceRecord, InstanceRegistry, InstanceStatus};
use crate::role::Role;
use crate::starter::{InstanceState, Starter, StarterError};

/// Shared state for control API handlers.
pub struct ManagerHandlerState {
    /// Registry of running instances.
    pub registry: Arc<InstanceRegistry>,
    /// Starter booting and stopping instances.
    pub starter: Arc<dyn Starter>,
    /// Auto-mode configuration completion.
    pub completion: CompletionContext,
    /// When the server started (for uptime calculation).
    pub start_time: Instant,
    /// Server version string.
    pub version: String,
}

impl ManagerHandlerState {
    /// Create handler state with an empty registry.
    pub fn new(starter: Arc<dyn Starter>, completion: CompletionContext) -> Self {
        Self {
            registry: Arc::new(InstanceRegistry::new()),
            starter,
            completion,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Use an existing registry.
    pub fn with_registry(mut self, registry: Arc<InstanceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Get the server uptime in milliseconds.
    pub fn uptime_ms(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }

    /// Current status of a registered instance.
    ///
    /// `None` when the starter no longer knows the instance, which happens
    /// while a stop is in flight and the entry is not yet removed.
    async fn status(&self, record: &InstanceRecord) -> Result<Option<InstanceStatus>> {
        match self.starter.status_of(&record.instance_id).await {
            Ok(state) => Ok(Some(record.with_state(state))),
            Err(StarterError::UnknownInstance(_)) => {
                debug!(instance_id = %record.instance_id, "Instance is being stopped");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Health Check
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    /// Always true while the server answers.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Server uptime in milliseconds.
    pub uptime_ms: i64,
    /// Number of registered instances.
    pub instances: usize,
}

/// Handle health check request.
pub async fn handle_health_check(state: &ManagerHandlerState) -> HealthCheckResponse {
    HealthCheckResponse {
        healthy: true,
        version: state.version.clone(),
        uptime_ms: state.uptime_ms(),
        instances: state.registry.len().await,
    }
}

// ============================================================================
// Instance Queries
// ============================================================================

/// Handle list instances request: every registered instance by id.
pub async fn handle_list_instances(
    state: &ManagerHandlerState,
) -> Result<BTreeMap<String, InstanceStatus>> {
    let mut statuses = BTreeMap::new();
    for record in state.registry.list().await {
        if let Some(status) = state.status(&record).await? {
            statuses.insert(record.instance_id, status);
        }
    }
    Ok(statuses)
}

/// Handle get instance request.
pub async fn handle_get_instance(
    state: &ManagerHandlerState,
    instance_id: &str,
) -> Result<InstanceStatus> {
    let record = state
        .registry
        .get(instance_id)
        .await
        .ok_or_else(|| Error::InstanceNotFound(instance_id.to_string()))?;
    state
        .status(&record)
        .await?
        .ok_or_else(|| Error::InstanceNotFound(instance_id.to_string()))
}

// ============================================================================
// Instance Lifecycle
// ============================================================================

/// Request to start an instance.
#[derive(Debug, Clone, Default)]
pub struct StartInstanceRequest {
    /// Role token, matched case-insensitively.
    pub role: String,
    /// Fill in missing configuration keys instead of rejecting bad input.
    pub auto_mode: bool,
    /// Raw configuration document (JSON object), possibly empty.
    pub body: String,
}

/// Handle start instance request.
pub async fn handle_start_instance(
    state: &ManagerHandlerState,
    request: StartInstanceRequest,
) -> Result<InstanceStatus> {
    let role = Role::resolve(&request.role)?;

    info!(
        role = %role,
        auto_mode = request.auto_mode,
        body_len = request.body.len(),
        "Start instance request received"
    );

    let config = match decode_configuration(&request.body) {
        Ok(config) => config,
        Err(_) if request.auto_mode => ConfigDocument::new(),
        Err(e) => return Err(Error::MalformedConfiguration(e.to_string())),
    };

    let config = if request.auto_mode {
        state.completion.complete(role, config)?
    } else {
        config
    };

    let instance_id = match state.starter.start(role, &config).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            return Err(Error::StartFailure {
                role,
                reason: "starter returned no instance id".to_string(),
            });
        }
        Err(e) => {
            error!(role = %role, error = %e, "Starter failed to start instance");
            return Err(Error::StartFailure {
                role,
                reason: e.to_string(),
            });
        }
    };

    let record = InstanceRecord::new(&instance_id, role, config);
    if !state.registry.insert(record.clone()).await {
        // Nothing tracks the new instance, so it must not outlive the request.
        if let Err(e) = state.starter.stop(&instance_id).await {
            warn!(
                instance_id = %instance_id,
                error = %e,
                "Failed to stop instance with duplicate id"
            );
        }
        return Err(Error::StartFailure {
            role,
            reason: format!("instance id [{instance_id}] is already registered"),
        });
    }

    info!(
        role = %role,
        instance_id = %instance_id,
        "Successfully started instance"
    );

    Ok(record.with_state(InstanceState::Running))
}

/// Handle stop instance request.
pub async fn handle_stop_instance(state: &ManagerHandlerState, instance_id: &str) -> Result<()> {
    let record = state
        .registry
        .stop(instance_id, state.starter.as_ref())
        .await?;

    info!(
        role = %record.role,
        instance_id = %instance_id,
        "Stopped instance"
    );

    Ok(())
}

/// Decode a request body into a configuration document.
///
/// Anything but a JSON object is rejected, including an empty body.
pub fn decode_configuration(body: &str) -> serde_json::Result<ConfigDocument> {
    serde_json::from_str(body)
}
