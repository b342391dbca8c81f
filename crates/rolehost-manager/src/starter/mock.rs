// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock starter for testing.
//!
//! A simple starter implementation that records instances in memory
//! without booting any process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::traits::*;
use crate::completion::ConfigDocument;
use crate::role::Role;

/// Mock instance state.
#[derive(Debug, Clone)]
struct MockInstance {
    role: Role,
    config: ConfigDocument,
    state: InstanceState,
}

/// Mock starter for testing.
pub struct MockStarter {
    instances: Arc<Mutex<HashMap<String, MockInstance>>>,
    stop_calls: AtomicUsize,
    /// Optional delay to simulate boot time (in milliseconds)
    pub start_delay_ms: u64,
    /// If true, start returns an error
    pub fail_start: bool,
    /// If true, start succeeds but returns no instance id
    pub no_identifier: bool,
    /// If true, stop returns an error
    pub fail_stop: bool,
    /// Delay after an instance is taken down, before stop returns (in milliseconds)
    pub stop_delay_ms: u64,
    /// If true, status lookups return an error
    pub fail_status: bool,
    /// Id handed out by every start instead of a generated one
    pub fixed_id: Option<String>,
}

impl Default for MockStarter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStarter {
    /// Create a new mock starter.
    pub fn new() -> Self {
        Self {
            instances: Arc::new(Mutex::new(HashMap::new())),
            stop_calls: AtomicUsize::new(0),
            start_delay_ms: 0,
            fail_start: false,
            no_identifier: false,
            fail_stop: false,
            stop_delay_ms: 0,
            fail_status: false,
            fixed_id: None,
        }
    }

    /// Create a mock starter whose starts fail.
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    /// Create a mock starter whose starts return no instance id.
    pub fn without_identifier() -> Self {
        Self {
            no_identifier: true,
            ..Self::new()
        }
    }

    /// Create a mock starter whose stops fail.
    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::new()
        }
    }

    /// Keep stop calls in flight for `ms` after the instance is gone.
    pub fn with_stop_delay(mut self, ms: u64) -> Self {
        self.stop_delay_ms = ms;
        self
    }

    /// Fail every status lookup.
    pub fn with_failing_status(mut self) -> Self {
        self.fail_status = true;
        self
    }

    /// Hand out `instance_id` from every start.
    pub fn with_fixed_id(mut self, instance_id: impl Into<String>) -> Self {
        self.fixed_id = Some(instance_id.into());
        self
    }

    /// Mark an instance as exited on its own.
    pub async fn exit_instance(&self, instance_id: &str) {
        let mut instances = self.instances.lock().await;
        if let Some(instance) = instances.get_mut(instance_id) {
            instance.state = InstanceState::Exited;
        }
    }

    /// Configuration an instance was started with.
    pub async fn config_of(&self, instance_id: &str) -> Option<ConfigDocument> {
        let instances = self.instances.lock().await;
        instances.get(instance_id).map(|i| i.config.clone())
    }

    /// Role an instance was started as.
    pub async fn role_of(&self, instance_id: &str) -> Option<Role> {
        let instances = self.instances.lock().await;
        instances.get(instance_id).map(|i| i.role)
    }

    /// Number of live instances.
    pub async fn live(&self) -> usize {
        self.instances.lock().await.len()
    }

    /// Number of stop calls that reached the starter.
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Starter for MockStarter {
    fn starter_type(&self) -> &'static str {
        "mock"
    }

    async fn start(&self, role: Role, config: &ConfigDocument) -> Result<Option<String>> {
        if self.start_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.start_delay_ms)).await;
        }

        if self.fail_start {
            return Err(StarterError::StartFailed("Mock failure".to_string()));
        }
        if self.no_identifier {
            return Ok(None);
        }

        let instance_id = match &self.fixed_id {
            Some(id) => id.clone(),
            None => format!("{}_{}", role, uuid::Uuid::new_v4().simple()),
        };
        let mut instances = self.instances.lock().await;
        instances.insert(
            instance_id.clone(),
            MockInstance {
                role,
                config: config.clone(),
                state: InstanceState::Running,
            },
        );

        Ok(Some(instance_id))
    }

    async fn stop(&self, instance_id: &str) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_stop {
            return Err(StarterError::StopFailed("Mock failure".to_string()));
        }

        let removed = self.instances.lock().await.remove(instance_id);
        if removed.is_none() {
            return Err(StarterError::UnknownInstance(instance_id.to_string()));
        }

        if self.stop_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.stop_delay_ms)).await;
        }
        Ok(())
    }

    async fn status_of(&self, instance_id: &str) -> Result<InstanceState> {
        if self.fail_status {
            return Err(StarterError::Io(std::io::Error::other("Mock failure")));
        }

        let instances = self.instances.lock().await;
        instances
            .get(instance_id)
            .map(|i| i.state)
            .ok_or_else(|| StarterError::UnknownInstance(instance_id.to_string()))
    }
}
