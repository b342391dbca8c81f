// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Starter trait definitions.
//!
//! Defines the abstract interface for booting and stopping role instances.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::ConfigDocument;
use crate::role::Role;

/// Errors from starter operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StarterError {
    /// No executable is configured for the role.
    #[error("No command configured for role {0}")]
    NoCommand(Role),

    /// The starter does not know this instance.
    #[error("Unknown instance: {0}")]
    UnknownInstance(String),

    /// Instance failed to start.
    #[error("Start failed: {0}")]
    StartFailed(String),

    /// Instance failed to stop.
    #[error("Stop failed: {0}")]
    StopFailed(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for starter operations.
pub type Result<T> = std::result::Result<T, StarterError>;

/// Lifecycle state reported by a starter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// The instance is up.
    Running,
    /// The instance terminated on its own and has not been stopped yet.
    Exited,
}

/// Trait for instance starters.
///
/// Starters are PURE execution backends - they do NOT touch the instance
/// registry. Registration and removal are handled by the caller.
#[async_trait]
pub trait Starter: Send + Sync {
    /// Starter type identifier (e.g., "process", "mock").
    fn starter_type(&self) -> &'static str;

    /// Boot an instance of `role` with a finished configuration.
    ///
    /// `Ok(None)` means the starter gave no error but produced no instance.
    async fn start(&self, role: Role, config: &ConfigDocument) -> Result<Option<String>>;

    /// Stop a running instance.
    async fn stop(&self, instance_id: &str) -> Result<()>;

    /// Current state of an instance.
    async fn status_of(&self, instance_id: &str) -> Result<InstanceState>;
}
