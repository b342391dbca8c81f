// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for rolehost-manager.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::role::Role;

/// Manager errors.
///
/// Every variant maps onto exactly one HTTP status, see [`Error::status_code`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The role token does not name a known role.
    #[error("Unrecognized Role: {0}")]
    UnrecognizedRole(String),

    /// No registered instance has this id.
    #[error("Instance [{0}] not found.")]
    InstanceNotFound(String),

    /// The request body could not be decoded into a configuration document.
    #[error("Unable to deserialize Conf String to Configuration Object: {0}")]
    MalformedConfiguration(String),

    /// The port allocator gave up.
    #[error("No free port available after {0} attempts")]
    ResourceExhausted(usize),

    /// The starter failed to start an instance or returned no identifier.
    #[error("Unable to start a {role}: {reason}")]
    StartFailure {
        /// Role that was being started.
        role: Role,
        /// Why the start failed.
        reason: String,
    },

    /// The starter failed to stop an instance.
    #[error("Failed to stop instance [{instance_id}]: {reason}")]
    StopFailure {
        /// Instance that was being stopped.
        instance_id: String,
        /// Why the stop failed.
        reason: String,
    },

    /// The starter could not report an instance's status.
    #[error("Starter error: {0}")]
    Starter(#[from] crate::starter::StarterError),
}

impl Error {
    /// HTTP status this error is surfaced as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::UnrecognizedRole(_) | Error::InstanceNotFound(_) => StatusCode::NOT_FOUND,
            Error::MalformedConfiguration(_) => StatusCode::BAD_REQUEST,
            Error::Config(_)
            | Error::ResourceExhausted(_)
            | Error::StartFailure { .. }
            | Error::StopFailure { .. }
            | Error::Starter(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Result type using manager Error.
pub type Result<T> = std::result::Result<T, Error>;
