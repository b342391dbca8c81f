// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Control API HTTP server.
//!
//! | Method | Path | Success | Errors |
//! |--------|------|---------|--------|
//! | `GET` | `/health` | 200 | - |
//! | `GET` | `/instances` | 200 id → status | 500 |
//! | `GET` | `/instances/{id}` | 200 status | 404, 500 |
//! | `DELETE` | `/instances/{id}` | 200 | 404, 500 |
//! | `POST` | `/instances/{role}?autoMode=` | 200 status | 400, 404, 500 |
//!
//! `GET`/`DELETE` and `POST` share a path segment that means an instance id
//! for the former and a role for the latter.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::handlers::{
    HealthCheckResponse, ManagerHandlerState, StartInstanceRequest, handle_get_instance,
    handle_health_check, handle_list_instances, handle_start_instance, handle_stop_instance,
};
use crate::registry::InstanceStatus;

type AppState = Arc<ManagerHandlerState>;

/// Query string of the start endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StartQuery {
    /// Complete missing configuration keys.
    #[serde(rename = "autoMode", default)]
    pub auto_mode: bool,
}

/// Build the control API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/instances", get(list_instances))
        .route(
            "/instances/{name}",
            get(get_instance).delete(stop_instance).post(start_instance),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the control API on `listener` until `shutdown` resolves.
pub async fn run_http_server(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "Control API server starting");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Control API server stopped");
    Ok(())
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(handle_health_check(&state).await)
}

/// GET /instances
async fn list_instances(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, InstanceStatus>>> {
    Ok(Json(handle_list_instances(&state).await?))
}

/// GET /instances/{id}
async fn get_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Result<Json<InstanceStatus>> {
    Ok(Json(handle_get_instance(&state, &instance_id).await?))
}

/// DELETE /instances/{id}
async fn stop_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Result<StatusCode> {
    handle_stop_instance(&state, &instance_id).await?;
    Ok(StatusCode::OK)
}

/// POST /instances/{role}
async fn start_instance(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Query(query): Query<StartQuery>,
    body: String,
) -> Result<Json<InstanceStatus>> {
    let request = StartInstanceRequest {
        role,
        auto_mode: query.auto_mode,
        body,
    };
    Ok(Json(handle_start_instance(&state, request).await?))
}
