// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! rolehost Manager - Instance Lifecycle Control Plane
//!
//! An HTTP server responsible for:
//! - Starting Controller/Broker/Server instances, optionally completing
//!   their configuration
//! - Listing, inspecting and stopping running instances

use std::sync::Arc;
use tracing::{info, warn};

use rolehost_manager::config::Config;
use rolehost_manager::runtime::ManagerRuntime;
use rolehost_manager::starter::ProcessStarter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rolehost_manager=info,tower_http=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    let starter = ProcessStarter::new(config.role_commands.clone(), config.tmp_dir.join("rolehost"));
    let roles = starter.roles();
    if roles.is_empty() {
        warn!("No ROLEHOST_<ROLE>_COMMAND configured; every start request will fail");
    }

    info!(
        http_addr = %config.http_addr,
        tmp_dir = %config.tmp_dir.display(),
        roles = ?roles,
        "Starting rolehost manager"
    );

    let runtime = ManagerRuntime::builder()
        .starter(Arc::new(starter))
        .bind_addr(config.http_addr)
        .completion(config.completion)
        .port_attempts(config.port_attempts)
        .build()?
        .start()
        .await?;

    info!(addr = %runtime.local_addr(), "Manager ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    runtime.shutdown().await?;

    info!("rolehost manager shut down");

    Ok(())
}
