// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for rolehost-manager.
//!
//! This module provides [`ManagerRuntime`] which allows embedding the control
//! API into an existing tokio application instead of running it as a
//! standalone server.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rolehost_manager::runtime::ManagerRuntime;
//! use rolehost_manager::starter::MockStarter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = ManagerRuntime::builder()
//!         .starter(Arc::new(MockStarter::new()))
//!         .bind_addr("127.0.0.1:0".parse()?)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     println!("control API on {}", runtime.local_addr());
//!
//!     runtime.shutdown().await?;  // Stops every registered instance
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::completion::{CompletionContext, CompletionSettings};
use crate::handlers::ManagerHandlerState;
use crate::host::{HostResolver, NetworkHostResolver};
use crate::port::{DEFAULT_MAX_ATTEMPTS, EphemeralPortAllocator, PortAllocator};
use crate::server::run_http_server;
use crate::starter::Starter;

/// Builder for creating a [`ManagerRuntime`].
pub struct ManagerRuntimeBuilder {
    starter: Option<Arc<dyn Starter>>,
    host_resolver: Option<Arc<dyn HostResolver>>,
    port_allocator: Option<Arc<dyn PortAllocator>>,
    bind_addr: SocketAddr,
    completion: CompletionSettings,
    port_attempts: usize,
}

impl Default for ManagerRuntimeBuilder {
    fn default() -> Self {
        Self {
            starter: None,
            host_resolver: None,
            port_allocator: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            completion: CompletionSettings::default(),
            port_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ManagerRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the instance starter (required).
    pub fn starter(mut self, starter: Arc<dyn Starter>) -> Self {
        self.starter = Some(starter);
        self
    }

    /// Set the host resolver.
    ///
    /// Default: [`NetworkHostResolver`]
    pub fn host_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.host_resolver = Some(resolver);
        self
    }

    /// Set the port allocator. Overrides [`port_attempts`](Self::port_attempts).
    ///
    /// Default: [`EphemeralPortAllocator`]
    pub fn port_allocator(mut self, allocator: Arc<dyn PortAllocator>) -> Self {
        self.port_allocator = Some(allocator);
        self
    }

    /// Set the bind address for the HTTP server.
    ///
    /// Default: `0.0.0.0:8080`
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the constants used by auto-mode completion.
    pub fn completion(mut self, settings: CompletionSettings) -> Self {
        self.completion = settings;
        self
    }

    /// Set the bind attempts per port allocation.
    ///
    /// Default: 16
    pub fn port_attempts(mut self, attempts: usize) -> Self {
        self.port_attempts = attempts;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<ManagerRuntimeConfig> {
        let starter = self
            .starter
            .ok_or_else(|| anyhow::anyhow!("starter is required"))?;
        let host_resolver = self
            .host_resolver
            .unwrap_or_else(|| Arc::new(NetworkHostResolver::new()));
        let port_allocator = self.port_allocator.unwrap_or_else(|| {
            Arc::new(EphemeralPortAllocator::new().with_max_attempts(self.port_attempts))
        });

        Ok(ManagerRuntimeConfig {
            starter,
            completion: CompletionContext::new(host_resolver, port_allocator, self.completion),
            bind_addr: self.bind_addr,
        })
    }
}

/// Configuration for a [`ManagerRuntime`].
pub struct ManagerRuntimeConfig {
    starter: Arc<dyn Starter>,
    completion: CompletionContext,
    bind_addr: SocketAddr,
}

impl ManagerRuntimeConfig {
    /// Start the runtime, binding the listener and spawning the HTTP server task.
    pub async fn start(self) -> Result<ManagerRuntime> {
        let state = Arc::new(ManagerHandlerState::new(
            self.starter.clone(),
            self.completion,
        ));

        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let (server_shutdown_tx, mut server_shutdown_rx) = watch::channel(false);
        let shutdown = async move {
            while server_shutdown_rx.changed().await.is_ok() {
                if *server_shutdown_rx.borrow() {
                    break;
                }
            }
        };

        let server_handle = tokio::spawn(run_http_server(listener, state.clone(), shutdown));

        info!(
            local_addr = %local_addr,
            starter = self.starter.starter_type(),
            "ManagerRuntime started"
        );

        Ok(ManagerRuntime {
            server_handle,
            server_shutdown_tx,
            state,
            local_addr,
        })
    }
}

/// A running control API that can be embedded in an application.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct ManagerRuntime {
    server_handle: JoinHandle<Result<()>>,
    server_shutdown_tx: watch::Sender<bool>,
    state: Arc<ManagerHandlerState>,
    local_addr: SocketAddr,
}

impl ManagerRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> ManagerRuntimeBuilder {
        ManagerRuntimeBuilder::new()
    }

    /// Address the HTTP server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get a reference to the shared handler state.
    pub fn state(&self) -> &Arc<ManagerHandlerState> {
        &self.state
    }

    /// Check if the HTTP server is still running.
    pub fn is_running(&self) -> bool {
        !self.server_handle.is_finished()
    }

    /// Gracefully shut down the runtime.
    ///
    /// Stops accepting requests, waits for in-flight ones, then stops every
    /// instance still registered.
    pub async fn shutdown(self) -> Result<()> {
        info!("ManagerRuntime shutting down...");

        let _ = self.server_shutdown_tx.send(true);

        let server_result = match self.server_handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Control API server task panicked: {}", e);
                Err(anyhow::anyhow!("server task panicked: {}", e))
            }
        };

        let failed = self
            .state
            .registry
            .stop_all(self.state.starter.as_ref())
            .await;
        if !failed.is_empty() {
            warn!(count = failed.len(), "Some instances could not be stopped");
        }

        match server_result {
            Ok(()) => {
                info!("ManagerRuntime shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!("Control API server error during shutdown: {}", e);
                Err(e)
            }
        }
    }
}
