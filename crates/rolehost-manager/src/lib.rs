// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! rolehost Manager - Instance Lifecycle Control Plane
//!
//! This crate manages named instances that each play one cluster role:
//! `Controller`, `Broker` or `Server`. Clients list running instances,
//! inspect or stop one, and start new ones. In auto mode a partial (or
//! missing) configuration is completed with a reachable host, fresh ports
//! and derived directories before the instance boots.
//!
//! # Architecture
//!
//! ```text
//!   HTTP client
//!        │
//!        ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  rolehost-manager (This Crate)               │
//! │                                                              │
//! │  server ──► handlers ──► Role::resolve                       │
//! │                │                                             │
//! │                ├──► CompletionContext ──► HostResolver       │
//! │                │                     └──► PortAllocator      │
//! │                ├──► Starter (process / mock)                 │
//! │                └──► InstanceRegistry                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # HTTP API
//!
//! | Operation | Request | Errors |
//! |-----------|---------|--------|
//! | List instances | `GET /instances` | - |
//! | Get instance | `GET /instances/{id}` | 404 unknown instance |
//! | Stop instance | `DELETE /instances/{id}` | 404 unknown, 500 stop failed |
//! | Start instance | `POST /instances/{role}?autoMode=true` | 400 bad body, 404 unknown role, 500 start failed |
//! | Health | `GET /health` | - |
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ROLEHOST_HTTP_PORT` | `8080` | HTTP server port |
//! | `ROLEHOST_TMP_DIR` | OS temp dir | Root of derived directories |
//! | `ROLEHOST_CONTROLLER_METRICS_PREFIX` | `pinot.controller` | Controller metrics prefix |
//! | `ROLEHOST_BROKER_METRICS_PREFIX` | `pinot.broker.` | Broker metrics prefix |
//! | `ROLEHOST_SERVER_METRICS_PREFIX` | `pinot.server.` | Server metrics prefix |
//! | `ROLEHOST_PORT_ATTEMPTS` | `16` | Bind attempts per port allocation |
//! | `ROLEHOST_<ROLE>_COMMAND` | - | Command line booting a role |

#![deny(missing_docs)]

/// Server configuration loaded from environment variables.
pub mod config;

/// Configuration auto-completion.
pub mod completion;

/// Error types for manager operations.
pub mod error;

/// Control API request handlers.
pub mod handlers;

/// Local host address discovery.
pub mod host;

/// Ephemeral port allocation.
pub mod port;

/// Registry of running instances.
pub mod registry;

/// Cluster roles.
pub mod role;

/// Embeddable runtime.
pub mod runtime;

/// HTTP server for the control API.
pub mod server;

/// Instance boot backends (process, mock).
pub mod starter;

pub use config::Config;
pub use error::Error;
pub use role::Role;
