// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration auto-completion.
//!
//! Fills in the keys a role needs to boot when the caller asked for auto
//! mode. Keys already present in the document are never touched, so
//! completing a complete document is a no-op.
//!
//! Each role has its own completion function. Within one call the host and
//! port are settled first; every derived path and metrics prefix is then
//! built from the values in the output document.

use std::path::{MAIN_SEPARATOR, Path};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::host::HostResolver;
use crate::port::PortAllocator;
use crate::role::Role;

/// Settings for a to-be-started instance, keyed by setting name.
pub type ConfigDocument = Map<String, Value>;

/// Well-known configuration keys.
pub mod keys {
    /// Controller keys.
    pub mod controller {
        /// Advertised host.
        pub const HOST: &str = "controller.host";
        /// Listen port, stored as a string.
        pub const PORT: &str = "controller.port";
        /// Data directory.
        pub const DATA_DIR: &str = "controller.data.dir";
        /// Metrics prefix.
        pub const METRICS_PREFIX: &str = "controller.metrics.prefix";
    }

    /// Broker keys.
    pub mod broker {
        /// Client query port.
        pub const QUERY_PORT: &str = "pinot.broker.client.queryPort";
        /// Metrics name prefix.
        pub const METRICS_PREFIX: &str = "pinot.broker.metrics.prefix";
    }

    /// Server keys.
    pub mod server {
        /// Netty host.
        pub const HOST: &str = "pinot.server.netty.host";
        /// Netty port.
        pub const PORT: &str = "pinot.server.netty.port";
        /// Admin API port.
        pub const ADMIN_API_PORT: &str = "pinot.server.adminapi.port";
        /// Instance data directory.
        pub const DATA_DIR: &str = "pinot.server.instance.dataDir";
        /// Segment tar staging directory.
        pub const SEGMENT_TAR_DIR: &str = "pinot.server.instance.segmentTarDir";
        /// Metrics prefix.
        pub const METRICS_PREFIX: &str = "pinot.server.metrics.prefix";
    }
}

/// Default controller metrics prefix.
pub const DEFAULT_CONTROLLER_METRICS_PREFIX: &str = "pinot.controller";
/// Default broker metrics prefix.
pub const DEFAULT_BROKER_METRICS_PREFIX: &str = "pinot.broker.";
/// Default server metrics prefix.
pub const DEFAULT_SERVER_METRICS_PREFIX: &str = "pinot.server.";

/// Environment constants used by completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSettings {
    /// Root for derived directories. Always ends with a path separator.
    pub tmp_dir: String,
    /// Controller metrics prefix, joined to `<host>_<port>` with a dot.
    pub controller_metrics_prefix: String,
    /// Broker metrics prefix, prepended to `<host>_<port>` as is.
    pub broker_metrics_prefix: String,
    /// Server metrics prefix, prepended to `<host>_<port>` as is.
    pub server_metrics_prefix: String,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            tmp_dir: tmp_root(&std::env::temp_dir()),
            controller_metrics_prefix: DEFAULT_CONTROLLER_METRICS_PREFIX.to_string(),
            broker_metrics_prefix: DEFAULT_BROKER_METRICS_PREFIX.to_string(),
            server_metrics_prefix: DEFAULT_SERVER_METRICS_PREFIX.to_string(),
        }
    }
}

impl CompletionSettings {
    /// Use `dir` as the root for derived directories.
    pub fn with_tmp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.tmp_dir = tmp_root(dir.as_ref());
        self
    }
}

/// Render a directory as a prefix that ends with a separator.
pub fn tmp_root(dir: &Path) -> String {
    let mut root = dir.to_string_lossy().into_owned();
    if !root.ends_with(MAIN_SEPARATOR) && !root.ends_with('/') {
        root.push(MAIN_SEPARATOR);
    }
    root
}

/// Completion function for one role.
type CompleteFn = fn(&CompletionContext, &mut ConfigDocument) -> Result<()>;

/// Completion strategy per role.
fn strategy(role: Role) -> CompleteFn {
    match role {
        Role::Controller => complete_controller,
        Role::Broker => complete_broker,
        Role::Server => complete_server,
    }
}

/// Everything completion depends on besides the document itself.
#[derive(Clone)]
pub struct CompletionContext {
    host_resolver: Arc<dyn HostResolver>,
    port_allocator: Arc<dyn PortAllocator>,
    settings: CompletionSettings,
}

impl CompletionContext {
    /// Create a completion context.
    pub fn new(
        host_resolver: Arc<dyn HostResolver>,
        port_allocator: Arc<dyn PortAllocator>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            host_resolver,
            port_allocator,
            settings,
        }
    }

    /// Settings in use.
    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    /// Fill every key `role` needs that `doc` lacks.
    pub fn complete(&self, role: Role, mut doc: ConfigDocument) -> Result<ConfigDocument> {
        let before = doc.len();
        strategy(role)(self, &mut doc)?;
        debug!(
            role = %role,
            added = doc.len() - before,
            "Completed configuration"
        );
        Ok(doc)
    }

    fn host(&self) -> Value {
        Value::String(self.host_resolver.resolve_host())
    }

    fn port(&self) -> Result<u16> {
        self.port_allocator.allocate()
    }
}

/// A key counts as set unless absent or null.
fn is_set(doc: &ConfigDocument, key: &str) -> bool {
    doc.get(key).is_some_and(|v| !v.is_null())
}

fn set_if_absent(
    doc: &mut ConfigDocument,
    key: &str,
    value: impl FnOnce() -> Result<Value>,
) -> Result<()> {
    if !is_set(doc, key) {
        doc.insert(key.to_string(), value()?);
    }
    Ok(())
}

/// Plain text of a value: strings unquoted, everything else as JSON.
fn plain(doc: &ConfigDocument, key: &str) -> String {
    match doc.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn complete_controller(ctx: &CompletionContext, doc: &mut ConfigDocument) -> Result<()> {
    use keys::controller::*;

    set_if_absent(doc, HOST, || Ok(ctx.host()))?;
    set_if_absent(doc, PORT, || Ok(Value::String(ctx.port()?.to_string())))?;

    let host = plain(doc, HOST);
    let port = plain(doc, PORT);
    let settings = &ctx.settings;

    set_if_absent(doc, DATA_DIR, || {
        Ok(Value::String(format!(
            "{}Controller_{}_{}/data",
            settings.tmp_dir, host, port
        )))
    })?;
    set_if_absent(doc, METRICS_PREFIX, || {
        Ok(Value::String(format!(
            "{}.{}_{}",
            settings.controller_metrics_prefix, host, port
        )))
    })
}

/// The broker never stores a host; one is resolved only for the metrics prefix.
fn complete_broker(ctx: &CompletionContext, doc: &mut ConfigDocument) -> Result<()> {
    use keys::broker::*;

    set_if_absent(doc, QUERY_PORT, || Ok(Value::from(ctx.port()?)))?;

    let query_port = plain(doc, QUERY_PORT);
    set_if_absent(doc, METRICS_PREFIX, || {
        Ok(Value::String(format!(
            "{}{}_{}",
            ctx.settings.broker_metrics_prefix,
            ctx.host_resolver.resolve_host(),
            query_port
        )))
    })
}

fn complete_server(ctx: &CompletionContext, doc: &mut ConfigDocument) -> Result<()> {
    use keys::server::*;

    set_if_absent(doc, HOST, || Ok(ctx.host()))?;
    set_if_absent(doc, PORT, || Ok(Value::from(ctx.port()?)))?;
    set_if_absent(doc, ADMIN_API_PORT, || Ok(Value::from(ctx.port()?)))?;

    let host = plain(doc, HOST);
    let port = plain(doc, PORT);
    let settings = &ctx.settings;

    set_if_absent(doc, DATA_DIR, || {
        Ok(Value::String(format!(
            "{}Server_{}_{}/data",
            settings.tmp_dir, host, port
        )))
    })?;
    set_if_absent(doc, SEGMENT_TAR_DIR, || {
        Ok(Value::String(format!(
            "{}Server_{}_{}/segment",
            settings.tmp_dir, host, port
        )))
    })?;
    set_if_absent(doc, METRICS_PREFIX, || {
        Ok(Value::String(format!(
            "{}{}_{}",
            settings.server_metrics_prefix, host, port
        )))
    })
}
