// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for rolehost-manager.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::completion::{
    CompletionSettings, DEFAULT_BROKER_METRICS_PREFIX, DEFAULT_CONTROLLER_METRICS_PREFIX,
    DEFAULT_SERVER_METRICS_PREFIX, tmp_root,
};
use crate::port::DEFAULT_MAX_ATTEMPTS;
use crate::role::Role;
use crate::starter::RoleCommand;

/// Manager configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server address for the control API
    pub http_addr: SocketAddr,
    /// Root for derived directories and instance working directories
    pub tmp_dir: PathBuf,
    /// Constants used by auto-mode completion
    pub completion: CompletionSettings,
    /// Bind attempts per port allocation
    pub port_attempts: usize,
    /// Command booting each role; roles without one cannot be started
    pub role_commands: HashMap<Role, RoleCommand>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = lookup("ROLEHOST_HTTP_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let tmp_dir = lookup("ROLEHOST_TMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let completion = CompletionSettings {
            tmp_dir: tmp_root(&tmp_dir),
            controller_metrics_prefix: lookup("ROLEHOST_CONTROLLER_METRICS_PREFIX")
                .unwrap_or_else(|| DEFAULT_CONTROLLER_METRICS_PREFIX.to_string()),
            broker_metrics_prefix: lookup("ROLEHOST_BROKER_METRICS_PREFIX")
                .unwrap_or_else(|| DEFAULT_BROKER_METRICS_PREFIX.to_string()),
            server_metrics_prefix: lookup("ROLEHOST_SERVER_METRICS_PREFIX")
                .unwrap_or_else(|| DEFAULT_SERVER_METRICS_PREFIX.to_string()),
        };

        let port_attempts = match lookup("ROLEHOST_PORT_ATTEMPTS") {
            Some(v) => match v.parse() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidValue("ROLEHOST_PORT_ATTEMPTS", v)),
            },
            None => DEFAULT_MAX_ATTEMPTS,
        };

        let role_commands = Role::ALL
            .into_iter()
            .filter_map(|role| {
                let var = format!("ROLEHOST_{}_COMMAND", role.as_str().to_uppercase());
                lookup(&var)
                    .and_then(|line| RoleCommand::parse(&line))
                    .map(|cmd| (role, cmd))
            })
            .collect();

        Ok(Self {
            http_addr,
            tmp_dir,
            completion,
            port_attempts,
            role_commands,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
    /// A variable holds an unusable value.
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.http_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.tmp_dir, std::env::temp_dir());
        assert_eq!(config.completion, CompletionSettings::default());
        assert_eq!(config.port_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(config.role_commands.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("ROLEHOST_HTTP_PORT", "9000"),
            ("ROLEHOST_TMP_DIR", "/data/tmp"),
            ("ROLEHOST_BROKER_METRICS_PREFIX", "acme.broker."),
            ("ROLEHOST_PORT_ATTEMPTS", "4"),
            ("ROLEHOST_SERVER_COMMAND", "bin/start-server --foreground"),
        ]))
        .unwrap();

        assert_eq!(config.http_addr.port(), 9000);
        assert_eq!(config.completion.tmp_dir, "/data/tmp/");
        assert_eq!(config.completion.broker_metrics_prefix, "acme.broker.");
        assert_eq!(config.port_attempts, 4);
        assert_eq!(
            config.role_commands.get(&Role::Server),
            Some(&RoleCommand::new("bin/start-server").arg("--foreground"))
        );
        assert!(!config.role_commands.contains_key(&Role::Broker));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("ROLEHOST_HTTP_PORT", "http")])),
            Err(ConfigError::InvalidPort)
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("ROLEHOST_PORT_ATTEMPTS", "0")])),
            Err(ConfigError::InvalidValue("ROLEHOST_PORT_ATTEMPTS", _))
        ));
    }
}
