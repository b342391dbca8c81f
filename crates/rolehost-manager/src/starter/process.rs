// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process starter.
//!
//! Boots each role as a child process. The completed configuration is
//! written to `<work_dir>/<instance_id>/config.json` and its path appended
//! as the last argument. The child also sees `ROLEHOST_ROLE` and
//! `ROLEHOST_INSTANCE_ID` in its environment.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::traits::*;
use crate::completion::ConfigDocument;
use crate::role::Role;

/// Command line used to boot a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCommand {
    /// Executable, resolved through `PATH` when not absolute.
    pub program: PathBuf,
    /// Leading arguments; the config path follows them.
    pub args: Vec<String>,
}

impl RoleCommand {
    /// Command without leading arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a leading argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Split a whitespace-separated command line. `None` if blank.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self {
            program: PathBuf::from(program),
            args: parts.map(str::to_string).collect(),
        })
    }
}

/// Starter that launches one command per role.
pub struct ProcessStarter {
    commands: HashMap<Role, RoleCommand>,
    work_dir: PathBuf,
    children: Mutex<HashMap<String, Child>>,
}

impl ProcessStarter {
    /// Create a starter writing instance directories under `work_dir`.
    pub fn new(commands: HashMap<Role, RoleCommand>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands,
            work_dir: work_dir.into(),
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Roles this starter can boot.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.commands.keys().copied().collect();
        roles.sort();
        roles
    }
}

#[async_trait]
impl Starter for ProcessStarter {
    fn starter_type(&self) -> &'static str {
        "process"
    }

    async fn start(&self, role: Role, config: &ConfigDocument) -> Result<Option<String>> {
        let command = self
            .commands
            .get(&role)
            .ok_or(StarterError::NoCommand(role))?;

        let instance_id = format!("{}_{}", role, uuid::Uuid::new_v4().simple());
        let instance_dir = self.work_dir.join(&instance_id);
        tokio::fs::create_dir_all(&instance_dir).await?;

        let config_path = instance_dir.join("config.json");
        tokio::fs::write(&config_path, serde_json::to_vec_pretty(config)?).await?;

        let spawned = Command::new(&command.program)
            .args(&command.args)
            .arg(&config_path)
            .env("ROLEHOST_ROLE", role.as_str())
            .env("ROLEHOST_INSTANCE_ID", &instance_id)
            .current_dir(&instance_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_dir_all(&instance_dir).await {
                    warn!(
                        path = %instance_dir.display(),
                        error = %cleanup,
                        "Failed to remove instance directory"
                    );
                }
                return Err(StarterError::StartFailed(format!(
                    "{}: {}",
                    command.program.display(),
                    e
                )));
            }
        };

        info!(
            instance_id = %instance_id,
            role = %role,
            pid = child.id(),
            program = %command.program.display(),
            "Spawned instance process"
        );

        self.children.lock().await.insert(instance_id.clone(), child);
        Ok(Some(instance_id))
    }

    async fn stop(&self, instance_id: &str) -> Result<()> {
        let mut children = self.children.lock().await;
        let child = children
            .get_mut(instance_id)
            .ok_or_else(|| StarterError::UnknownInstance(instance_id.to_string()))?;

        match child.try_wait()? {
            Some(status) => {
                warn!(instance_id = %instance_id, %status, "Instance had already exited");
            }
            None => {
                child
                    .kill()
                    .await
                    .map_err(|e| StarterError::StopFailed(e.to_string()))?;
                info!(instance_id = %instance_id, "Killed instance process");
            }
        }

        children.remove(instance_id);
        Ok(())
    }

    async fn status_of(&self, instance_id: &str) -> Result<InstanceState> {
        let mut children = self.children.lock().await;
        let child = children
            .get_mut(instance_id)
            .ok_or_else(|| StarterError::UnknownInstance(instance_id.to_string()))?;

        Ok(match child.try_wait()? {
            Some(_) => InstanceState::Exited,
            None => InstanceState::Running,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> ConfigDocument {
        let mut config = ConfigDocument::new();
        config.insert("pinot.server.netty.port".to_string(), serde_json::json!(8098));
        config
    }

    #[test]
    fn test_parse_command_line() {
        let cmd = RoleCommand::parse("  java -jar pinot.jar StartServer -configFileName ").unwrap();
        assert_eq!(cmd.program, PathBuf::from("java"));
        assert_eq!(
            cmd.args,
            vec!["-jar", "pinot.jar", "StartServer", "-configFileName"]
        );
        assert!(RoleCommand::parse("   ").is_none());
    }

    #[tokio::test]
    async fn test_start_writes_config_and_runs() {
        let temp = tempfile::TempDir::new().unwrap();
        let starter = ProcessStarter::new(
            HashMap::from([(Role::Server, RoleCommand::new("tail").arg("-f"))]),
            temp.path().join("instances"),
        );

        let id = starter.start(Role::Server, &config()).await.unwrap().unwrap();

        let written = std::fs::read(temp.path().join("instances").join(&id).join("config.json"))
            .unwrap();
        let written: ConfigDocument = serde_json::from_slice(&written).unwrap();
        assert_eq!(written, config());
        assert_eq!(starter.status_of(&id).await.unwrap(), InstanceState::Running);

        starter.stop(&id).await.unwrap();
        assert!(matches!(
            starter.status_of(&id).await,
            Err(StarterError::UnknownInstance(_))
        ));
    }

    #[tokio::test]
    async fn test_exited_process_is_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let starter = ProcessStarter::new(
            HashMap::from([(Role::Broker, RoleCommand::new("cat"))]),
            temp.path().to_path_buf(),
        );

        let id = starter.start(Role::Broker, &config()).await.unwrap().unwrap();

        let mut state = InstanceState::Running;
        for _ in 0..100 {
            state = starter.status_of(&id).await.unwrap();
            if state == InstanceState::Exited {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(state, InstanceState::Exited);

        starter.stop(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_role_without_command() {
        let temp = tempfile::TempDir::new().unwrap();
        let starter = ProcessStarter::new(HashMap::new(), temp.path().to_path_buf());

        let err = starter.start(Role::Controller, &config()).await.unwrap_err();
        assert!(matches!(err, StarterError::NoCommand(Role::Controller)));
        assert!(starter.roles().is_empty());
    }

    #[tokio::test]
    async fn test_missing_executable_leaves_no_instance_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let work_dir = temp.path().join("work");
        let starter = ProcessStarter::new(
            HashMap::from([(
                Role::Server,
                RoleCommand::new(temp.path().join("does-not-exist")),
            )]),
            work_dir.clone(),
        );

        let err = starter.start(Role::Server, &config()).await.unwrap_err();
        assert!(matches!(err, StarterError::StartFailed(_)));
        assert_eq!(std::fs::read_dir(&work_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_stop_unknown_instance() {
        let temp = tempfile::TempDir::new().unwrap();
        let starter = ProcessStarter::new(HashMap::new(), temp.path().to_path_buf());
        assert!(matches!(
            starter.stop("nope").await,
            Err(StarterError::UnknownInstance(_))
        ));
    }
}
