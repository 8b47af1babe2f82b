//! Container runtime: the black box that recreates services.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use netsync_core::{DeployableUnit, RestartConfig, StoreConfig};

use crate::error::{RuntimeError, RuntimeResult};

/// Stops, removes and brings back the named units, leaving every other
/// container untouched.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn recreate(&self, units: &[DeployableUnit]) -> RuntimeResult<()>;
}

/// Recreates units through the `docker` CLI and compose.
#[derive(Debug, Clone)]
pub struct ComposeRuntime {
    docker_bin: String,
    compose_file: PathBuf,
    project_name: Option<String>,
}

impl ComposeRuntime {
    pub fn new(
        docker_bin: impl Into<String>,
        compose_file: impl Into<PathBuf>,
        project_name: Option<String>,
    ) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            compose_file: compose_file.into(),
            project_name,
        }
    }

    pub fn from_config(restart: &RestartConfig, store: &StoreConfig) -> Self {
        Self::new(
            &restart.docker_bin,
            &store.compose_file,
            restart.project_name.clone(),
        )
    }

    /// Argument lists for the two commands run per recreation:
    /// `rm -f <containers>` then `compose ... up <services>`.
    pub fn commands(&self, units: &[DeployableUnit]) -> Vec<Vec<String>> {
        let mut containers: Vec<String> = units.iter().map(|u| u.container.clone()).collect();
        containers.sort();
        containers.dedup();
        let mut services: Vec<String> = units.iter().map(|u| u.service.clone()).collect();
        services.sort();
        services.dedup();

        let mut remove = vec!["rm".to_string(), "-f".to_string()];
        remove.extend(containers);

        let mut up = vec![
            "compose".to_string(),
            "-f".to_string(),
            self.compose_file.display().to_string(),
        ];
        if let Some(project) = &self.project_name {
            up.push("--project-name".to_string());
            up.push(project.clone());
        }
        up.extend(
            ["up", "-d", "--force-recreate", "--remove-orphans", "--no-deps"]
                .iter()
                .map(|s| s.to_string()),
        );
        up.extend(services);

        vec![remove, up]
    }

    async fn run(&self, args: &[String]) -> RuntimeResult<()> {
        let command = format!("{} {}", self.docker_bin, args.join(" "));
        debug!(%command, "running");

        let status = tokio::process::Command::new(&self.docker_bin)
            .args(args)
            .status()
            .await
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(RuntimeError::Failed { command, status });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for ComposeRuntime {
    async fn recreate(&self, units: &[DeployableUnit]) -> RuntimeResult<()> {
        if units.is_empty() {
            return Err(RuntimeError::NoUnits);
        }
        for args in self.commands(units) {
            self.run(&args).await?;
        }
        info!(count = units.len(), "containers recreated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> Vec<DeployableUnit> {
        vec![
            DeployableUnit::new("frontend", "blockscout-frontend"),
            DeployableUnit::new("backend", "blockscout-backend"),
            DeployableUnit::new("frontend", "blockscout-frontend"),
        ]
    }

    #[test]
    fn commands_remove_then_recreate_only_named_services() {
        let runtime = ComposeRuntime::new(
            "docker",
            "/srv/docker-compose.yaml",
            Some("blockscout".to_string()),
        );
        let commands = runtime.commands(&units());
        assert_eq!(
            commands[0],
            vec!["rm", "-f", "blockscout-backend", "blockscout-frontend"]
        );
        assert_eq!(
            commands[1],
            vec![
                "compose",
                "-f",
                "/srv/docker-compose.yaml",
                "--project-name",
                "blockscout",
                "up",
                "-d",
                "--force-recreate",
                "--remove-orphans",
                "--no-deps",
                "backend",
                "frontend",
            ]
        );
    }

    #[test]
    fn project_name_is_optional() {
        let runtime = ComposeRuntime::new("docker", "compose.yaml", None);
        let commands = runtime.commands(&units());
        assert!(!commands[1].contains(&"--project-name".to_string()));
    }

    #[tokio::test]
    async fn empty_unit_list_is_rejected() {
        let runtime = ComposeRuntime::new("docker", "compose.yaml", None);
        assert!(matches!(
            runtime.recreate(&[]).await,
            Err(RuntimeError::NoUnits)
        ));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let runtime = ComposeRuntime::new("/nonexistent/docker", "compose.yaml", None);
        let err = runtime.recreate(&units()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Spawn { .. }));
        assert!(err.to_string().contains("rm -f"));
    }
}
