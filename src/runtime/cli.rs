// Container runtime driven through the docker/podman CLI

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::{ContainerRuntime, RuntimeError};
use crate::ecr::RegistryAuth;

/// Runtime backed by a container CLI (`docker` or `podman`)
///
/// Registry logins go to a throwaway auth store that lives only for one push or
/// pull, so ECR tokens never reach the user's `~/.docker/config.json`.
pub struct CliRuntime {
    cli: String,
}

/// Temporary registry credentials for one push or pull
struct AuthStore {
    dir: TempDir,
    /// Daemon endpoint of the user's active docker context
    docker_host: Option<String>,
}

impl CliRuntime {
    pub fn new(cli: impl Into<String>) -> Self {
        Self { cli: cli.into() }
    }

    fn is_podman(&self) -> bool {
        Path::new(&self.cli)
            .file_name()
            .is_some_and(|name| name == "podman")
    }

    /// Endpoint of the active docker context, as seen with the user's own config
    ///
    /// `docker --config <dir>` also drops `currentContext`, so commands using the
    /// auth store have to be pointed at the daemon explicitly.
    fn active_docker_host(&self) -> Option<String> {
        if self.is_podman() {
            return None;
        }

        let mut cmd = Command::new(&self.cli);
        cmd.arg("context")
            .arg("inspect")
            .arg("--format")
            .arg("{{.Endpoints.docker.Host}}")
            .stderr(Stdio::null());

        debug!("Executing command: {:?}", cmd);

        match cmd.output() {
            Ok(output) if output.status.success() => {
                let host = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!host.is_empty()).then_some(host)
            }
            Ok(output) => {
                warn!(
                    component = "docker",
                    status = %output.status,
                    "Could not resolve the active docker context, using the default daemon"
                );
                None
            }
            Err(err) => {
                warn!(
                    component = "docker",
                    error = %err,
                    "Could not resolve the active docker context, using the default daemon"
                );
                None
            }
        }
    }

    /// Build a command that reads registry credentials from `store`
    fn command_with_auth(&self, command: &'static str, store: &AuthStore) -> Command {
        let mut cmd = Command::new(&self.cli);
        if self.is_podman() {
            cmd.arg(command)
                .arg("--authfile")
                .arg(store.dir.path().join("auth.json"));
        } else {
            cmd.arg("--config").arg(store.dir.path()).arg(command);
            if let Some(host) = &store.docker_host {
                // A context name would be looked up in the throwaway config dir
                cmd.env("DOCKER_HOST", host).env_remove("DOCKER_CONTEXT");
            }
        }
        cmd
    }

    fn run(&self, command: &'static str, mut cmd: Command) -> Result<(), RuntimeError> {
        debug!("Executing command: {:?}", cmd);

        let status = cmd.status().map_err(|source| RuntimeError::Spawn {
            cli: self.cli.clone(),
            command,
            source,
        })?;

        if !status.success() {
            return Err(RuntimeError::CommandFailed {
                cli: self.cli.clone(),
                command,
                status: status.to_string(),
            });
        }

        Ok(())
    }

    /// Log in to the registry's proxy endpoint, returning the auth store
    fn login(&self, auth: &RegistryAuth) -> Result<AuthStore, RuntimeError> {
        let spawn_err = |source| RuntimeError::Spawn {
            cli: self.cli.clone(),
            command: "login",
            source,
        };

        let store = AuthStore {
            dir: tempfile::tempdir().map_err(spawn_err)?,
            docker_host: self.active_docker_host(),
        };

        debug!(
            "Executing: {} login {} --username {} --password-stdin",
            self.cli, auth.proxy_endpoint, auth.username
        );

        let mut cmd = self.command_with_auth("login", &store);
        cmd.arg(&auth.proxy_endpoint)
            .arg("--username")
            .arg(&auth.username)
            .arg("--password-stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null());

        let status = cmd
            .spawn()
            .and_then(|mut child| {
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(auth.password.as_bytes())?;
                }
                child.wait()
            })
            .map_err(spawn_err)?;

        if !status.success() {
            return Err(RuntimeError::CommandFailed {
                cli: self.cli.clone(),
                command: "login",
                status: status.to_string(),
            });
        }

        Ok(store)
    }
}

impl ContainerRuntime for CliRuntime {
    fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        let mut cmd = Command::new(&self.cli);
        cmd.arg("images")
            .arg("-q")
            .arg("--filter")
            .arg(format!("reference={}", image));

        debug!("Executing command: {:?}", cmd);

        let output = cmd.output().map_err(|source| RuntimeError::Spawn {
            cli: self.cli.clone(),
            command: "images",
            source,
        })?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                cli: self.cli.clone(),
                command: "images",
                status: output.status.to_string(),
            });
        }

        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    fn tag(&self, source: &str, target: &str) -> Result<(), RuntimeError> {
        info!(component = "docker", source, target, "Tagging image for ECR");

        let mut cmd = Command::new(&self.cli);
        cmd.arg("tag").arg(source).arg(target);
        self.run("tag", cmd)
    }

    fn remove(&self, image: &str) -> Result<(), RuntimeError> {
        let mut cmd = Command::new(&self.cli);
        cmd.arg("rmi").arg(image).stdout(Stdio::null());
        self.run("rmi", cmd)?;

        info!(component = "docker", image, "Removed image");
        Ok(())
    }

    fn push(&self, image: &str, auth: &RegistryAuth) -> Result<(), RuntimeError> {
        let store = self.login(auth)?;

        info!(component = "docker", image, "Pushing image");
        let mut cmd = self.command_with_auth("push", &store);
        cmd.arg(image);
        self.run("push", cmd)
    }

    fn pull(&self, image: &str, auth: &RegistryAuth) -> Result<(), RuntimeError> {
        let store = self.login(auth)?;

        info!(component = "docker", image, "Pulling image");
        let mut cmd = self.command_with_auth("pull", &store);
        cmd.arg(image);
        self.run("pull", cmd)
    }
}
