// Local container runtime (docker or podman) operations

mod cli;

pub use cli::CliRuntime;

use thiserror::Error;

use crate::ecr::RegistryAuth;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("image not found on container host: {0}")]
    ImageNotFound(String),
    #[error("failed to execute {cli} {command}")]
    Spawn {
        cli: String,
        command: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{cli} {command} failed: {status}")]
    CommandFailed {
        cli: String,
        command: &'static str,
        status: String,
    },
}

/// Image operations the transfer workflows need from the local runtime
pub trait ContainerRuntime {
    fn image_exists(&self, image: &str) -> Result<bool, RuntimeError>;

    /// Add `target` as an additional name for `source`
    fn tag(&self, source: &str, target: &str) -> Result<(), RuntimeError>;

    /// Remove an image reference (untag)
    fn remove(&self, image: &str) -> Result<(), RuntimeError>;

    /// Push an image, streaming progress to stdout
    fn push(&self, image: &str, auth: &RegistryAuth) -> Result<(), RuntimeError>;

    fn pull(&self, image: &str, auth: &RegistryAuth) -> Result<(), RuntimeError>;
}
