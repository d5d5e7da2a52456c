// ECR repository directory: existence checks, creation, URI lookup and login tokens

mod client;
mod token;

pub use client::EcrRegistryClient;
pub use token::decode_authorization_token;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no authorization token or proxy endpoint obtained when requesting token")]
    NoTokenOrProxyEndpoint,
    #[error("failed to decode authorization token")]
    TokenDecode(#[from] base64::DecodeError),
    #[error("invalid token: expected two parts, got {parts}")]
    InvalidToken { parts: usize },
    #[error("repository '{0}' does not exist")]
    RepositoryNotFound(String),
    #[error("{operation} failed: {message}")]
    Sdk {
        operation: &'static str,
        message: String,
    },
}

/// Short-lived registry login, decoded from an ECR authorization token
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistryAuth {
    pub proxy_endpoint: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("proxy_endpoint", &self.proxy_endpoint)
            .field("username", &self.username)
            .field("password", &"** redacted **")
            .finish()
    }
}

/// Control-plane operations on the registry
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Check whether a repository exists; "not found" is `Ok(false)`
    async fn repository_exists(&self, repository: &str) -> Result<bool, RegistryError>;

    async fn create_repository(&self, repository: &str) -> Result<(), RegistryError>;

    /// Resolve a repository name to its URI (e.g. `112233445566.dkr.ecr.us-east-1.amazonaws.com/hello/world`)
    async fn repository_uri(&self, repository: &str) -> Result<String, RegistryError>;

    /// Fetch and decode a fresh registry login
    async fn authorization_token(&self) -> Result<RegistryAuth, RegistryError>;
}

/// Ensure a repository exists, creating it if needed, and return its URI
///
/// There is no rollback: a repository created before a failed URI lookup stays created.
pub async fn setup_repository(
    client: &dyn RegistryClient,
    repository: &str,
) -> Result<String, RegistryError> {
    if !client.repository_exists(repository).await? {
        client.create_repository(repository).await?;
    }

    client.repository_uri(repository).await
}
