use anyhow::{Context, Result};

use crate::ecr::RegistryClient;

/// Look up the URI of an existing repository
pub async fn lookup_repository(registry: &dyn RegistryClient, repository: &str) -> Result<String> {
    registry
        .repository_uri(repository)
        .await
        .context("Error getting repository URI")
}
