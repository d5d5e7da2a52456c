use anyhow::{Context, Result};
use tracing::info;

use crate::ecr::{RegistryClient, RegistryError};
use crate::runtime::ContainerRuntime;
use crate::transfer::{self, repository_from_image};

/// Pull an image from its ECR repository
///
/// With `strip`, the pulled image is additionally tagged with the name the user gave.
pub async fn pull_image(
    registry: &dyn RegistryClient,
    runtime: &dyn ContainerRuntime,
    image: &str,
    strip: bool,
) -> Result<()> {
    let repository = repository_from_image(image);

    let exists = registry
        .repository_exists(repository)
        .await
        .with_context(|| format!("Error checking ECR repository '{}'", repository))?;
    if !exists {
        return Err(RegistryError::RepositoryNotFound(repository.to_string()).into());
    }

    let repository_uri = registry
        .repository_uri(repository)
        .await
        .context("Error retrieving full repository name")?;

    let auth = registry
        .authorization_token()
        .await
        .context("Error getting authorization token for ECR")?;

    transfer::pull(runtime, image, &repository_uri, strip, &auth)
        .with_context(|| format!("Error pulling Docker image '{}'", image))?;

    info!("✓ Pulled '{}' from {}", image, repository_uri);
    Ok(())
}
