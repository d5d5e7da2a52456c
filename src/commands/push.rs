use anyhow::{Context, Result};
use tracing::info;

use crate::ecr::{setup_repository, RegistryClient};
use crate::runtime::{ContainerRuntime, RuntimeError};
use crate::transfer::{self, repository_from_image};

/// Push a local image into ECR, creating its repository when missing
pub async fn push_image(
    registry: &dyn RegistryClient,
    runtime: &dyn ContainerRuntime,
    image: &str,
) -> Result<()> {
    let exists = runtime
        .image_exists(image)
        .with_context(|| format!("Error validating Docker image '{}'", image))?;
    if !exists {
        return Err(RuntimeError::ImageNotFound(image.to_string()))
            .with_context(|| format!("Error validating Docker image '{}'", image));
    }

    let repository = repository_from_image(image);
    let repository_uri = setup_repository(registry, repository)
        .await
        .with_context(|| format!("Error setting up repository '{}' for image", repository))?;

    let auth = registry
        .authorization_token()
        .await
        .context("Error getting authorization token for ECR")?;

    transfer::tag_and_push(runtime, image, &repository_uri, &auth)
        .with_context(|| format!("Error pushing Docker image '{}'", image))?;

    info!("✓ Pushed '{}' to {}", image, repository_uri);
    Ok(())
}
