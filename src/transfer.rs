// Image transfer sequences against the local runtime: tag/push/untag and pull/retag

use thiserror::Error;
use tracing::warn;

use crate::ecr::RegistryAuth;
use crate::runtime::{ContainerRuntime, RuntimeError};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// Both the push and the removal of the push tag failed
    #[error("{push}: {cleanup}")]
    PushWithCleanup {
        push: RuntimeError,
        cleanup: RuntimeError,
    },
}

/// Repository name of an image reference: everything before the first `:`
pub fn repository_from_image(image: &str) -> &str {
    match image.split_once(':') {
        Some((repository, _)) => repository,
        None => image,
    }
}

/// Full ECR reference for `image`: the repository URI plus the image's tag, if any
pub fn full_image_reference(repository_uri: &str, image: &str) -> String {
    match image.split_once(':') {
        Some((_, tag)) if !tag.is_empty() => format!("{}:{}", repository_uri, tag),
        _ => repository_uri.to_string(),
    }
}

/// The temporary tag created for a push
///
/// `release` removes it and reports the outcome. If the guard is dropped without
/// being released (e.g. while unwinding) the tag is still removed.
struct PushTag<'a> {
    runtime: &'a dyn ContainerRuntime,
    reference: String,
    released: bool,
}

impl<'a> PushTag<'a> {
    fn new(runtime: &'a dyn ContainerRuntime, reference: String) -> Self {
        Self {
            runtime,
            reference,
            released: false,
        }
    }

    fn reference(&self) -> &str {
        &self.reference
    }

    fn release(mut self) -> Result<(), RuntimeError> {
        self.released = true;
        self.runtime.remove(&self.reference)
    }
}

impl Drop for PushTag<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.runtime.remove(&self.reference) {
                warn!(image = %self.reference, error = %err, "Failed to remove push tag");
            }
        }
    }
}

/// Tag `image` with its ECR reference, push it, then remove the tag again
///
/// The tag is removed whatever the push outcome. When both fail the errors are
/// merged as `"<push error>: <cleanup error>"`.
pub fn tag_and_push(
    runtime: &dyn ContainerRuntime,
    image: &str,
    repository_uri: &str,
    auth: &RegistryAuth,
) -> Result<(), TransferError> {
    let target = full_image_reference(repository_uri, image);

    runtime.tag(image, &target)?;
    let tag = PushTag::new(runtime, target);

    let pushed = runtime.push(tag.reference(), auth);
    let cleanup = tag.release();

    match (pushed, cleanup) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(push), Ok(())) => Err(push.into()),
        (Ok(()), Err(cleanup)) => Err(cleanup.into()),
        (Err(push), Err(cleanup)) => Err(TransferError::PushWithCleanup { push, cleanup }),
    }
}

/// Pull `image` from its ECR repository, optionally re-tagging it under the bare name
///
/// Stripping adds a tag; the registry-qualified name is kept.
pub fn pull(
    runtime: &dyn ContainerRuntime,
    image: &str,
    repository_uri: &str,
    strip: bool,
    auth: &RegistryAuth,
) -> Result<(), TransferError> {
    let reference = full_image_reference(repository_uri, image);

    runtime.pull(&reference, auth)?;

    if strip {
        runtime.tag(&reference, image)?;
    }

    Ok(())
}
