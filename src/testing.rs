// In-memory registry and runtime used by the workflow tests

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::ecr::{RegistryAuth, RegistryClient, RegistryError};
use crate::runtime::{ContainerRuntime, RuntimeError};

pub(crate) fn fake_auth() -> RegistryAuth {
    RegistryAuth {
        proxy_endpoint: "https://someurl".to_string(),
        username: "AWS".to_string(),
        password: "ecrregistrycredentials".to_string(),
    }
}

#[derive(Default)]
pub(crate) struct FakeRegistry {
    repositories: Mutex<HashSet<String>>,
    failing: HashSet<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_repository(self, repository: &str) -> Self {
        self.repositories
            .lock()
            .unwrap()
            .insert(repository.to_string());
        self
    }

    /// Make `operation` fail with an SDK error whose message is "error"
    pub(crate) fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn has_repository(&self, repository: &str) -> bool {
        self.repositories.lock().unwrap().contains(repository)
    }

    fn record(&self, operation: &'static str, arg: &str) -> Result<(), RegistryError> {
        let call = if arg.is_empty() {
            operation.to_string()
        } else {
            format!("{} {}", operation, arg)
        };
        self.calls.lock().unwrap().push(call);

        if self.failing.contains(operation) {
            return Err(RegistryError::Sdk {
                operation,
                message: "error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn repository_exists(&self, repository: &str) -> Result<bool, RegistryError> {
        self.record("repository_exists", repository)?;
        Ok(self.has_repository(repository))
    }

    async fn create_repository(&self, repository: &str) -> Result<(), RegistryError> {
        self.record("create_repository", repository)?;
        self.repositories
            .lock()
            .unwrap()
            .insert(repository.to_string());
        Ok(())
    }

    async fn repository_uri(&self, repository: &str) -> Result<String, RegistryError> {
        self.record("repository_uri", repository)?;
        if !self.has_repository(repository) {
            return Err(RegistryError::RepositoryNotFound(repository.to_string()));
        }
        Ok(format!("someurl/{}", repository))
    }

    async fn authorization_token(&self) -> Result<RegistryAuth, RegistryError> {
        self.record("authorization_token", "")?;
        Ok(fake_auth())
    }
}

#[derive(Default)]
pub(crate) struct FakeRuntime {
    images: Mutex<HashSet<String>>,
    failing: HashSet<&'static str>,
    calls: Mutex<Vec<String>>,
    auths: Mutex<Vec<RegistryAuth>>,
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_image(self, image: &str) -> Self {
        self.images.lock().unwrap().insert(image.to_string());
        self
    }

    /// Make `operation` (image_exists, tag, remove, push, pull) fail
    pub(crate) fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn auths(&self) -> Vec<RegistryAuth> {
        self.auths.lock().unwrap().clone()
    }

    pub(crate) fn has_image(&self, image: &str) -> bool {
        self.images.lock().unwrap().contains(image)
    }

    fn record(&self, operation: &'static str, call: String) -> Result<(), RuntimeError> {
        self.calls.lock().unwrap().push(call);

        if self.failing.contains(operation) {
            let command = match operation {
                "image_exists" => "images",
                "remove" => "rmi",
                other => other,
            };
            return Err(RuntimeError::CommandFailed {
                cli: "docker".to_string(),
                command,
                status: "error".to_string(),
            });
        }
        Ok(())
    }
}

impl ContainerRuntime for FakeRuntime {
    fn image_exists(&self, image: &str) -> Result<bool, RuntimeError> {
        self.record("image_exists", format!("image_exists {}", image))?;
        Ok(self.has_image(image))
    }

    fn tag(&self, source: &str, target: &str) -> Result<(), RuntimeError> {
        self.record("tag", format!("tag {} {}", source, target))?;
        self.images.lock().unwrap().insert(target.to_string());
        Ok(())
    }

    fn remove(&self, image: &str) -> Result<(), RuntimeError> {
        self.record("remove", format!("remove {}", image))?;
        self.images.lock().unwrap().remove(image);
        Ok(())
    }

    fn push(&self, image: &str, auth: &RegistryAuth) -> Result<(), RuntimeError> {
        self.auths.lock().unwrap().push(auth.clone());
        self.record("push", format!("push {}", image))
    }

    fn pull(&self, image: &str, auth: &RegistryAuth) -> Result<(), RuntimeError> {
        self.auths.lock().unwrap().push(auth.clone());
        self.record("pull", format!("pull {}", image))?;
        self.images.lock().unwrap().insert(image.to_string());
        Ok(())
    }
}
