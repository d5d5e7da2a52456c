use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ecr::Client as EcrClient;
use tracing::{debug, info};

use super::{decode_authorization_token, RegistryAuth, RegistryClient, RegistryError};
use crate::aws::{format_sdk_error, Session};

/// ECR control-plane client bound to one session
pub struct EcrRegistryClient {
    client: EcrClient,
}

impl EcrRegistryClient {
    pub fn new(session: &Session) -> Self {
        let config = aws_sdk_ecr::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(session.region.clone()))
            .credentials_provider(session.credentials.clone())
            .build();

        Self {
            client: EcrClient::from_conf(config),
        }
    }

    #[cfg(test)]
    fn from_client(client: EcrClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RegistryClient for EcrRegistryClient {
    async fn repository_exists(&self, repository: &str) -> Result<bool, RegistryError> {
        match self
            .client
            .describe_repositories()
            .repository_names(repository)
            .send()
            .await
        {
            Ok(response) => {
                let exists = !response.repositories().is_empty();
                info!(component = "ecr", repository, exists, "Checked repository");
                Ok(exists)
            }
            Err(err) => {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_repository_not_found_exception() {
                        info!(component = "ecr", repository, "Repository does not exist");
                        return Ok(false);
                    }
                }
                Err(RegistryError::Sdk {
                    operation: "DescribeRepositories",
                    message: format_sdk_error(&err),
                })
            }
        }
    }

    async fn create_repository(&self, repository: &str) -> Result<(), RegistryError> {
        self.client
            .create_repository()
            .repository_name(repository)
            .send()
            .await
            .map_err(|err| {
                info!(component = "ecr", repository, "Error in creating repository");
                RegistryError::Sdk {
                    operation: "CreateRepository",
                    message: format_sdk_error(&err),
                }
            })?;

        info!(component = "ecr", repository, "Successfully created repository");
        Ok(())
    }

    async fn repository_uri(&self, repository: &str) -> Result<String, RegistryError> {
        let response = self
            .client
            .describe_repositories()
            .repository_names(repository)
            .send()
            .await
            .map_err(|err| {
                let not_found = err
                    .as_service_error()
                    .is_some_and(|e| e.is_repository_not_found_exception());
                if not_found {
                    RegistryError::RepositoryNotFound(repository.to_string())
                } else {
                    RegistryError::Sdk {
                        operation: "DescribeRepositories",
                        message: format_sdk_error(&err),
                    }
                }
            })?;

        let uri = response
            .repositories()
            .first()
            .and_then(|repo| repo.repository_uri())
            .ok_or_else(|| RegistryError::RepositoryNotFound(repository.to_string()))?;

        info!(component = "ecr", uri, "Repository URI");
        Ok(uri.to_string())
    }

    async fn authorization_token(&self) -> Result<RegistryAuth, RegistryError> {
        debug!(component = "ecr", "Getting authorization token");

        let response = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(|err| RegistryError::Sdk {
                operation: "GetAuthorizationToken",
                message: format_sdk_error(&err),
            })?;

        let auth_data = response
            .authorization_data()
            .first()
            .ok_or(RegistryError::NoTokenOrProxyEndpoint)?;

        match (auth_data.authorization_token(), auth_data.proxy_endpoint()) {
            (Some(token), Some(proxy_endpoint)) => {
                decode_authorization_token(token, proxy_endpoint)
            }
            _ => Err(RegistryError::NoTokenOrProxyEndpoint),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ecr::operation::describe_repositories::{
        DescribeRepositoriesError, DescribeRepositoriesOutput,
    };
    use aws_sdk_ecr::operation::get_authorization_token::GetAuthorizationTokenOutput;
    use aws_sdk_ecr::types::error::{RepositoryNotFoundException, ServerException};
    use aws_sdk_ecr::types::{AuthorizationData, Repository};
    use aws_smithy_mocks::{mock, mock_client};
    use base64::{engine::general_purpose, Engine as _};

    const URI: &str = "112233445566.dkr.ecr.us-east-1.amazonaws.com/hello/world";

    fn not_found() -> DescribeRepositoriesError {
        DescribeRepositoriesError::RepositoryNotFoundException(
            RepositoryNotFoundException::builder()
                .message("The repository with name 'hello/world' does not exist")
                .build(),
        )
    }

    fn with_repository() -> DescribeRepositoriesOutput {
        DescribeRepositoriesOutput::builder()
            .repositories(
                Repository::builder()
                    .repository_name("hello/world")
                    .repository_uri(URI)
                    .build(),
            )
            .build()
    }

    fn token_output(token: Option<&str>, endpoint: Option<&str>) -> GetAuthorizationTokenOutput {
        GetAuthorizationTokenOutput::builder()
            .authorization_data(
                AuthorizationData::builder()
                    .set_authorization_token(token.map(String::from))
                    .set_proxy_endpoint(endpoint.map(String::from))
                    .build(),
            )
            .build()
    }

    #[tokio::test]
    async fn test_repository_exists_maps_not_found_to_false() {
        let rule = mock!(aws_sdk_ecr::Client::describe_repositories).then_error(not_found);
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        assert!(!client.repository_exists("hello/world").await.unwrap());
    }

    #[tokio::test]
    async fn test_repository_exists_finds_repository() {
        let rule = mock!(aws_sdk_ecr::Client::describe_repositories).then_output(with_repository);
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        assert!(client.repository_exists("hello/world").await.unwrap());
    }

    #[tokio::test]
    async fn test_repository_exists_returns_other_service_errors() {
        let rule = mock!(aws_sdk_ecr::Client::describe_repositories).then_error(|| {
            DescribeRepositoriesError::ServerException(
                ServerException::builder().message("internal failure").build(),
            )
        });
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let err = client.repository_exists("hello/world").await.unwrap_err();

        assert!(matches!(
            err,
            RegistryError::Sdk {
                operation: "DescribeRepositories",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_repository_uri_returns_uri() {
        let rule = mock!(aws_sdk_ecr::Client::describe_repositories).then_output(with_repository);
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        assert_eq!(client.repository_uri("hello/world").await.unwrap(), URI);
    }

    #[tokio::test]
    async fn test_repository_uri_maps_not_found() {
        let rule = mock!(aws_sdk_ecr::Client::describe_repositories).then_error(not_found);
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let err = client.repository_uri("hello/world").await.unwrap_err();

        assert!(matches!(err, RegistryError::RepositoryNotFound(ref r) if r == "hello/world"));
    }

    #[tokio::test]
    async fn test_repository_uri_without_repositories_is_not_found() {
        let rule = mock!(aws_sdk_ecr::Client::describe_repositories)
            .then_output(|| DescribeRepositoriesOutput::builder().build());
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let err = client.repository_uri("hello/world").await.unwrap_err();

        assert!(matches!(err, RegistryError::RepositoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_authorization_token_decodes_login() {
        let rule = mock!(aws_sdk_ecr::Client::get_authorization_token).then_output(|| {
            let token = general_purpose::STANDARD.encode("AWS:ecrregistrycredentials");
            token_output(Some(&token), Some("https://someurl"))
        });
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let auth = client.authorization_token().await.unwrap();

        assert_eq!(auth.proxy_endpoint, "https://someurl");
        assert_eq!(auth.username, "AWS");
        assert_eq!(auth.password, "ecrregistrycredentials");
    }

    #[tokio::test]
    async fn test_authorization_token_without_data() {
        let rule = mock!(aws_sdk_ecr::Client::get_authorization_token)
            .then_output(|| GetAuthorizationTokenOutput::builder().build());
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let err = client.authorization_token().await.unwrap_err();

        assert!(matches!(err, RegistryError::NoTokenOrProxyEndpoint));
    }

    #[tokio::test]
    async fn test_authorization_token_without_proxy_endpoint() {
        let rule = mock!(aws_sdk_ecr::Client::get_authorization_token)
            .then_output(|| token_output(Some("QVdTOnBhc3N3b3Jk"), None));
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let err = client.authorization_token().await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "no authorization token or proxy endpoint obtained when requesting token"
        );
    }

    #[tokio::test]
    async fn test_authorization_token_without_token() {
        let rule = mock!(aws_sdk_ecr::Client::get_authorization_token)
            .then_output(|| token_output(None, Some("https://someurl")));
        let client = EcrRegistryClient::from_client(mock_client!(aws_sdk_ecr, [&rule]));

        let err = client.authorization_token().await.unwrap_err();

        assert!(matches!(err, RegistryError::NoTokenOrProxyEndpoint));
    }
}
