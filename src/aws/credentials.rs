// Credential resolution: ambient AWS config, optional role assumption, region validation

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_sdk_sts::error::DisplayErrorContext;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{format_sdk_error, region::is_ecr_region};

/// Session name used for every STS AssumeRole call
pub const ROLE_SESSION_NAME: &str = "TrebuchetAssumedRole";

/// Provider name the AWS SDK stamps on credentials obtained through STS AssumeRole
const ASSUME_ROLE_PROVIDER: &str = "AssumeRoleProvider";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credentials provided{}", reason_suffix(.reason))]
    NoCredentials { reason: Option<String> },
    #[error("no STS credentials were found")]
    NoStsCredentials,
    #[error("no region configured; pass --region, set AWS_REGION or configure a region for the profile")]
    MissingRegion,
    #[error("region '{0}' does not resolve to an ECR endpoint")]
    UnknownRegion(String),
    #[error("failed to assume role '{role_arn}': {message}")]
    AssumeRole { role_arn: String, message: String },
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|reason| format!(": {reason}"))
        .unwrap_or_default()
}

/// Where the session credentials came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    /// Environment, shared credentials file, SSO, instance profile, ...
    Ambient,
    /// Result of an STS AssumeRole exchange (ours or one chained by the profile)
    AssumedRole,
}

impl CredentialOrigin {
    fn of(credentials: &Credentials) -> Self {
        // The provider name is only exposed through Debug; the secret is redacted there.
        let debug_str = format!("{:?}", credentials);
        if debug_str.contains(&format!("\"{}\"", ASSUME_ROLE_PROVIDER)) {
            CredentialOrigin::AssumedRole
        } else {
            CredentialOrigin::Ambient
        }
    }
}

/// Region and credentials loaded from the environment and shared config files
#[derive(Debug, Clone, Default)]
pub struct AmbientConfig {
    pub region: Option<String>,
    pub credentials: Option<Credentials>,
    /// Why the default credential chain produced nothing, if it said so
    pub credentials_error: Option<String>,
}

/// An authenticated session for one invocation
///
/// Credentials are resolved once and never refreshed; they outlive any single run.
#[derive(Debug, Clone)]
pub struct Session {
    pub region: String,
    pub credentials: Credentials,
    pub origin: CredentialOrigin,
}

/// Loads ambient AWS configuration, optionally for a named profile
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load(&self, profile: Option<&str>) -> AmbientConfig;
}

/// Exchanges the session's credentials for credentials of the given role
#[async_trait]
pub trait RoleAssumer: Send + Sync {
    async fn assume_role(
        &self,
        session: &Session,
        role_arn: &str,
    ) -> Result<Credentials, CredentialError>;
}

/// Loads configuration through the AWS SDK default provider chains
pub struct SdkConfigLoader;

#[async_trait]
impl ConfigLoader for SdkConfigLoader {
    async fn load(&self, profile: Option<&str>) -> AmbientConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        let region = sdk_config.region().map(|r| r.to_string());
        let mut config = AmbientConfig {
            region,
            ..Default::default()
        };
        if let Some(provider) = sdk_config.credentials_provider() {
            match provider.provide_credentials().await {
                Ok(credentials) => config.credentials = Some(credentials),
                Err(err) => {
                    let reason = format!("{}", DisplayErrorContext(&err));
                    warn!(error = %reason, "Default credential chain yielded no credentials");
                    config.credentials_error = Some(reason);
                }
            }
        }

        config
    }
}

/// Assumes roles through AWS STS
pub struct StsRoleAssumer;

#[async_trait]
impl RoleAssumer for StsRoleAssumer {
    async fn assume_role(
        &self,
        session: &Session,
        role_arn: &str,
    ) -> Result<Credentials, CredentialError> {
        let config = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(session.region.clone()))
            .credentials_provider(session.credentials.clone())
            .build();

        assume_role_with(&aws_sdk_sts::Client::from_conf(config), role_arn).await
    }
}

async fn assume_role_with(
    client: &aws_sdk_sts::Client,
    role_arn: &str,
) -> Result<Credentials, CredentialError> {
    let output = client
        .assume_role()
        .role_arn(role_arn)
        .role_session_name(ROLE_SESSION_NAME)
        .send()
        .await
        .map_err(|err| {
            info!(component = "sts", role = role_arn, "Error attempting to assume role");
            CredentialError::AssumeRole {
                role_arn: role_arn.to_string(),
                message: format_sdk_error(&err),
            }
        })?;

    let credentials = output
        .credentials()
        .ok_or(CredentialError::NoStsCredentials)?;

    info!(component = "sts", role = role_arn, "Successfully assumed role");
    Ok(Credentials::new(
        credentials.access_key_id(),
        credentials.secret_access_key(),
        Some(credentials.session_token().to_string()),
        SystemTime::try_from(credentials.expiration().clone()).ok(),
        ASSUME_ROLE_PROVIDER,
    ))
}

/// Builds the authenticated session for an invocation
pub struct CredentialResolver<L = SdkConfigLoader, A = StsRoleAssumer> {
    loader: L,
    assumer: A,
}

impl CredentialResolver {
    pub fn new() -> Self {
        Self::with(SdkConfigLoader, StsRoleAssumer)
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ConfigLoader, A: RoleAssumer> CredentialResolver<L, A> {
    pub fn with(loader: L, assumer: A) -> Self {
        Self { loader, assumer }
    }

    /// Resolve credentials and region into a session
    ///
    /// The region override wins over the ambient region. When `role_arn` is set the
    /// credentials are exchanged for the role's, unless they already come from an
    /// assumed role. The final region must be a known ECR endpoint region.
    pub async fn resolve(
        &self,
        region: Option<&str>,
        role_arn: Option<&str>,
        profile: Option<&str>,
    ) -> Result<Session, CredentialError> {
        if let Some(profile) = profile {
            debug!(profile, "Explicitly setting profile");
        }

        let ambient = self.loader.load(profile).await;
        let credentials = ambient
            .credentials
            .ok_or(CredentialError::NoCredentials {
                reason: ambient.credentials_error,
            })?;

        let region = match region {
            Some(region) => {
                debug!(region, "Explicitly setting region");
                region.to_string()
            }
            None => ambient.region.ok_or(CredentialError::MissingRegion)?,
        };

        // STS is called in the same region, so validate before assuming anything
        if !is_ecr_region(&region) {
            return Err(CredentialError::UnknownRegion(region));
        }

        let mut session = Session {
            region,
            origin: CredentialOrigin::of(&credentials),
            credentials,
        };

        if let Some(role_arn) = role_arn {
            if session.origin == CredentialOrigin::AssumedRole {
                debug!(
                    role = role_arn,
                    "Credentials already come from an assumed role, not assuming again"
                );
            } else {
                session.credentials = self.assumer.assume_role(&session, role_arn).await?;
                session.origin = CredentialOrigin::AssumedRole;
            }
        }

        Ok(session)
    }
}
