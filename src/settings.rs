// Invocation settings: CLI flags, TREB_* environment variables and the user config file

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_CONTAINER_CLI: &str = "docker";

/// Global flags shared by every command
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Enables verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Amazon Resource Name (ARN) specifying the role to be assumed
    #[arg(long = "as", short = 'a', global = true, value_name = "ROLE_ARN")]
    pub role_arn: Option<String>,

    /// AWS region to be used. Also read from AWS_REGION / AWS_DEFAULT_REGION or the AWS config file
    #[arg(long, short, global = true)]
    pub region: Option<String>,

    /// AWS shared credentials profile to be used
    #[arg(long, short, global = true)]
    pub profile: Option<String>,

    /// Container CLI to use (docker or podman)
    #[arg(long, global = true)]
    pub container_cli: Option<String>,
}

/// Contents of `~/.config/trebuchet/config.toml`
#[derive(Debug, Default, Deserialize)]
pub struct FileSettings {
    pub region: Option<String>,
    pub role_arn: Option<String>,
    pub profile: Option<String>,
    pub container_cli: Option<String>,
}

/// Effective settings for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub region: Option<String>,
    pub role_arn: Option<String>,
    pub profile: Option<String>,
    pub container_cli: String,
}

/// Read an environment variable, treating empty strings as if the variable is not set.
fn env_var_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

impl Settings {
    /// Resolve settings from the flags, the environment and the config file
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (TREB_REGION, TREB_ROLE_ARN, TREB_PROFILE, TREB_CONTAINER_CLI)
    /// 3. Config file
    /// 4. Defaults (region, role and profile left to the AWS SDK)
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let file = match Self::config_path() {
            Some(path) => load_file_settings(&path)?,
            None => FileSettings::default(),
        };
        Ok(Self::merge(args, env_var_non_empty, file))
    }

    /// Config file location: $TREB_CONFIG, else ~/.config/trebuchet/config.toml
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = env_var_non_empty("TREB_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::home_dir().map(|home| home.join(".config").join("trebuchet").join("config.toml"))
    }

    fn merge(
        args: &GlobalArgs,
        env: impl Fn(&str) -> Option<String>,
        file: FileSettings,
    ) -> Self {
        let pick = |flag: &Option<String>, var: &str, file: Option<String>| {
            flag.clone()
                .filter(|v| !v.is_empty())
                .or_else(|| env(var))
                .or_else(|| file.filter(|v| !v.is_empty()))
        };

        Self {
            region: pick(&args.region, "TREB_REGION", file.region),
            role_arn: pick(&args.role_arn, "TREB_ROLE_ARN", file.role_arn),
            profile: pick(&args.profile, "TREB_PROFILE", file.profile),
            container_cli: pick(&args.container_cli, "TREB_CONTAINER_CLI", file.container_cli)
                .unwrap_or_else(|| DEFAULT_CONTAINER_CLI.to_string()),
        }
    }
}

/// Load the config file; a missing file yields empty settings
///
/// Unknown fields are reported as warnings rather than rejected.
pub fn load_file_settings(path: &Path) -> Result<FileSettings> {
    if !path.exists() {
        debug!("No config file at {}", path.display());
        return Ok(FileSettings::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let mut unused_fields = Vec::new();
    let deserializer = toml::Deserializer::new(&content);
    let settings: FileSettings = serde_ignored::deserialize(deserializer, |field| {
        unused_fields.push(field.to_string());
    })
    .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    for field in &unused_fields {
        warn!(
            "Unknown configuration field in {}: {}",
            path.display(),
            field
        );
    }

    Ok(settings)
}
