use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aws;
mod commands;
mod ecr;
mod runtime;
mod settings;
#[cfg(test)]
mod testing;
mod transfer;

use aws::CredentialResolver;
use ecr::EcrRegistryClient;
use runtime::CliRuntime;
use settings::{GlobalArgs, Settings};

/// Easily interact with Amazon ECR.
///
/// Trebuchet pushes Docker images to Amazon Elastic Container Registry (ECR) and pulls
/// them back. Credentials are resolved the way the AWS CLI does it: environment
/// variables (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY), ~/.aws/credentials and
/// ~/.aws/config, or the files named by AWS_SHARED_CREDENTIALS_FILE / AWS_CONFIG_FILE.
///
/// Passing --as with a role ARN assumes that role first, e.g. for a CI service account.
#[derive(Parser, Debug)]
#[command(name = "treb", author, version, verbatim_doc_comment)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push a Docker image into ECR, creating the repository if needed
    #[command(visible_aliases = ["launch", "fling"])]
    Push {
        /// Image to push (NAME[:TAG])
        image: String,
    },
    /// Pull a Docker image from ECR
    Pull {
        /// Image to pull (NAME[:TAG])
        image: String,
        /// Also tag the pulled image without the ECR registry prefix
        /// (112233445566.dkr.ecr.us-east-1.amazonaws.com/hello-world:latest → hello-world:latest)
        #[arg(
            long,
            short,
            default_value_t = true,
            action = ArgAction::Set,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "true"
        )]
        strip: bool,
    },
    /// Print the full URI of an existing ECR repository
    #[command(visible_alias = "repo")]
    Repository {
        /// Repository name (e.g. some/project/helloworld)
        repository: String,
    },
}

fn init_tracing(cli: &Cli) {
    // Keep `repository` output pipeable: only errors unless verbose
    let default_filter = if cli.global.verbose {
        "info,treb=debug"
    } else if matches!(cli.command, Commands::Repository { .. }) {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_args(&cli.global)?;

    let session = CredentialResolver::new()
        .resolve(
            settings.region.as_deref(),
            settings.role_arn.as_deref(),
            settings.profile.as_deref(),
        )
        .await
        .context("Error in creation of ECR client")?;
    let registry = EcrRegistryClient::new(&session);

    match &cli.command {
        Commands::Push { image } => {
            let runtime = CliRuntime::new(&settings.container_cli);
            commands::push::push_image(&registry, &runtime, image).await
        }
        Commands::Pull { image, strip } => {
            let runtime = CliRuntime::new(&settings.container_cli);
            commands::pull::pull_image(&registry, &runtime, image, *strip).await
        }
        Commands::Repository { repository } => {
            let uri = commands::repository::lookup_repository(&registry, repository).await?;
            println!("{}", uri);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(err) = run(cli).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
