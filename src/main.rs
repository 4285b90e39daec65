use anyhow::{anyhow, Context};
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use dotenv::dotenv;
use dsql_auth::logging::{init_logging, LogLevel};
use dsql_auth::{ProviderCredentialSource, TokenConfig, TokenGenerator};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Generate an authentication token for Aurora DSQL
#[derive(Debug, Parser)]
#[command(name = "dsql-token", version)]
struct Cli {
    /// The hostname of the Aurora DSQL database
    #[arg(long)]
    hostname: String,

    /// The AWS region. If not provided, will be auto-detected from the hostname
    #[arg(long)]
    region: Option<String>,

    /// The expiration time in seconds. Default is 900 (15 min)
    #[arg(long, value_name = "SECONDS")]
    expires_in: Option<u64>,

    /// Generate an admin token
    #[arg(long)]
    admin: bool,

    /// Log verbosity on stderr; RUST_LOG takes precedence
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // --help and --version land here too
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Load environment variables from .env file
    dotenv().ok();
    init_logging(cli.log_level);

    match run(cli).await {
        Ok(token) => {
            println!("{token}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let mut config = TokenConfig::new();
    config.set_hostname(&cli.hostname);

    // Set region if provided, otherwise try to infer from hostname
    match cli.region {
        Some(region) => {
            config.set_region(Region::new(region));
        }
        None => {
            let region = config.infer_region().context(
                "Failed to infer AWS region from hostname. \
                 Please provide region explicitly with --region.",
            )?;
            debug!(%region, "inferred region from hostname");
        }
    }

    if let Some(expires_in) = cli.expires_in {
        config.set_expires_in(expires_in);
    }

    // Default credential chain: environment, profile, container, instance metadata
    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let source = ProviderCredentialSource::from_sdk_config(&sdk_config, Handle::current())
        .context("Failed to create credentials provider")?;
    config.set_credential_source(Arc::new(source));

    let token = TokenGenerator::new()
        .generate_async(config, cli.admin)
        .await
        .map_err(|e| anyhow!(e).context("Failed to generate auth token"))?;

    token
        .into_string()
        .context("Failed to generate auth token: no token produced")
}
