use anyhow::Result;
use clap::{Parser, Subcommand};
use evegate::cache::CacheBackend;
use evegate::config::{ConfigOptions, GatewayConfig};
use evegate::server::Server;
use evegate::{Credential, Gateway, GatewayError, OutputEnvelope};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "evegate")]
#[command(about = "Caching gateway for the EVE XML API", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.evegate/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// API base URL, e.g. https://api.eveonline.com
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// API key id
    #[arg(long, global = true, requires = "v_code")]
    key_id: Option<String>,

    /// API key verification code
    #[arg(long, global = true, requires = "key_id")]
    v_code: Option<String>,

    /// Disable response caching
    #[arg(long, global = true)]
    no_cache: bool,

    /// Cache backend: memory or file
    #[arg(long, global = true, value_name = "BACKEND")]
    cache_backend: Option<CacheBackend>,

    /// Persist the cache in this directory
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request an API path
    Get {
        /// API path (e.g., "server/ServerStatus")
        #[arg(value_name = "PATH")]
        path: String,

        /// Request parameters (e.g., "characterID=42")
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },

    /// Show server status
    Status,

    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache statistics
    Stats,
    /// Remove all cached responses
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let (envelope, ok) = match run(cli).await {
        Ok(envelope) => (envelope, true),
        Err(RunError::Gateway(path, e)) => (OutputEnvelope::from_error(path.as_deref(), &e), false),
        Err(RunError::Other(e)) => (
            OutputEnvelope::error(
                None,
                "CLI_ERROR",
                None,
                format!("{:#}", e),
                Default::default(),
            ),
            false,
        ),
    };

    println!("{}", envelope.to_json());
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

enum RunError {
    Gateway(Option<String>, GatewayError),
    Other(anyhow::Error),
}

impl From<anyhow::Error> for RunError {
    fn from(e: anyhow::Error) -> Self {
        RunError::Other(e)
    }
}

fn load_config(cli: &Cli) -> Result<GatewayConfig> {
    let config = match &cli.config {
        Some(path) => GatewayConfig::load_from_path(path)?,
        None => GatewayConfig::load_from_file()?,
    };

    let mut options = ConfigOptions::new();
    if let Some(base_url) = &cli.base_url {
        options = options.with_base_url(base_url.clone());
    }
    if let (Some(key_id), Some(v_code)) = (&cli.key_id, &cli.v_code) {
        options = options.with_credential(Credential::new(key_id, v_code.clone()));
    }
    if cli.no_cache {
        options = options.with_cache_enabled(false);
    }
    if let Some(backend) = cli.cache_backend {
        options = options.with_cache_backend(backend);
    }
    if let Some(dir) = &cli.cache_dir {
        options = options.with_cache_dir(dir.clone());
    }

    Ok(config.with_options(options))
}

fn parse_params(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|param| {
            param
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("Invalid parameter '{}', expected NAME=VALUE", param))
        })
        .collect()
}

async fn run(cli: Cli) -> std::result::Result<OutputEnvelope, RunError> {
    let config = load_config(&cli)?;
    debug!("Loaded configuration: {:?}", config);

    let gateway = Gateway::new(config).map_err(|e| RunError::Gateway(None, e))?;

    match cli.command {
        Commands::Get { path, params } => {
            let params = parse_params(&params)?;
            let response = gateway
                .fetch(&path, params)
                .await
                .map_err(|e| RunError::Gateway(Some(path.clone()), e))?;

            let data = serde_json::to_value(&response.result).map_err(anyhow::Error::from)?;
            Ok(OutputEnvelope::success(
                Some(&path),
                data,
                response.timestamp,
                response.expires,
            ))
        }
        Commands::Status => {
            let path = evegate::server::SERVER_STATUS_PATH;
            let response = Server::new(&gateway)
                .server_status()
                .await
                .map_err(|e| RunError::Gateway(Some(path.to_string()), e))?;

            let data = serde_json::to_value(response.result).map_err(anyhow::Error::from)?;
            Ok(OutputEnvelope::success(
                Some(path),
                data,
                response.timestamp,
                response.expires,
            ))
        }
        Commands::Cache { action } => {
            let cache = gateway.cache();
            let data = match action {
                CacheAction::Stats => serde_json::to_value(cache.stats()?).map_err(anyhow::Error::from)?,
                CacheAction::Clear => {
                    cache.clear()?;
                    serde_json::json!({ "cleared": true })
                }
            };
            Ok(OutputEnvelope::success(None, data, None, None))
        }
    }
}
