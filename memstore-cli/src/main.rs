use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use memstore_backends::{available_backends, select};
use memstore_core::{BackendKind, FileConfigCatalog, MemoryStore, StoreError};
use memstore_mcp::{McpError, MemoryMcpServer};
use tracing::{error, info, warn};

mod config;
mod logging;

use config::{AppConfig, ConfigError, Transport};

#[derive(Parser, Debug)]
#[command(name = "memstore", version)]
#[command(about = "Memstore - namespaced agent memory served over MCP")]
struct Cli {
    /// Directory of file descriptor documents (overrides FILES_DIR)
    #[arg(long, global = true)]
    files_dir: Option<PathBuf>,

    /// Storage backend: redis, postgresql or mongodb (overrides BACKEND)
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Serve the memory tools over the configured transport (default)
    Serve,
    /// Print the resolved configuration and loaded descriptors, then exit
    CheckConfig,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mcp(#[from] McpError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_loaded = config::load_dotenv();
    let cli = Cli::parse();

    match run(cli, dotenv_loaded).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Memstore exited with an error");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, dotenv_loaded: bool) -> Result<(), AppError> {
    let config = resolve_config(&cli)?;
    logging::init(&config.logging);
    if dotenv_loaded {
        info!("Loaded environment from .env");
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::CheckConfig => check_config(&config),
    }
}

/// Environment first, then command-line overrides
fn resolve_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::from_env()?;
    if let Some(dir) = &cli.files_dir {
        config.files_dir = dir.clone();
    }
    if let Some(backend) = &cli.backend {
        config.backend = backend.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn serve(config: AppConfig) -> Result<(), AppError> {
    let tenant = config.tenant()?;
    let policy = config.policy();
    info!(
        user_id = %tenant,
        allowed_files = config.allowed_files.len(),
        read_only_files = config.read_only_files.len(),
        "Access policy configured"
    );

    let catalog = FileConfigCatalog::load_dir(&config.files_dir, &policy);
    if catalog.is_empty() {
        warn!(dir = %config.files_dir.display(), "No file descriptors loaded");
    }

    let connector = select(&config.backend, &config.backends)?;
    connector.ensure_setup().await?;

    let store = MemoryStore::new(connector, policy, tenant).with_ttl(config.ttl());
    let server = MemoryMcpServer::new(Arc::new(store), catalog);
    match config.transport {
        Transport::Stdio => server.serve_stdio().await?,
        Transport::StreamableHttp => {
            server
                .serve_http(&config.http.host, config.http.port)
                .await?
        }
    }
    Ok(())
}

fn check_config(config: &AppConfig) -> Result<(), AppError> {
    let backend: BackendKind = config.backend.parse()?;
    let catalog = FileConfigCatalog::load_dir(&config.files_dir, &config.policy());

    let compiled: Vec<&str> = available_backends().iter().map(BackendKind::as_str).collect();
    let report = serde_json::json!({
        "backend": backend.as_str(),
        "backend_compiled": compiled.contains(&backend.as_str()),
        "available_backends": compiled,
        "config": config,
        "descriptors": catalog.iter().collect::<Vec<_>>(),
    });

    let rendered = serde_json::to_string_pretty(&report)?;
    println!("{}", rendered);
    Ok(())
}
