//! tenantscope demo server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tenantscope_core::{Database, InMemoryDirectory, IsolationConfig, TenantContextManager};
use tenantscope_server::demo::{seed_directory, seed_documents};
use tenantscope_server::{MemorySession, NetworkConfig, NetworkModule};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Multi-tenant document server with per-request tenant isolation.
#[derive(Debug, Parser)]
#[command(name = "tenantscope-server")]
struct Cli {
    #[arg(long, env = "TENANTSCOPE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "TENANTSCOPE_PORT", default_value_t = 8080)]
    port: u16,

    /// HS256 secret for bearer tokens. Without it every caller is anonymous.
    #[arg(long, env = "TENANTSCOPE_JWT_SECRET")]
    jwt_secret: Option<String>,

    /// JSON file with isolation policy overrides.
    #[arg(long, env = "TENANTSCOPE_ISOLATION_CONFIG")]
    isolation_config: Option<PathBuf>,

    #[arg(long, env = "TENANTSCOPE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, env = "TENANTSCOPE_LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Seed demo tenants, principals and documents.
    #[arg(long)]
    seed_demo: bool,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tenantscope_server=info,tenantscope_core=info,tower_http=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_isolation_config(path: Option<&PathBuf>) -> anyhow::Result<IsolationConfig> {
    let Some(path) = path else {
        return Ok(IsolationConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading isolation config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing isolation config {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c; shutting down");
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let isolation = load_isolation_config(cli.isolation_config.as_ref())?;
    info!(?isolation, "isolation policy");

    let directory = Arc::new(InMemoryDirectory::new());
    if cli.seed_demo {
        seed_directory(&directory);
    }
    let manager = TenantContextManager::new(directory.clone(), directory).with_config(isolation);
    let db = Database::new(Arc::new(MemorySession::new()), Arc::new(manager));
    if cli.seed_demo {
        seed_documents(&db)?;
    }

    if cli.jwt_secret.is_none() {
        warn!("no JWT secret configured; every request is anonymous and cannot select a tenant");
    }

    let config = NetworkConfig {
        host: cli.host,
        port: cli.port,
        request_timeout: Duration::from_secs(cli.request_timeout_secs),
        jwt_secret: cli.jwt_secret,
        ..NetworkConfig::default()
    };

    let mut module = NetworkModule::new(config, db);
    let port = module.start().await?;
    info!(port, "tenantscope server starting");

    module.serve(shutdown_signal()).await
}
