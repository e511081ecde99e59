use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use keykeeper::{
    config::AppConfig,
    controller::{Controller, Resource},
    observability::{init_logging, log_config_info},
    secrets::{TokenManager, TokenStore, VaultBackend},
    APP_NAME, VERSION,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Vault-backed CA and certificate keeper
#[derive(Debug, Parser)]
#[command(name = "keykeeper", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "/etc/keykeeper/config.yaml")]
    config: PathBuf,

    /// Run a single reconcile pass and exit; fails if any resource failed
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    let config = AppConfig::from_yaml_file(&cli.config)
        .with_context(|| format!("load configuration from {}", cli.config.display()))?;

    init_logging(&config.logging)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting keykeeper");
    log_config_info(&config);

    let tokens = Arc::new(TokenStore::new());
    let backend = Arc::new(VaultBackend::new(&config.vault, tokens.clone())?);

    if let Err(e) = backend.health_check().await {
        warn!(error = %e, "Vault health check failed, continuing");
    }

    let shutdown = CancellationToken::new();
    let renewal = TokenManager::new(backend.clone(), tokens, config.vault.auth.clone())
        .authenticate(shutdown.clone())
        .await
        .context("authenticate with Vault")?;

    let controller = Controller::new(backend, Resource::from_config(&config.resources));

    if cli.once {
        shutdown.cancel();
        let report = controller.reconcile_all().await;
        if !report.failed.is_empty() {
            anyhow::bail!("reconcile failed for: {}", report.failed.join(", "));
        }
        info!(succeeded = report.succeeded, "Reconcile pass complete");
        return Ok(());
    }

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    controller.run(config.controller.reconcile_interval(), shutdown).await;

    if let Some(handle) = renewal {
        if let Err(e) = handle.await {
            error!(error = %e, "Token renewal task failed");
        }
    }

    info!("keykeeper shutdown completed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
