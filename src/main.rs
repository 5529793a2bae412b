use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use clap::Parser;
use clap_serde_derive::ClapSerde;
use tracing::{error, info, warn};

use crate::api::AppState;
use crate::artifact::loader::LoadState;
use crate::config::Config;

mod api;
mod artifact;
mod config;
mod error;
mod extractors;
mod telemetry;

const DEFAULT_CONFIG_FILE: &str = "DosageService.toml";
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_toml_or_default(
        &args.config_file,
        args.config_file == DEFAULT_CONFIG_FILE,
    )?
    .merge(args.opt_config);

    let telemetry = telemetry::init_telemetry(&config.otlp_endpoint, config.console)?;

    // Loaded once before the listener starts, then shared read-only.
    let load_state = LoadState::load(Path::new(&config.model_path));
    if let Some(error) = load_state.load_error() {
        warn!(
            "Serving in degraded mode, every request will report the load error: {}",
            error.lines().next().unwrap_or_default()
        );
    }
    let router = api::router(AppState::new(load_state), config.body_limit);

    let addr = tokio::net::lookup_host((config.address.as_str(), config.port))
        .await?
        .next()
        .with_context(|| format!("Failed to resolve listen address {}", config.address))?;

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    match config.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .context("Failed to load TLS certificate or key")?;
            info!("Listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await?;
        }
        None => {
            info!("Listening on http://{}", addr);
            axum_server::bind(addr)
                .handle(handle)
                .serve(router.into_make_service())
                .await?;
        }
    }

    telemetry.shutdown();
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down...");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
}
