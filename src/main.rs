//! SYRUP — Unified agent-based trading interface
//!
//! Entry point. Loads configuration, initialises structured logging,
//! pre-registers any env-configured platforms, and serves the HTTP API
//! with graceful shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use syrup::api::{self, ApiState};
use syrup::config::AppConfig;

const BANNER: &str = r#"
 ____  _  _  ____  _  _  ____
/ ___)( \/ )(  _ \/ )( \(  _ \
\___ \ )  /  )   /) \/ ( ) __/
(____/(__/  (__\_)\____/(__)

  Unified agent-based trading interface
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        host = %cfg.server.host,
        port = cfg.server.port,
        "SYRUP starting up"
    );

    let state = Arc::new(ApiState::new());

    // Pre-register platforms whose credentials resolve from the
    // environment. Everything else registers over the API.
    for credentials in cfg.startup_credentials() {
        let platform = credentials.platform;
        let mut router = state.trade_router.write().await;
        match router.register_platform(credentials).await {
            Ok(()) => info!(platform = %platform, "Pre-registered platform"),
            Err(e) => error!(platform = %platform, error = %e, "Failed to pre-register platform"),
        }
    }

    let app = api::build_router(state.clone(), &cfg.server.cors_origins);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Release every venue connection before exit.
    state.trade_router.read().await.close_all().await;
    info!("SYRUP shut down cleanly.");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received.");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("syrup=info"));

    let json_logging = std::env::var("SYRUP_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
