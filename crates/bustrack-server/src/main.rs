//! # bustrack-server
//!
//! HTTP server for the bustrack live bus tracker.
//!
//! ## Running
//!
//! ```bash
//! # Development, with the simulated bus
//! BUSTRACK__DEMO__ENABLED=true cargo run --package bustrack-server
//!
//! # Production
//! BUSTRACK_CONFIG=/etc/bustrack/config.toml ./bustrack-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use anyhow::Context;
use bustrack_core::{default_config_path, AppConfig, DemoSimulator};
use bustrack_server::api::create_router;
use bustrack_server::logging;
use bustrack_server::state::AppState;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Environment variable naming the configuration file.
const CONFIG_PATH_ENV: &str = "BUSTRACK_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var_os(CONFIG_PATH_ENV).map_or_else(default_config_path, PathBuf::from);
    let config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    logging::init(config.server.production)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        demo = config.demo.enabled,
        "Starting bustrack-server"
    );

    let addr = config.server.socket_addr()?;
    let state = AppState::shared(config.clone());
    let shutdown = CancellationToken::new();

    let demo = config.demo.enabled.then(|| {
        let simulator = DemoSimulator::new(config.demo.clone(), config.tracking.interval());
        tokio::spawn(simulator.run(state.hub.clone(), shutdown.child_token()))
    });

    let app = create_router(state.clone());
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    state.controller.shutdown().await;
    shutdown.cancel();
    if let Some(handle) = demo {
        if let Err(e) = handle.await {
            warn!(error = %e, "Demo simulator task failed");
        }
    }

    info!("bustrack-server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM, then cancels `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Shutdown signal received");
    token.cancel();
}
