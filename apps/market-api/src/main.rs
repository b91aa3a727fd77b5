//! # Market API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Storefront ───► HTTP (8080) ───► handlers ───► CheckoutService        │
//! │                                       │               │                 │
//! │                                       ▼               ▼                 │
//! │                                    SQLite (WAL, one tx per seller)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Environment
//! - `BAZAAR_CONFIG` - config file path
//! - `RUST_LOG` - overrides the configured log filter

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bazaar_db::Database;
use market_api::{router, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(None)?;
    init_tracing(&config.logging.filter);

    info!(
        bind = %config.server.bind_address(),
        db = ?config.database.path,
        policy = %config.checkout.policy,
        timeout_secs = config.checkout.timeout_secs,
        "Configuration loaded"
    );

    let db = Database::new(config.database.to_db_config()).await?;
    info!("Database ready");

    let state = Arc::new(AppState::new(db.clone(), config.checkout.to_checkout_config()));
    let app = router(state);

    let listener = TcpListener::bind(config.server.bind_address()).await?;
    info!(addr = %listener.local_addr()?, "Market API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
