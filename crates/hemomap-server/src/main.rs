//! # hemomap-server
//!
//! Donation-coordination backend.
//!
//! This binary provides:
//! - **Credential-checked submit** so a registered donor can update their
//!   availability flags and location (password verified by decrypt-and-compare
//!   against the stored secret)
//! - **Public map data** (the sheet minus its private columns) for the
//!   browser map
//! - **Admin API** (bearer token) for registering and deleting donor rows
//! - **CSV sheet storage**: the datastore is one spreadsheet-shaped file

mod api;
mod config;
mod error;
mod submit;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use hemomap_shared::SecretKey;
use hemomap_store::SheetStore;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::submit::SubmitPipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hemomap_server=debug")),
        )
        .init();

    info!("Starting hemomap server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration and derive the cipher key
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        sheet = %config.sheet_path.display(),
        admin_enabled = config.admin_token.is_some(),
        "Loaded configuration"
    );

    // Derived once; immutable for the process lifetime.
    let key = SecretKey::derive(&config.crypt_seed)
        .map_err(|e| anyhow::anyhow!("CRYPT_SEED unusable: {e}"))?;

    // -----------------------------------------------------------------------
    // 3. Open the donor sheet and build the pipeline
    // -----------------------------------------------------------------------
    let store = Arc::new(SheetStore::open(config.sheet_path.clone()).await?);
    let pipeline = Arc::new(SubmitPipeline::new(store.clone(), key));

    let app_state = AppState {
        pipeline,
        store,
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
