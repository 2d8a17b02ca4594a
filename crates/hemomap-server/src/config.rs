//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development; the development cipher seed logs a
//! warning because every deployment must override it.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Seed used when `CRYPT_SEED` is unset. Long enough to derive a key, known
/// to the world, so only suitable for development.
pub const DEV_CRYPT_SEED: &str = "hemomap-development-seed-0123456789abcdef";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// Filesystem path of the donor sheet (CSV).
    /// Env: `SHEET_PATH`
    /// Default: `./donors.csv`
    pub sheet_path: PathBuf,

    /// Pre-shared seed the cipher key is derived from. Must match the seed
    /// the submitting clients use.
    /// Env: `CRYPT_SEED`
    /// Default: [`DEV_CRYPT_SEED`] (development only).
    pub crypt_seed: String,

    /// Admin API bearer token. Required to access /api/admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 5000).into(),
            sheet_path: PathBuf::from("./donors.csv"),
            crypt_seed: DEV_CRYPT_SEED.to_string(),
            admin_token: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("SHEET_PATH") {
            config.sheet_path = PathBuf::from(path);
        }

        match std::env::var("CRYPT_SEED") {
            Ok(seed) if !seed.is_empty() => config.crypt_seed = seed,
            _ => {
                tracing::warn!("CRYPT_SEED not set, using the development seed (dev-only)");
            }
        }

        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
