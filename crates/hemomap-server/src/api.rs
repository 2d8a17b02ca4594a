use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use hemomap_shared::wire::{DeleteRequest, MapData, RegisterRequest, SubmitRequest, SubmitResponse};
use hemomap_shared::{Availability, DonorRecord};
use hemomap_store::{schema, RowStore, StoreError};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::submit::SubmitPipeline;

pub struct AppState<S> {
    pub pipeline: Arc<SubmitPipeline<S>>,
    pub store: Arc<S>,
    pub config: Arc<ServerConfig>,
}

// Manual impl: `S` itself does not need to be Clone behind the Arcs.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

pub fn build_router<S>(state: AppState<S>) -> Router
where
    S: RowStore + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/submit", post(submit))
        .route("/api/mapdata", get(mapdata))
        .route("/api/admin/register", post(admin_register))
        .route("/api/admin/delete", post(admin_delete))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn submit<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError>
where
    S: RowStore + Send + Sync + 'static,
{
    if request.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".into()));
    }

    let previous = state.pipeline.submit(&request).await?;

    // Previous-row snapshot for observability; secrets stay out of the log.
    info!(
        username = %request.username,
        previously_needed = ?previous.availability.needed(),
        previous_update = ?previous.updated_at,
        "Accepted donor update"
    );

    Ok(Json(SubmitResponse {
        result: "ok".to_string(),
    }))
}

/// The public projection of the whole sheet: every column from `location`
/// onward. Username, secret, and IV never leave the server here.
async fn mapdata<S>(State(state): State<AppState<S>>) -> Result<Json<MapData>, ApiError>
where
    S: RowStore + Send + Sync + 'static,
{
    let rows = state
        .store
        .list_rows()
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?;

    Ok(Json(MapData {
        headers: schema::public_header(),
        rows: rows.iter().map(|row| schema::public_row(row)).collect(),
    }))
}

async fn admin_register<S>(
    headers: HeaderMap,
    State(state): State<AppState<S>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, ApiError>
where
    S: RowStore + Send + Sync + 'static,
{
    verify_admin_token(&headers, &state.config)?;

    if request.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username must not be empty".into()));
    }

    let record = DonorRecord {
        username: request.username.clone(),
        secret: request.secret,
        location: request.location,
        availability: Availability::default(),
        updated_at: Some(Utc::now()),
        share_path: request.share_path,
        external_url: request.external_url,
    };

    state
        .store
        .append_row(schema::record_to_row(&record))
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?;

    info!(username = %request.username, "Admin registered donor");
    Ok(Json(serde_json::json!({ "created": true })))
}

async fn admin_delete<S>(
    headers: HeaderMap,
    State(state): State<AppState<S>>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError>
where
    S: RowStore + Send + Sync + 'static,
{
    verify_admin_token(&headers, &state.config)?;

    match state.store.delete_row(request.row).await {
        Ok(()) => {
            info!(row = request.row, "Admin deleted row");
            Ok(Json(serde_json::json!({ "deleted": true })))
        }
        Err(StoreError::RowOutOfRange(_)) => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::Storage(e.to_string())),
    }
}

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ApiError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ApiError::BadRequest(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    // Constant-time comparison to prevent timing attacks on the admin token.
    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ApiError::Forbidden);
    }

    Ok(())
}

pub async fn serve<S>(state: AppState<S>, addr: std::net::SocketAddr) -> anyhow::Result<()>
where
    S: RowStore + Send + Sync + 'static,
{
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config_with_token(token: Option<&str>) -> ServerConfig {
        ServerConfig {
            admin_token: token.map(str::to_string),
            ..ServerConfig::default()
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_admin_disabled_without_token() {
        let config = config_with_token(None);
        assert!(verify_admin_token(&bearer("anything"), &config).is_err());
    }

    #[test]
    fn test_admin_token_match() {
        let config = config_with_token(Some("s3cret"));
        assert!(verify_admin_token(&bearer("s3cret"), &config).is_ok());
        assert!(matches!(
            verify_admin_token(&bearer("guess"), &config),
            Err(ApiError::Forbidden)
        ));
        assert!(verify_admin_token(&HeaderMap::new(), &config).is_err());
    }
}
