//! HTTP trigger endpoints.
//!
//! `POST /webhook` takes a raw CRM delivery, `POST /generate` takes a direct
//! run request. Both answer with the run outcome as JSON; errors map to a
//! status code and `{"error": "..."}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use color_eyre::eyre::Result;
use landingsync_core::{SilentProgress, WebhookOutcome};
use landingsync_shared::{AppConfig, HeadingStyle, LandingSyncError, PageRequest, PageRunResult};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::runner;

/// Error wrapper rendered as a JSON response.
#[derive(Debug)]
pub(crate) struct ApiError(LandingSyncError);

impl From<LandingSyncError> for ApiError {
    fn from(err: LandingSyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

/// Body of `POST /generate`.
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateBody {
    pub site_code: String,
    pub industry: String,
    #[serde(default)]
    pub base_location: String,
    #[serde(default)]
    pub num_pages: Option<usize>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub priority_locations: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub heading_style: Option<HeadingStyle>,
}

impl GenerateBody {
    fn into_request(self, config: &AppConfig) -> PageRequest {
        PageRequest {
            anchor_location: self.base_location,
            industry: self.industry,
            page_count: self.num_pages.unwrap_or(config.defaults.default_num_pages),
            site_id: self.site_code,
            collection_name: self
                .collection_name
                .unwrap_or_else(|| config.defaults.collection_name.clone()),
            priority_locations: self.priority_locations,
            manual_locations: self.locations,
            company_name: self.company_name,
            heading_style: self.heading_style,
        }
    }
}

/// Create the application router.
pub(crate) fn create_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(webhook))
        .route("/generate", post(generate))
        .with_state(config)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "service": "landingsync"}))
}

async fn webhook(
    State(config): State<Arc<AppConfig>>,
    body: String,
) -> Result<Json<WebhookOutcome>, ApiError> {
    let outcome = runner::run_webhook(&config, &body, &SilentProgress).await?;
    Ok(Json(outcome))
}

async fn generate(
    State(config): State<Arc<AppConfig>>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<PageRunResult>, ApiError> {
    let request = body.into_request(&config);
    let result = runner::run_generate(&config, &request, &SilentProgress).await?;
    Ok(Json(result))
}

/// Serve the trigger endpoints until Ctrl-C.
pub(crate) async fn serve(config: AppConfig, addr: SocketAddr) -> Result<()> {
    let app = create_router(Arc::new(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received, stopping server");
}
