//! HTTP server module
//!
//! Thin boundary around the [`InferenceService`](crate::inference::InferenceService):
//! JSON bodies in and out, per-client rate limiting, CORS and request tracing.

mod api;
mod error;
mod handlers;
pub mod rate_limit;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::{HealthResponse, PredictRequest, PredictResponse, RecordErrors};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use state::AppState;

use crate::config::AppConfig;
use crate::inference::{InferenceService, ModelContext};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty or `*` allows any
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    /// Largest accepted `inputs` array
    pub max_batch_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            max_batch_size: 1000,
        }
    }
}

/// Build the router for a loaded model context
pub fn build_app(config: &AppConfig, context: ModelContext) -> axum::Router {
    let service = InferenceService::new(Arc::new(context));
    let state = Arc::new(AppState::new(service, config));
    create_router(state, &config.server)
}

/// Start the server with the given configuration
pub async fn run_server(config: AppConfig, context: ModelContext) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    let model_version = context.version().to_string();
    let app = build_app(&config, context);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(
        address = %addr,
        model_version = %model_version,
        api_prefix = %config.api_prefix,
        rate_limit = config.server.rate_limit.enabled,
        started_at = %start_time.to_rfc3339(),
        "Server starting"
    );
    info!(url = %format!("http://{}{}/health", addr, config.api_prefix), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        let stop_time = chrono::Utc::now();
        info!(
            uptime_secs = stop_time.signed_duration_since(start_time).num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
