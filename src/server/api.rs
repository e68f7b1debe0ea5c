//! API route definitions

use super::{
    error::ServerError,
    handlers,
    rate_limit::{rate_limit_layer, RateLimiter},
    state::AppState,
    ServerConfig,
};
use axum::{
    extract::OriginalUri,
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

async fn handle_404(OriginalUri(uri): OriginalUri) -> ServerError {
    ServerError::NotFound(format!(
        "{} does not exist. Visit / for an overview or the health endpoint to check API status.",
        uri.path()
    ))
}

async fn handle_405(method: Method, OriginalUri(uri): OriginalUri) -> ServerError {
    ServerError::MethodNotAllowed(format!("{} is not supported on {}", method, uri.path()))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if parsed.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/predict", post(handlers::predict))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    Router::new()
        .nest(&state.api_prefix, api_routes)
        .route("/", get(handlers::serve_index))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(Arc::clone(&state))
        .layer(axum_middleware::from_fn_with_state(limiter, rate_limit_layer))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}
