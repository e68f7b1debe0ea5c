//! Integration tests for the HTTP API

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::{fitted_pipeline, loan_schema};
use serde_json::{json, Value};
use tabserve::config::AppConfig;
use tabserve::inference::ModelContext;
use tabserve::server::{build_app, RateLimitConfig, ServerConfig};
use tower::ServiceExt;

fn app_with(server: ServerConfig) -> Router {
    let config = AppConfig::new(loan_schema())
        .with_model_version("1.0.0")
        .with_server(server);
    let context = ModelContext::new(fitted_pipeline("1.0.0")).unwrap();
    build_app(&config, context)
}

fn app() -> Router {
    app_with(ServerConfig::default())
}

fn predict_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/predict")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 64).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = app()
        .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["name"], "tabserve");
    assert_eq!(body["model_version"], "1.0.0");
    assert_eq!(body["api_version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_index_page() {
    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024 * 64).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("tabserve"));
    assert!(html.contains("/api/v1"));
    assert!(!html.contains("{{"));
}

#[tokio::test]
async fn test_predict_success() {
    let payload = json!({"inputs": [
        {"Age": 25, "Income": 3000, "Region": "North"},
        {"Age": null, "Income": 999999, "Region": "East"},
    ]});
    let response = app().oneshot(predict_request(payload.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["version"], "1.0.0");
    assert!(body["errors"].is_null());

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    for result in results {
        assert!(result["errors"].is_null());
        assert_eq!(result["version"], "1.0.0");
        assert!(result["prediction"].is_i64());
    }
}

#[tokio::test]
async fn test_predict_partial_failure() {
    let payload = json!({"inputs": [
        {"Age": 25, "Income": 3000, "Region": "North"},
        {"Age": "forty", "Income": 48000, "Region": "South"},
        {"Age": 61, "Income": 57000, "Region": "South"},
    ]});
    let response = app().oneshot(predict_request(payload.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let results = body["results"].as_array().unwrap();
    assert!(results[1]["prediction"].is_null());
    assert_eq!(results[1]["errors"][0]["field"], "Age");
    assert!(results[0]["prediction"].is_i64());
    assert!(results[2]["prediction"].is_i64());

    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["index"], 1);
}

#[tokio::test]
async fn test_predict_all_failed_is_bad_request() {
    let payload = json!({"inputs": [{"Age": "old"}, "not a record"]});
    let response = app().oneshot(predict_request(payload.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][1]["errors"][0]["field"], "__root__");
}

#[tokio::test]
async fn test_predict_rejects_bad_payloads() {
    for payload in ["{\"inputs\": []}", "{\"inputs\": ", "{\"records\": [{}]}"] {
        let response = app().oneshot(predict_request(payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {}", payload);
        let body = json_body(response).await;
        assert_eq!(body["error"], true);
    }
}

#[tokio::test]
async fn test_predict_batch_limit() {
    let app = app_with(ServerConfig {
        max_batch_size: 2,
        ..ServerConfig::default()
    });
    let payload = json!({"inputs": [{}, {}, {}]});
    let response = app.oneshot(predict_request(payload.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let response = app()
        .oneshot(Request::builder().uri("/api/v1/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], true);
    assert!(body["message"].as_str().unwrap().contains("/api/v1/nothing"));

    let response = app()
        .oneshot(Request::builder().uri("/api/v1/predict").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(response).await["error"], true);
}

#[tokio::test]
async fn test_rate_limit() {
    let app = app_with(ServerConfig {
        rate_limit: RateLimitConfig {
            enabled: true,
            requests_per_window: 1,
            window_seconds: 60,
        },
        ..ServerConfig::default()
    });

    let health = || {
        Request::builder()
            .uri("/api/v1/health")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(health()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers()["x-ratelimit-remaining"], "0");

    let second = app.oneshot(health()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
