//! HTTP request handlers

use super::error::{Result, ServerError};
use super::state::AppState;
use crate::inference::PredictionResult;
use crate::schema::FieldError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub inputs: Vec<Value>,
}

/// Errors for one failed record, keyed by its position in `inputs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordErrors {
    pub index: usize,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub version: String,
    pub results: Vec<PredictionResult>,
    pub errors: Option<Vec<RecordErrors>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub name: String,
    pub api_version: String,
    pub model_version: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        name: state.project_name.clone(),
        api_version: env!("CARGO_PKG_VERSION").to_string(),
        model_version: state.service.version().to_string(),
    })
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PredictResponse>)> {
    let Json(request) = payload.map_err(|rejection| ServerError::BadRequest(rejection.body_text()))?;

    if request.inputs.is_empty() {
        return Err(ServerError::BadRequest("inputs must contain at least one record".to_string()));
    }
    if request.inputs.len() > state.max_batch_size {
        return Err(ServerError::BadRequest(format!(
            "batch of {} records exceeds the limit of {}",
            request.inputs.len(),
            state.max_batch_size
        )));
    }

    let request_id = AppState::generate_request_id();
    let start = Instant::now();
    let service = state.service.clone();
    let inputs = request.inputs;

    let batch = tokio::task::spawn_blocking(move || service.predict_batch(&inputs))
        .await
        .map_err(|e| ServerError::Internal(format!("prediction task failed: {}", e)))?;

    let failures: Vec<RecordErrors> = batch
        .failures()
        .into_iter()
        .map(|(index, errors)| RecordErrors {
            index,
            errors: errors.to_vec(),
        })
        .collect();
    let succeeded = batch.n_succeeded();

    info!(
        request_id = %request_id,
        version = %batch.version,
        records = batch.results.len(),
        succeeded,
        failed = failures.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Prediction request served"
    );

    let status = if succeeded == 0 {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(PredictResponse {
            version: batch.version,
            results: batch.results,
            errors: if failures.is_empty() { None } else { Some(failures) },
        }),
    ))
}

pub async fn serve_index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(
        INDEX_HTML
            .replace("{{name}}", &state.project_name)
            .replace("{{model_version}}", state.service.version())
            .replace("{{api_prefix}}", &state.api_prefix),
    )
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{{name}}</title>
</head>
<body>
    <h1>{{name}}</h1>
    <p>Serving model version <code>{{model_version}}</code>.</p>
    <p>Check the <a href="{{api_prefix}}/health">health endpoint</a> or POST records to
    <code>{{api_prefix}}/predict</code> as <code>{"inputs": [...]}</code>.</p>
</body>
</html>
"#;
