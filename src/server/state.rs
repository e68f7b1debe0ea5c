//! Application state management

use crate::config::AppConfig;
use crate::inference::InferenceService;

/// Application state shared across handlers; read-only after startup
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: InferenceService,
    pub project_name: String,
    pub api_prefix: String,
    pub max_batch_size: usize,
}

impl AppState {
    pub fn new(service: InferenceService, config: &AppConfig) -> Self {
        Self {
            service,
            project_name: config.project_name.clone(),
            api_prefix: config.api_prefix.clone(),
            max_batch_size: config.server.max_batch_size,
        }
    }

    pub fn generate_request_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
