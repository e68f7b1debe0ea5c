//! Application configuration
//!
//! One JSON file describes the schema, the pipeline, where artifacts live and
//! how the server listens. A few environment variables override file values.

use crate::error::{Result, TabserveError};
use crate::preprocessing::{PipelineConfig, DEFAULT_VERSION};
use crate::schema::FeatureSchema;
use crate::server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_HOST: &str = "TABSERVE_HOST";
pub const ENV_PORT: &str = "TABSERVE_PORT";
pub const ENV_MODEL_VERSION: &str = "TABSERVE_MODEL_VERSION";
pub const ENV_MODELS_DIR: &str = "TABSERVE_MODELS_DIR";

fn default_project_name() -> String {
    "tabserve".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_model_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Version served by `serve` and written by `train`
    #[serde(default = "default_model_version")]
    pub model_version: String,

    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    pub schema: FeatureSchema,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            project_name: default_project_name(),
            api_prefix: default_api_prefix(),
            model_version: default_model_version(),
            models_dir: default_models_dir(),
            schema,
            pipeline: PipelineConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Read a JSON file, apply environment overrides, validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TabserveError::ConfigError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_json::from_str(&json)
            .map_err(|e| TabserveError::ConfigError(format!("invalid config {}: {}", path.display(), e)))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .parse()
                .map_err(|_| TabserveError::ConfigError(format!("{} is not a valid port: {}", ENV_PORT, port)))?;
        }
        if let Some(version) = lookup(ENV_MODEL_VERSION) {
            self.model_version = version;
        }
        if let Some(dir) = lookup(ENV_MODELS_DIR) {
            self.models_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;
        self.pipeline.validate()?;

        if self.model_version.trim().is_empty() {
            return Err(TabserveError::ConfigError("model_version is empty".to_string()));
        }
        if !self.api_prefix.starts_with('/') || self.api_prefix.len() < 2 || self.api_prefix.ends_with('/') {
            return Err(TabserveError::ConfigError(format!(
                "api_prefix '{}' must start with '/', not end with '/', and not be the root",
                self.api_prefix
            )));
        }
        if self.server.max_batch_size == 0 {
            return Err(TabserveError::ConfigError("server.max_batch_size must be positive".to_string()));
        }
        if self.server.rate_limit.enabled && self.server.rate_limit.window_seconds == 0 {
            return Err(TabserveError::ConfigError("server.rate_limit.window_seconds must be positive".to_string()));
        }
        Ok(())
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }
}
