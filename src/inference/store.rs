//! Versioned pipeline artifacts on disk

use crate::error::{Result, TabserveError};
use crate::preprocessing::FittedPipeline;
use std::path::{Path, PathBuf};
use tracing::info;

/// Capability to fetch a fitted pipeline by version id
pub trait PipelineLoader: Send + Sync {
    fn load_fitted_pipeline(&self, version_id: &str) -> Result<FittedPipeline>;
}

/// A directory of `<version>.json` artifacts
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for a version; rejects ids that would escape the directory
    pub fn path_for(&self, version_id: &str) -> Result<PathBuf> {
        let valid = !version_id.is_empty()
            && version_id != "."
            && version_id != ".."
            && version_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(TabserveError::InvalidParameter {
                name: "version".to_string(),
                value: version_id.to_string(),
                reason: "only letters, digits, '.', '-' and '_' are allowed".to_string(),
            });
        }
        Ok(self.dir.join(format!("{}.json", version_id)))
    }

    /// Write the pipeline under its own version, overwriting an existing artifact
    pub fn save(&self, pipeline: &FittedPipeline) -> Result<PathBuf> {
        let path = self.path_for(pipeline.version())?;
        std::fs::create_dir_all(&self.dir)?;
        pipeline.save(&path)?;
        info!(version = pipeline.version(), path = %path.display(), "Pipeline artifact saved");
        Ok(path)
    }

    /// Versions present in the store, sorted
    pub fn list_versions(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                versions.push(stem.to_string());
            }
        }
        versions.sort();
        Ok(versions)
    }
}

impl PipelineLoader for ModelStore {
    fn load_fitted_pipeline(&self, version_id: &str) -> Result<FittedPipeline> {
        let path = self.path_for(version_id)?;
        if !path.exists() {
            return Err(TabserveError::ArtifactNotFound(format!(
                "version '{}' not found in {}",
                version_id,
                self.dir.display()
            )));
        }

        let pipeline = FittedPipeline::load(&path)?;
        if pipeline.version() != version_id {
            return Err(TabserveError::ConfigError(format!(
                "artifact {} carries version '{}'",
                path.display(),
                pipeline.version()
            )));
        }

        info!(version = version_id, rows = pipeline.n_training_rows(), "Pipeline artifact loaded");
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_for_rejects_traversal() {
        let store = ModelStore::new("/tmp/models");
        assert!(store.path_for("1.0.0").is_ok());
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("..").is_err());
    }

    #[test]
    fn test_missing_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());

        let err = store.load_fitted_pipeline("9.9.9").unwrap_err();
        assert!(matches!(err, TabserveError::ArtifactNotFound(_)));
    }

    #[test]
    fn test_list_versions_empty_and_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelStore::new(dir.path()).list_versions().unwrap().is_empty());
        assert!(ModelStore::new(dir.path().join("absent")).list_versions().unwrap().is_empty());
    }
}
