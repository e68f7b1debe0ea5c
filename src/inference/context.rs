//! Process-wide model state, owned explicitly instead of living in globals

use crate::error::Result;
use crate::preprocessing::FittedPipeline;
use crate::schema::SchemaValidator;
use std::sync::Arc;

/// The fitted pipeline currently being served, plus a validator for its schema.
///
/// Built once at startup and handed to the [`InferenceService`](super::InferenceService);
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ModelContext {
    pipeline: Arc<FittedPipeline>,
    validator: SchemaValidator,
}

impl ModelContext {
    /// Verify the pipeline and wrap it for sharing
    pub fn new(pipeline: FittedPipeline) -> Result<Self> {
        pipeline.verify()?;
        let validator = SchemaValidator::new(Arc::new(pipeline.schema().clone()));
        Ok(Self {
            pipeline: Arc::new(pipeline),
            validator,
        })
    }

    /// Skip [`FittedPipeline::verify`] so tests can serve artifacts that fail at predict time
    #[cfg(test)]
    pub(crate) fn unverified(pipeline: FittedPipeline) -> Self {
        let validator = SchemaValidator::new(Arc::new(pipeline.schema().clone()));
        Self {
            pipeline: Arc::new(pipeline),
            validator,
        }
    }

    pub fn pipeline(&self) -> &FittedPipeline {
        &self.pipeline
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    /// Version string attached to every prediction result
    pub fn version(&self) -> &str {
        self.pipeline.version()
    }
}
