// modgraph-core/src/transform.rs
use std::sync::Arc;

use modgraph_common::error::{ModgraphError, Result};
use modgraph_common::model::ModuleUnit;
use tracing::{debug, instrument};

/// A source transformation applied to each loaded script before its
/// dependencies are collected. Implementations that rewrite `source` are
/// responsible for keeping `ast` in step with it.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    /// Returns a message describing the failure, if any.
    fn apply(&self, unit: &mut ModuleUnit) -> std::result::Result<(), String>;
}

/// Ordered list of transforms. The first failure stops the pipeline.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn Transform>>,
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.transforms.iter().map(|t| t.name()))
            .finish()
    }
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn push(&mut self, transform: Arc<dyn Transform>) {
        self.transforms.push(transform);
    }

    #[instrument(skip_all, fields(filename = %unit.filename.display()))]
    pub fn apply_transforms(&self, unit: &mut ModuleUnit) -> Result<()> {
        for transform in &self.transforms {
            debug!("Applying transform '{}'", transform.name());
            transform
                .apply(unit)
                .map_err(|message| ModgraphError::Transform {
                    filename: unit.filename.clone(),
                    message: format!("{}: {message}", transform.name()),
                })?;
        }
        Ok(())
    }
}
