//! Render planning and execution
//!
//! - [`timing`]: per-image display windows and crossfade offsets
//! - [`graph`]: typed filter-graph IR and the [`RenderSpec`] builder
//! - [`invoker`]: single-shot execution of a spec through a [`crate::MediaToolkit`]

pub mod graph;
pub mod invoker;
pub mod timing;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use graph::{
    Filter, FilterChain, FilterGraph, InputKind, MixDuration, OutputOptions, Pad,
    RenderGraphBuilder, RenderInput, RenderSpec, StreamKind, XfadeTransition,
};
pub use invoker::{EncodeInvoker, RenderOutcome};
pub use timing::TimingPlan;

/// Inputs rejected before any graph construction or encode
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No images supplied")]
    NoImages,

    #[error("Narration audio not found: {0}")]
    AudioMissing(PathBuf),

    #[error("Timing planned for {planned} images with {offsets} crossfades, got {images} images")]
    TimingMismatch {
        images: usize,
        planned: usize,
        offsets: usize,
    },
}

/// Ordered, non-empty list of image paths. Order is display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSet(Vec<PathBuf>);

impl ImageSet {
    pub fn new(paths: Vec<PathBuf>) -> Result<Self, RenderError> {
        if paths.is_empty() {
            return Err(RenderError::NoImages);
        }
        Ok(Self(paths))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_image_set_rejected() {
        assert!(matches!(ImageSet::new(vec![]), Err(RenderError::NoImages)));
    }

    #[test]
    fn test_image_set_preserves_order() {
        let set = ImageSet::new(vec!["b.jpg".into(), "a.jpg".into(), "c.jpg".into()]).unwrap();
        let names: Vec<_> = set.iter().map(|p| p.to_string_lossy().to_string()).collect();
        assert_eq!(names, ["b.jpg", "a.jpg", "c.jpg"]);
    }
}
