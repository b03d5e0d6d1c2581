//! Single-shot encode execution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::RenderSpec;
use crate::media::{MediaError, MediaToolkit};

/// Result of one encode attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOutcome {
    pub success: bool,
    /// Set only on success
    pub output_path: Option<PathBuf>,
    /// Engine stderr (or launch error) on failure
    pub diagnostic: Option<String>,
}

impl RenderOutcome {
    fn succeeded(output: &Path) -> Self {
        Self {
            success: true,
            output_path: Some(output.to_path_buf()),
            diagnostic: None,
        }
    }

    fn failed(err: &MediaError) -> Self {
        Self {
            success: false,
            output_path: None,
            diagnostic: Some(err.diagnostic()),
        }
    }

    /// Output path on success, diagnostic text otherwise
    pub fn into_result(self) -> Result<PathBuf, String> {
        match (self.success, self.output_path) {
            (true, Some(path)) => Ok(path),
            _ => Err(self
                .diagnostic
                .unwrap_or_else(|| "encode failed without diagnostic".to_string())),
        }
    }
}

/// Runs a [`RenderSpec`] exactly once. No retries.
#[derive(Clone)]
pub struct EncodeInvoker {
    toolkit: Arc<dyn MediaToolkit>,
}

impl EncodeInvoker {
    pub fn new(toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { toolkit }
    }

    pub async fn invoke(&self, spec: &RenderSpec, output: &Path) -> RenderOutcome {
        match self.toolkit.encode(spec, output).await {
            Ok(()) => {
                info!("Rendered {}", output.display());
                RenderOutcome::succeeded(output)
            }
            Err(e) => {
                error!("Encode failed: {}", e);
                RenderOutcome::failed(&e)
            }
        }
    }
}
