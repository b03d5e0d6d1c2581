//! Media engine access
//!
//! Everything that touches encoded media goes through [`MediaToolkit`]: probing a
//! file's duration, container-level concatenation, and running a [`RenderSpec`].
//! [`FFmpegClient`] is the production implementation.

pub mod ffmpeg;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use ffmpeg::FFmpegClient;

use crate::render::RenderSpec;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not available: {0}")]
    NotAvailable(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Nothing to concatenate")]
    EmptyConcat,

    #[error("Process error: {0}")]
    Process(String),

    /// The engine ran and exited non-zero; `stderr` is captured verbatim.
    #[error("FFmpeg exited with {status}: {stderr}")]
    Engine { status: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Failure diagnostic: engine stderr exactly as captured, else the error text
    pub fn diagnostic(&self) -> String {
        match self {
            MediaError::Engine { stderr, .. } if !stderr.trim().is_empty() => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// Capability interface over the external media-encoding engine
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Duration of a media file in seconds
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Join `segments` in order into `output` without re-encoding.
    ///
    /// `manifest` is where the ordered file list is written; the caller owns it.
    async fn concat_copy(
        &self,
        segments: &[PathBuf],
        manifest: &Path,
        output: &Path,
    ) -> MediaResult<()>;

    /// Execute a render spec once, overwriting `output`.
    async fn encode(&self, spec: &RenderSpec, output: &Path) -> MediaResult<()>;
}
