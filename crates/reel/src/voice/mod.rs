//! Narration synthesis
//!
//! A [`SpeechSynthesizer`] walks an ordered list of [`TextToSpeech`] providers until one
//! produces a readable audio file. The chunked community provider splits long text,
//! synthesizes the pieces concurrently and stitches them back together in order.

pub mod chunked;
pub mod chunking;
pub mod synthesizer;
pub mod tts;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::MediaError;

pub use chunked::{ChunkSpeechApi, ChunkedTTS, TikTokApi};
pub use chunking::split_into_chunks;
pub use synthesizer::{ProviderAttempt, SpeechSynthesizer, SynthesisFailure};
pub use tts::{GoogleTTS, OpenAITTS, TextToSpeech};

/// Position of a provider in the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Premium, credentialed, single shot
    Primary,
    /// Chunked community endpoint
    Secondary,
    /// Basic last resort
    Fallback,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderKind::Primary => "primary",
            ProviderKind::Secondary => "secondary",
            ProviderKind::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// Text to speak for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationRequest {
    pub text: String,
    /// Provider-specific voice id; each provider falls back to its configured voice
    pub voice: Option<String>,
    pub language: String,
}

impl NarrationRequest {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            language: language.into(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

/// One synthesized piece of a chunked narration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    /// 0-based position in the original text
    pub ordinal: usize,
    pub source_provider: ProviderKind,
    pub file_path: PathBuf,
    pub duration: f64,
}

/// The narration as a single file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub path: PathBuf,
    /// Seconds, always positive
    pub duration: f64,
}

/// Provider-level failures. These never leave the synthesizer.
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("TTS error: {0}")]
    TTSError(String),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("Nothing to synthesize")]
    EmptyText,

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("All {0} chunks failed")]
    AllChunksFailed(usize),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type VoiceResult<T> = Result<T, VoiceError>;
