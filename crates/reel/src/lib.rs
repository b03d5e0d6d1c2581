//! Reel - narrated product video assembly
//!
//! Turns an ordered set of product photos plus a narration script into a vertical
//! promotional video:
//! - speech synthesis with an ordered provider fallback chain
//! - per-image timing derived from the narration length
//! - an ffmpeg filter graph (scale/pad, crossfades, voice + music mix)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Pipeline                                │
//! │                                                                  │
//! │  ScriptWriter ──▶ SpeechSynthesizer ──▶ TimingPlan ──▶ Encode   │
//! │   (optional)        │                     │            Invoker   │
//! │                     │                     ▼               │      │
//! │          ┌──────────┼──────────┐   RenderGraphBuilder     │      │
//! │          ▼          ▼          ▼          │               │      │
//! │      OpenAITTS  ChunkedTTS  GoogleTTS     └── RenderSpec ─┘      │
//! │                 (fan-out)                                        │
//! │                     │                                            │
//! │               MediaToolkit (ffmpeg / ffprobe)                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod media;
pub mod pipeline;
pub mod render;
pub mod script;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ReelConfig, RenderConfig, ScriptConfig, VoiceConfig};
pub use media::{FFmpegClient, MediaError, MediaResult, MediaToolkit};
pub use pipeline::{
    Pipeline, PipelineError, PipelineStage, ScriptSource, VideoArtifact, VideoJob,
};
pub use render::{
    EncodeInvoker, ImageSet, RenderError, RenderGraphBuilder, RenderOutcome, RenderSpec,
    TimingPlan,
};
pub use script::{GroqScriptWriter, ScriptError, ScriptResult, ScriptWriter};
pub use voice::{
    AudioSegment, AudioTrack, ChunkedTTS, NarrationRequest, ProviderAttempt, ProviderKind,
    SpeechSynthesizer, SynthesisFailure, TextToSpeech, VoiceError, VoiceResult,
};
