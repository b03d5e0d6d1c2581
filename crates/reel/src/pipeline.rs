//! Pipeline orchestration
//!
//! One [`VideoJob`] in, one [`VideoArtifact`] (or a stage-tagged [`PipelineError`]) out.
//!
//! ```text
//! AwaitingScript ─▶ AwaitingAudio ─▶ AwaitingRenderPlan ─▶ AwaitingEncode ─▶ Done
//!       │                │                  │                    │
//!       └────────────────┴──────────────────┴────────────────────┴──▶ Failed
//! ```
//!
//! Stages are never retried here. Every run gets its own working directory under
//! `work_root`, removed when the run ends however it ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ReelConfig;
use crate::media::{FFmpegClient, MediaError, MediaToolkit};
use crate::render::{EncodeInvoker, ImageSet, RenderError, RenderGraphBuilder, TimingPlan};
use crate::script::{self, GroqScriptWriter, ScriptError, ScriptWriter};
use crate::voice::{NarrationRequest, SpeechSynthesizer, SynthesisFailure, VoiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    AwaitingScript,
    AwaitingAudio,
    AwaitingRenderPlan,
    AwaitingEncode,
    Done,
    Failed,
}

impl PipelineStage {
    /// User-facing name of the stage a failure belongs to
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::AwaitingScript => "script generation",
            PipelineStage::AwaitingAudio => "voice synthesis",
            PipelineStage::AwaitingRenderPlan | PipelineStage::AwaitingEncode => "video rendering",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "pipeline",
        }
    }
}

/// Where the narration comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptSource {
    /// Use this text as-is
    Narration(String),
    /// Generate a script for this product name
    Product(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
    /// Display order
    pub images: Vec<PathBuf>,
    pub script: ScriptSource,
    pub music: Option<PathBuf>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoArtifact {
    pub output_path: PathBuf,
    pub narration: String,
    pub script_path: Option<PathBuf>,
    /// Narration length, which is also the video length
    pub duration: f64,
    pub image_count: usize,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No images supplied")]
    NoImages,

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisFailure),

    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error("Working directory error: {0}")]
    Workspace(#[source] std::io::Error),

    #[error(transparent)]
    Render(RenderError),

    #[error(transparent)]
    Toolkit(#[from] MediaError),

    #[error("{0}")]
    Encode(String),
}

impl From<RenderError> for PipelineError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::NoImages => PipelineError::NoImages,
            other => PipelineError::Render(other),
        }
    }
}

impl PipelineError {
    /// The stage that was running when the error occurred
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Script(_) => PipelineStage::AwaitingScript,
            PipelineError::Synthesis(_)
            | PipelineError::Voice(_)
            | PipelineError::Workspace(_) => PipelineStage::AwaitingAudio,
            PipelineError::NoImages | PipelineError::Render(_) => PipelineStage::AwaitingRenderPlan,
            PipelineError::Toolkit(_) | PipelineError::Encode(_) => PipelineStage::AwaitingEncode,
        }
    }

    /// Single human-readable reason naming the failed stage
    pub fn user_message(&self) -> String {
        format!("{} failed: {}", self.stage().label(), self)
    }
}

pub struct Pipeline {
    config: ReelConfig,
    writer: Option<Arc<dyn ScriptWriter>>,
    synthesizer: SpeechSynthesizer,
    builder: RenderGraphBuilder,
    invoker: EncodeInvoker,
}

impl Pipeline {
    pub fn new(
        config: ReelConfig,
        writer: Option<Arc<dyn ScriptWriter>>,
        synthesizer: SpeechSynthesizer,
        toolkit: Arc<dyn MediaToolkit>,
    ) -> Self {
        Self {
            builder: RenderGraphBuilder::new(config.render.clone()),
            invoker: EncodeInvoker::new(toolkit),
            config,
            writer,
            synthesizer,
        }
    }

    /// Production wiring: ffmpeg on PATH (or configured), the default provider chain and Groq
    pub fn from_config(config: ReelConfig) -> Result<Self, PipelineError> {
        let toolkit: Arc<dyn MediaToolkit> = Arc::new(FFmpegClient::from_config(&config.render)?);
        let synthesizer = SpeechSynthesizer::from_config(&config.voice, toolkit.clone())?;
        let writer: Arc<dyn ScriptWriter> = Arc::new(GroqScriptWriter::new(&config.script)?);
        Ok(Self::new(config, Some(writer), synthesizer, toolkit))
    }

    pub fn config(&self) -> &ReelConfig {
        &self.config
    }

    pub async fn run(&self, job: VideoJob) -> Result<VideoArtifact, PipelineError> {
        info!(
            "Starting video job: {} images -> {}",
            job.images.len(),
            job.output.display()
        );

        let result = self.run_stages(job).await;
        match &result {
            Ok(artifact) => info!(
                "Pipeline stage: {:?} ({})",
                PipelineStage::Done,
                artifact.output_path.display()
            ),
            Err(e) => error!("Pipeline stage: {:?} ({})", PipelineStage::Failed, e.user_message()),
        }
        result
    }

    async fn run_stages(&self, job: VideoJob) -> Result<VideoArtifact, PipelineError> {
        // Checked before any provider or encoder is touched
        let images = ImageSet::new(job.images.clone())?;

        enter(PipelineStage::AwaitingScript);
        let narration = self.resolve_script(&job.script).await?;

        enter(PipelineStage::AwaitingAudio);
        tokio::fs::create_dir_all(&self.config.work_root)
            .await
            .map_err(PipelineError::Workspace)?;
        let run_dir = tempfile::Builder::new()
            .prefix("reel_run_")
            .tempdir_in(&self.config.work_root)
            .map_err(PipelineError::Workspace)?;

        let result = self.render_in(run_dir.path(), &job, &images, &narration).await;

        if let Err(e) = run_dir.close() {
            warn!("Failed to remove working directory: {}", e);
        }
        let duration = result?;

        let script_path = if self.config.save_script {
            match script::save_script(&job.output, &narration).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Could not save narration script: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(VideoArtifact {
            output_path: job.output,
            narration,
            script_path,
            duration,
            image_count: images.len(),
        })
    }

    async fn resolve_script(&self, source: &ScriptSource) -> Result<String, PipelineError> {
        let text = match source {
            ScriptSource::Narration(text) => text.trim().to_string(),
            ScriptSource::Product(name) => {
                let writer = self.writer.as_ref().ok_or(ScriptError::NotConfigured)?;
                writer.write_script(name).await?
            }
        };
        if text.is_empty() {
            return Err(ScriptError::Empty.into());
        }
        Ok(text)
    }

    /// Audio through encode inside `run_dir`; returns the narration length
    async fn render_in(
        &self,
        run_dir: &Path,
        job: &VideoJob,
        images: &ImageSet,
        narration: &str,
    ) -> Result<f64, PipelineError> {
        let request = NarrationRequest::new(narration, self.config.voice.language.clone());
        let track = self
            .synthesizer
            .synthesize(&request, &run_dir.join("narration.mp3"))
            .await?;

        enter(PipelineStage::AwaitingRenderPlan);
        let timing = TimingPlan::with_transition(
            images.len(),
            track.duration,
            self.config.render.transition_secs,
        );
        let spec = self
            .builder
            .build(images, &timing, &track, job.music.as_deref())?;

        enter(PipelineStage::AwaitingEncode);
        let outcome = self.invoker.invoke(&spec, &job.output).await;
        outcome.into_result().map_err(PipelineError::Encode)?;

        Ok(track.duration)
    }
}

fn enter(stage: PipelineStage) {
    info!("Pipeline stage: {:?}", stage);
}
