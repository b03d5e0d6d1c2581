//! In-process fakes for the media engine, speech providers and script writer

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::media::{MediaError, MediaResult, MediaToolkit};
use crate::render::RenderSpec;
use crate::script::{ScriptResult, ScriptWriter};
use crate::voice::{
    ChunkSpeechApi, NarrationRequest, ProviderKind, TextToSpeech, VoiceError, VoiceResult,
};

/// Media engine stand-in: one byte is one millisecond of audio, concat appends bytes,
/// encode records the spec and writes a placeholder file.
#[derive(Default)]
pub(crate) struct FakeToolkit {
    fail_concat: bool,
    fail_encode: Option<String>,
    concat_calls: AtomicUsize,
    encoded: Mutex<Vec<RenderSpec>>,
}

impl FakeToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_concat(mut self) -> Self {
        self.fail_concat = true;
        self
    }

    pub fn failing_encode(mut self, stderr: &str) -> Self {
        self.fail_encode = Some(stderr.to_string());
        self
    }

    pub fn concat_calls(&self) -> usize {
        self.concat_calls.load(Ordering::SeqCst)
    }

    pub fn encode_calls(&self) -> usize {
        self.encoded.lock().unwrap().len()
    }

    pub fn encoded_specs(&self) -> Vec<RenderSpec> {
        self.encoded.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;
        if meta.len() == 0 {
            return Err(MediaError::Probe("empty file".to_string()));
        }
        Ok(meta.len() as f64 * 0.001)
    }

    async fn concat_copy(
        &self,
        segments: &[PathBuf],
        manifest: &Path,
        output: &Path,
    ) -> MediaResult<()> {
        self.concat_calls.fetch_add(1, Ordering::SeqCst);
        if segments.is_empty() {
            return Err(MediaError::EmptyConcat);
        }
        tokio::fs::write(manifest, crate::media::ffmpeg::concat_manifest(segments)).await?;
        if self.fail_concat {
            return Err(MediaError::Engine {
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        let mut merged = Vec::new();
        for segment in segments {
            merged.extend(tokio::fs::read(segment).await?);
        }
        tokio::fs::write(output, merged).await?;
        Ok(())
    }

    async fn encode(&self, spec: &RenderSpec, output: &Path) -> MediaResult<()> {
        self.encoded.lock().unwrap().push(spec.clone());
        if let Some(stderr) = &self.fail_encode {
            return Err(MediaError::Engine {
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            });
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"mp4").await?;
        Ok(())
    }
}

/// Single-shot provider with a fixed outcome. Successful runs write `[text]`.
pub(crate) struct ScriptedTTS {
    name: &'static str,
    kind: ProviderKind,
    ready: bool,
    fail: bool,
    body: Option<Vec<u8>>,
    calls: AtomicUsize,
}

impl ScriptedTTS {
    pub fn ok(name: &'static str, kind: ProviderKind) -> Self {
        Self {
            name,
            kind,
            ready: true,
            fail: false,
            body: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str, kind: ProviderKind) -> Self {
        Self {
            fail: true,
            ..Self::ok(name, kind)
        }
    }

    pub fn writing(name: &'static str, kind: ProviderKind, body: &[u8]) -> Self {
        Self {
            body: Some(body.to_vec()),
            ..Self::ok(name, kind)
        }
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextToSpeech for ScriptedTTS {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn is_ready(&self) -> bool {
        self.ready
    }

    async fn synthesize_to_file(
        &self,
        request: &NarrationRequest,
        output: &Path,
    ) -> VoiceResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VoiceError::TTSError(format!("{} unavailable", self.name)));
        }
        let body = match &self.body {
            Some(body) => body.clone(),
            None => format!("[{}]", request.text).into_bytes(),
        };
        tokio::fs::write(output, body).await?;
        Ok(())
    }
}

/// Chunk endpoint returning `[text]` per chunk, with optional failures and delays
#[derive(Default)]
pub(crate) struct ScriptedChunkApi {
    fail_containing: Option<String>,
    reverse_delay_ms: u64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedChunkApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every chunk whose text contains `needle` (empty matches all)
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_containing = Some(needle.to_string());
        self
    }

    /// Earlier calls sleep longer, so completion order is the reverse of start order
    pub fn with_reverse_delays(mut self, step_ms: u64) -> Self {
        self.reverse_delay_ms = step_ms;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkSpeechApi for ScriptedChunkApi {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_chunk(&self, text: &str, _voice: Option<&str>) -> VoiceResult<Vec<u8>> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if self.reverse_delay_ms > 0 {
            let steps = 10u64.saturating_sub(index as u64);
            tokio::time::sleep(Duration::from_millis(steps * self.reverse_delay_ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(needle) = &self.fail_containing {
            if text.contains(needle.as_str()) {
                return Err(VoiceError::TTSError("chunk rejected".to_string()));
            }
        }
        Ok(format!("[{}]", text).into_bytes())
    }
}

/// Script writer returning a fixed text
pub(crate) struct FixedScriptWriter {
    script: String,
}

impl FixedScriptWriter {
    pub fn new(script: &str) -> Self {
        Self {
            script: script.to_string(),
        }
    }
}

#[async_trait]
impl ScriptWriter for FixedScriptWriter {
    async fn write_script(&self, _product_name: &str) -> ScriptResult<String> {
        Ok(self.script.clone())
    }
}
