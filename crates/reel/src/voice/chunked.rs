//! Chunked community speech provider
//!
//! The endpoint truncates long requests, so the narration is split at sentence
//! boundaries, every chunk is requested concurrently into its own file, and the
//! surviving chunks are joined in ordinal order with a container-level concat.
//!
//! Degradation rules:
//! - a chunk whose request fails (or whose audio is unreadable) is dropped
//! - if every chunk is dropped the provider fails
//! - if the concat itself fails, the first surviving chunk becomes the narration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::Engine;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::chunking::split_into_chunks;
use super::tts::{TextToSpeech, http_client};
use super::{AudioSegment, NarrationRequest, ProviderKind, VoiceError, VoiceResult};
use crate::config::VoiceConfig;
use crate::media::MediaToolkit;

/// One request against a length-limited speech endpoint
#[async_trait]
pub trait ChunkSpeechApi: Send + Sync {
    fn name(&self) -> &'static str;

    /// Encoded audio for `text`; `voice` overrides the endpoint's default voice
    async fn fetch_chunk(&self, text: &str, voice: Option<&str>) -> VoiceResult<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// `id_001`, `en_us_002`, `en_male_narration` and the like
static TIKTOK_VOICE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}(_[a-z0-9]+)+$").expect("valid voice id regex"));

/// Community TikTok voice endpoint. Replies with base64 audio in `data`.
#[derive(Debug)]
pub struct TikTokApi {
    client: reqwest::Client,
    endpoint: String,
    default_voice: String,
}

impl TikTokApi {
    pub fn new(config: &VoiceConfig) -> VoiceResult<Self> {
        Ok(Self {
            client: http_client(config)?,
            endpoint: config.tiktok_endpoint.clone(),
            default_voice: config.tiktok_voice.clone(),
        })
    }

    /// Request voice when it looks like a TikTok voice id, configured voice otherwise
    fn voice_for<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(v) if TIKTOK_VOICE_ID.is_match(v) => v,
            _ => self.default_voice.as_str(),
        }
    }
}

#[async_trait]
impl ChunkSpeechApi for TikTokApi {
    fn name(&self) -> &'static str {
        "tiktok"
    }

    async fn fetch_chunk(&self, text: &str, voice: Option<&str>) -> VoiceResult<Vec<u8>> {
        let payload = serde_json::json!({
            "text": text,
            "voice": self.voice_for(voice),
        });

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(VoiceError::TTSError(format!(
                "TikTok TTS error: {}",
                response.status()
            )));
        }

        let body: GenerationResponse = response.json().await?;
        decode_generation(body)
    }
}

fn decode_generation(body: GenerationResponse) -> VoiceResult<Vec<u8>> {
    let data = match body.data {
        Some(data) if !data.is_empty() => data,
        _ => {
            return Err(VoiceError::InvalidResponse(
                body.error.unwrap_or_else(|| "missing audio data".to_string()),
            ));
        }
    };
    base64::engine::general_purpose::STANDARD
        .decode(data.as_bytes())
        .map_err(|e| VoiceError::InvalidResponse(format!("bad base64: {}", e)))
}

/// [`TextToSpeech`] over a [`ChunkSpeechApi`] with bounded concurrent fan-out
pub struct ChunkedTTS {
    api: Arc<dyn ChunkSpeechApi>,
    toolkit: Arc<dyn MediaToolkit>,
    chunk_char_limit: usize,
    max_concurrent: usize,
}

impl ChunkedTTS {
    pub fn new(
        api: Arc<dyn ChunkSpeechApi>,
        toolkit: Arc<dyn MediaToolkit>,
        config: &VoiceConfig,
    ) -> Self {
        Self {
            api,
            toolkit,
            chunk_char_limit: config.chunk_char_limit,
            max_concurrent: config.max_concurrent_chunks.max(1),
        }
    }

    /// Synthesize every chunk concurrently into `dir`.
    ///
    /// Returns the chunks that survived, sorted by ordinal, and the number attempted.
    pub async fn synthesize_segments(
        &self,
        request: &NarrationRequest,
        dir: &Path,
        token: &str,
    ) -> VoiceResult<(Vec<AudioSegment>, usize)> {
        let chunks = split_into_chunks(&request.text, self.chunk_char_limit);
        if chunks.is_empty() {
            return Err(VoiceError::EmptyText);
        }
        info!(
            "Synthesizing {} chunks via {} ({} at a time)",
            chunks.len(),
            self.api.name(),
            self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let voice = request.voice.as_deref();

        let futures: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(ordinal, text)| {
                let semaphore = semaphore.clone();
                let path = dir.join(format!("chunk_{}_{}.mp3", ordinal, token));
                async move {
                    let result = match semaphore.acquire().await {
                        Ok(_permit) => self.synthesize_chunk(ordinal, text, voice, path).await,
                        Err(e) => Err(VoiceError::TTSError(format!("chunk permit: {}", e))),
                    };
                    (ordinal, result)
                }
            })
            .collect();

        let results = join_all(futures).await;

        let mut segments = Vec::with_capacity(results.len());
        for (ordinal, result) in results {
            match result {
                Ok(segment) => segments.push(segment),
                Err(e) => warn!("Dropping chunk {}: {}", ordinal, e),
            }
        }
        segments.sort_by_key(|s| s.ordinal);

        Ok((segments, chunks.len()))
    }

    async fn synthesize_chunk(
        &self,
        ordinal: usize,
        text: &str,
        voice: Option<&str>,
        path: PathBuf,
    ) -> VoiceResult<AudioSegment> {
        let audio = self.api.fetch_chunk(text, voice).await?;
        tokio::fs::write(&path, &audio).await?;

        match self.toolkit.probe_duration(&path).await {
            Ok(duration) => {
                debug!("Chunk {} ready ({:.2}s)", ordinal, duration);
                Ok(AudioSegment {
                    ordinal,
                    source_provider: ProviderKind::Secondary,
                    file_path: path,
                    duration,
                })
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                Err(e.into())
            }
        }
    }

    /// Join ordered segments into `output`, degrading to the first segment if the
    /// concat fails. Segment files and the manifest are removed either way.
    async fn assemble(
        &self,
        segments: &[AudioSegment],
        manifest: &Path,
        output: &Path,
    ) -> VoiceResult<()> {
        let Some(first) = segments.first() else {
            return Err(VoiceError::AllChunksFailed(0));
        };

        if segments.len() == 1 {
            tokio::fs::rename(&first.file_path, output).await?;
            return Ok(());
        }

        let paths: Vec<PathBuf> = segments.iter().map(|s| s.file_path.clone()).collect();
        let merged = self.toolkit.concat_copy(&paths, manifest, output).await;

        let keep_first = match merged {
            Ok(()) => {
                debug!("Merged {} chunks into {}", segments.len(), output.display());
                false
            }
            Err(e) => {
                error!(
                    "Chunk merge failed, keeping only chunk {}: {}",
                    first.ordinal, e
                );
                tokio::fs::rename(&first.file_path, output).await?;
                true
            }
        };

        let leftovers = if keep_first { &paths[1..] } else { &paths[..] };
        for path in leftovers {
            let _ = tokio::fs::remove_file(path).await;
        }
        let _ = tokio::fs::remove_file(manifest).await;
        Ok(())
    }
}

#[async_trait]
impl TextToSpeech for ChunkedTTS {
    fn name(&self) -> &'static str {
        self.api.name()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Secondary
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn synthesize_to_file(
        &self,
        request: &NarrationRequest,
        output: &Path,
    ) -> VoiceResult<()> {
        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let token = uuid::Uuid::new_v4().simple().to_string();

        let (segments, attempted) = self.synthesize_segments(request, &dir, &token).await?;
        if segments.is_empty() {
            return Err(VoiceError::AllChunksFailed(attempted));
        }
        if segments.len() < attempted {
            warn!(
                "Narration degraded: {} of {} chunks synthesized",
                segments.len(),
                attempted
            );
        }

        let manifest = dir.join(format!("list_{}.txt", token));
        self.assemble(&segments, &manifest, output).await
    }
}
