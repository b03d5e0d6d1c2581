//! Single-shot text-to-speech providers

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::chunking::split_into_chunks;
use super::{NarrationRequest, ProviderKind, VoiceError, VoiceResult};
use crate::config::VoiceConfig;

/// Text-to-Speech trait
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> ProviderKind;

    /// Whether the provider can be attempted at all (credentials present)
    async fn is_ready(&self) -> bool;

    /// Write the complete narration for `request` to `output`
    async fn synthesize_to_file(&self, request: &NarrationRequest, output: &Path)
    -> VoiceResult<()>;
}

pub(crate) fn http_client(config: &VoiceConfig) -> VoiceResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?)
}

/// OpenAI TTS implementation (premium)
#[derive(Debug)]
pub struct OpenAITTS {
    config: VoiceConfig,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl OpenAITTS {
    const VOICES: [&'static str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

    pub fn new(config: &VoiceConfig) -> VoiceResult<Self> {
        let api_key = config.openai_api_key.clone();
        if api_key.is_none() {
            info!("OpenAI API key not set, premium voice disabled");
        }

        Ok(Self {
            config: config.clone(),
            client: http_client(config)?,
            api_key,
        })
    }

    /// Request voice when it is an OpenAI voice, configured voice otherwise
    fn voice_for<'a>(&'a self, request: &'a NarrationRequest) -> &'a str {
        match request.voice.as_deref() {
            Some(v) if Self::VOICES.iter().any(|known| *known == v) => v,
            _ => self.config.openai_voice.as_str(),
        }
    }
}

#[async_trait]
impl TextToSpeech for OpenAITTS {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Primary
    }

    async fn is_ready(&self) -> bool {
        self.api_key.is_some()
    }

    async fn synthesize_to_file(
        &self,
        request: &NarrationRequest,
        output: &Path,
    ) -> VoiceResult<()> {
        let start_time = Instant::now();

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| VoiceError::NotConfigured("OpenAI API key".to_string()))?;

        if request.text.trim().is_empty() {
            return Err(VoiceError::EmptyText);
        }

        let voice = self.voice_for(request);
        info!("Synthesizing speech with OpenAI voice: {}", voice);

        let payload = serde_json::json!({
            "model": self.config.openai_model,
            "input": request.text,
            "voice": voice,
            "response_format": "mp3",
        });

        let response = self
            .client
            .post(&self.config.openai_endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(VoiceError::TTSError(format!(
                "OpenAI TTS error ({}): {}",
                status, error_text
            )));
        }

        let audio_bytes = response.bytes().await?;
        if audio_bytes.is_empty() {
            return Err(VoiceError::InvalidResponse("empty audio body".to_string()));
        }
        tokio::fs::write(output, &audio_bytes).await?;

        debug!(
            "OpenAI TTS wrote {} bytes in {}ms",
            audio_bytes.len(),
            start_time.elapsed().as_millis()
        );
        Ok(())
    }
}

/// Google Translate speech endpoint (basic fallback)
///
/// The endpoint only accepts short requests, so the text is sent in pieces and the
/// returned MP3 frames are appended into one file.
#[derive(Debug)]
pub struct GoogleTTS {
    config: VoiceConfig,
    client: reqwest::Client,
}

impl GoogleTTS {
    pub const PIECE_LIMIT: usize = 100;

    pub fn new(config: &VoiceConfig) -> VoiceResult<Self> {
        Ok(Self {
            config: config.clone(),
            client: http_client(config)?,
        })
    }

    fn piece_url(&self, piece: &str, language: &str, idx: usize, total: usize) -> VoiceResult<reqwest::Url> {
        let total = total.to_string();
        let idx = idx.to_string();
        let textlen = piece.chars().count().to_string();
        reqwest::Url::parse_with_params(
            &self.config.google_endpoint,
            &[
                ("ie", "UTF-8"),
                ("q", piece),
                ("tl", language),
                ("client", "tw-ob"),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ],
        )
        .map_err(|e| VoiceError::TTSError(format!("bad endpoint: {}", e)))
    }
}

#[async_trait]
impl TextToSpeech for GoogleTTS {
    fn name(&self) -> &'static str {
        "google"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Fallback
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn synthesize_to_file(
        &self,
        request: &NarrationRequest,
        output: &Path,
    ) -> VoiceResult<()> {
        let pieces = split_into_chunks(&request.text, Self::PIECE_LIMIT);
        if pieces.is_empty() {
            return Err(VoiceError::EmptyText);
        }

        let language = if request.language.is_empty() {
            self.config.language.as_str()
        } else {
            request.language.as_str()
        };
        info!(
            "Synthesizing speech with Google TTS ({}), {} pieces",
            language,
            pieces.len()
        );

        let mut audio = Vec::new();
        for (idx, piece) in pieces.iter().enumerate() {
            let url = self.piece_url(piece, language, idx, pieces.len())?;
            let response = self
                .client
                .get(url)
                .header("User-Agent", "Mozilla/5.0")
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                warn!("Google TTS piece {} failed with {}", idx, status);
                return Err(VoiceError::TTSError(format!("Google TTS error: {}", status)));
            }
            audio.extend_from_slice(&response.bytes().await?);
        }

        if audio.is_empty() {
            return Err(VoiceError::InvalidResponse("empty audio body".to_string()));
        }
        tokio::fs::write(output, &audio).await?;
        Ok(())
    }
}
