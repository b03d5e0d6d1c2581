//! Provider fallback chain

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::chunked::{ChunkedTTS, TikTokApi};
use super::tts::{GoogleTTS, OpenAITTS, TextToSpeech};
use super::{AudioTrack, NarrationRequest, ProviderKind, VoiceResult};
use crate::config::VoiceConfig;
use crate::media::MediaToolkit;

/// Why one provider did not produce the narration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub kind: ProviderKind,
    pub reason: String,
}

/// Every provider in the chain was tried and none produced usable audio
#[derive(Debug, Clone, Error)]
#[error("all speech providers failed ({})", describe_attempts(.attempts))]
pub struct SynthesisFailure {
    pub attempts: Vec<ProviderAttempt>,
}

fn describe_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no providers configured".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.provider, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Ordered list of providers; the first one to produce readable audio wins
pub struct SpeechSynthesizer {
    providers: Vec<Arc<dyn TextToSpeech>>,
    toolkit: Arc<dyn MediaToolkit>,
}

impl SpeechSynthesizer {
    pub fn new(providers: Vec<Arc<dyn TextToSpeech>>, toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { providers, toolkit }
    }

    /// Premium (OpenAI), chunked (TikTok), basic (Google), in that order
    pub fn from_config(config: &VoiceConfig, toolkit: Arc<dyn MediaToolkit>) -> VoiceResult<Self> {
        let providers: Vec<Arc<dyn TextToSpeech>> = vec![
            Arc::new(OpenAITTS::new(config)?),
            Arc::new(ChunkedTTS::new(
                Arc::new(TikTokApi::new(config)?),
                toolkit.clone(),
                config,
            )),
            Arc::new(GoogleTTS::new(config)?),
        ];
        Ok(Self::new(providers, toolkit))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Produce the narration at `output`.
    ///
    /// Provider errors are logged and recorded, never returned individually. Audio that
    /// cannot be measured counts as that provider's failure.
    pub async fn synthesize(
        &self,
        request: &NarrationRequest,
        output: &Path,
    ) -> Result<AudioTrack, SynthesisFailure> {
        let mut attempts = Vec::new();

        for provider in &self.providers {
            let mut attempt = |reason: String| {
                attempts.push(ProviderAttempt {
                    provider: provider.name().to_string(),
                    kind: provider.kind(),
                    reason,
                })
            };

            if !provider.is_ready().await {
                info!("Skipping {} TTS: not configured", provider.name());
                attempt("not configured".to_string());
                continue;
            }

            if let Err(e) = provider.synthesize_to_file(request, output).await {
                warn!("{} TTS failed: {}", provider.name(), e);
                let _ = tokio::fs::remove_file(output).await;
                attempt(e.to_string());
                continue;
            }

            match self.toolkit.probe_duration(output).await {
                Ok(duration) => {
                    info!(
                        "Narration synthesized by {} ({:.2}s)",
                        provider.name(),
                        duration
                    );
                    return Ok(AudioTrack {
                        path: output.to_path_buf(),
                        duration,
                    });
                }
                Err(e) => {
                    warn!("{} TTS produced unreadable audio: {}", provider.name(), e);
                    let _ = tokio::fs::remove_file(output).await;
                    attempt(format!("unreadable audio: {}", e));
                }
            }
        }

        Err(SynthesisFailure { attempts })
    }
}
