//! Pipeline configuration
//!
//! Every section deserializes with `#[serde(default)]`, so a partial TOML file only
//! overrides what it names. Credentials come from the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration for one [`crate::Pipeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    /// Root under which each run gets its own working directory
    pub work_root: PathBuf,
    /// Persist the narration next to the video as `<stem>_script.txt`
    pub save_script: bool,
    pub voice: VoiceConfig,
    pub render: RenderConfig,
    pub script: ScriptConfig,
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::var("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("reel")),
            save_script: true,
            voice: VoiceConfig::default(),
            render: RenderConfig::default(),
            script: ScriptConfig::default(),
        }
    }
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Premium provider credential; the provider is skipped when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    pub openai_endpoint: String,
    pub openai_model: String,
    pub openai_voice: String,
    pub tiktok_endpoint: String,
    pub tiktok_voice: String,
    pub google_endpoint: String,
    /// BCP-47-ish language code used by the basic fallback provider
    pub language: String,
    /// Chunks sent to the chunked provider stay strictly below this many characters
    pub chunk_char_limit: usize,
    pub max_concurrent_chunks: usize,
    pub request_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            openai_endpoint: "https://api.openai.com/v1/audio/speech".to_string(),
            openai_model: "tts-1".to_string(),
            openai_voice: "nova".to_string(),
            tiktok_endpoint: "https://tiktok-tts.weilnet.workers.dev/api/generation".to_string(),
            tiktok_voice: std::env::var("REEL_TTS_VOICE").unwrap_or_else(|_| "id_001".into()),
            google_endpoint: "https://translate.google.com/translate_tts".to_string(),
            language: std::env::var("REEL_TTS_LANGUAGE").unwrap_or_else(|_| "id".into()),
            chunk_char_limit: 200,
            max_concurrent_chunks: 8,
            request_timeout_secs: 60,
        }
    }
}

/// Output geometry, timing and encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Crossfade length between consecutive images (seconds)
    pub transition_secs: f64,
    pub voice_volume: f64,
    pub music_volume: f64,
    pub video_codec: String,
    pub encoder_preset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoder_tune: Option<String>,
    pub pixel_format: String,
    pub audio_codec: String,
    /// Explicit ffmpeg binary; looked up on PATH when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 25,
            transition_secs: 0.5,
            voice_volume: 1.0,
            music_volume: 0.15,
            video_codec: "libx264".to_string(),
            encoder_preset: "fast".to_string(),
            encoder_tune: Some("stillimage".to_string()),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

/// Narration script generation (LLM) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("GROQ_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: std::env::var("REEL_SCRIPT_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".into()),
            temperature: 0.7,
            max_tokens: 600,
            timeout_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_defaults_match_vertical_reel() {
        let render = RenderConfig::default();
        assert_eq!((render.width, render.height), (1080, 1920));
        assert_eq!(render.fps, 25);
        assert_eq!(render.transition_secs, 0.5);
        assert_eq!(render.music_volume, 0.15);
        assert_eq!(render.pixel_format, "yuv420p");
    }

    #[test]
    fn test_chunk_ceiling_default() {
        assert_eq!(VoiceConfig::default().chunk_char_limit, 200);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let json = r#"{ "render": { "fps": 30 }, "save_script": false }"#;
        let config: ReelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.render.fps, 30);
        assert_eq!(config.render.width, 1080);
        assert!(!config.save_script);
        assert_eq!(config.voice.openai_model, "tts-1");
    }
}
