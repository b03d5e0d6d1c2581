//! Configuration management for Reel CLI
//!
//! Handles loading and saving configuration from ~/.reel/config.toml

use std::path::{Path, PathBuf};

use anyhow::Result;
use reel::ReelConfig;
use serde::{Deserialize, Serialize};

/// Configuration for Reel CLI
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Pipeline settings; anything missing falls back to defaults and the environment
    #[serde(flatten)]
    pub pipeline: ReelConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathsConfig {
    /// Where `background.*` is looked up; defaults to `<asset dir>/music`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_dir: Option<PathBuf>,

    /// Where videos go when `--output` is omitted; defaults to `<asset dir>/output`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".reel")
            .join("config.toml")
    }

    /// Load configuration from file, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self.without_env_secrets())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Credentials that merely mirror the environment are not written to disk
    fn without_env_secrets(&self) -> Self {
        let mut copy = self.clone();
        let from_env = |var: &str, value: &Option<String>| {
            value.is_some() && std::env::var(var).ok().as_ref() == value.as_ref()
        };
        if from_env("OPENAI_API_KEY", &copy.pipeline.voice.openai_api_key) {
            copy.pipeline.voice.openai_api_key = None;
        }
        if from_env("GROQ_API_KEY", &copy.pipeline.script.api_key) {
            copy.pipeline.script.api_key = None;
        }
        copy
    }

    pub fn music_dir(&self) -> Option<PathBuf> {
        self.paths
            .music_dir
            .clone()
            .or_else(|| utils::assets::music_dir().ok())
    }

    pub fn output_dir(&self) -> Result<PathBuf> {
        match &self.paths.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok(dir.clone())
            }
            None => Ok(utils::assets::output_dir()?),
        }
    }

    /// Get a configuration value by key path (e.g., "voice.language")
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        let p = &self.pipeline;

        match parts.as_slice() {
            ["paths", "music_dir"] => self.paths.music_dir.as_ref().map(|d| d.display().to_string()),
            ["paths", "output_dir"] => self.paths.output_dir.as_ref().map(|d| d.display().to_string()),
            ["work_root"] => Some(p.work_root.display().to_string()),
            ["save_script"] => Some(p.save_script.to_string()),
            ["voice", "openai_api_key"] => p.voice.openai_api_key.as_ref().map(|_| "***".to_string()),
            ["voice", "openai_voice"] => Some(p.voice.openai_voice.clone()),
            ["voice", "tiktok_voice"] => Some(p.voice.tiktok_voice.clone()),
            ["voice", "language"] => Some(p.voice.language.clone()),
            ["voice", "max_concurrent_chunks"] => Some(p.voice.max_concurrent_chunks.to_string()),
            ["render", "fps"] => Some(p.render.fps.to_string()),
            ["render", "transition_secs"] => Some(p.render.transition_secs.to_string()),
            ["render", "music_volume"] => Some(p.render.music_volume.to_string()),
            ["render", "ffmpeg_path"] => p.render.ffmpeg_path.as_ref().map(|d| d.display().to_string()),
            ["script", "api_key"] => p.script.api_key.as_ref().map(|_| "***".to_string()),
            ["script", "model"] => Some(p.script.model.clone()),
            _ => None,
        }
    }

    /// Set a configuration value by key path (not persisted)
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();
        let p = &mut self.pipeline;

        match parts.as_slice() {
            ["paths", "music_dir"] => self.paths.music_dir = Some(PathBuf::from(value)),
            ["paths", "output_dir"] => self.paths.output_dir = Some(PathBuf::from(value)),
            ["work_root"] => p.work_root = PathBuf::from(value),
            ["save_script"] => p.save_script = value.parse()?,
            ["voice", "openai_api_key"] => p.voice.openai_api_key = Some(value.to_string()),
            ["voice", "openai_voice"] => p.voice.openai_voice = value.to_string(),
            ["voice", "tiktok_voice"] => p.voice.tiktok_voice = value.to_string(),
            ["voice", "language"] => p.voice.language = value.to_string(),
            ["voice", "max_concurrent_chunks"] => p.voice.max_concurrent_chunks = value.parse()?,
            ["render", "fps"] => p.render.fps = value.parse()?,
            ["render", "transition_secs"] => p.render.transition_secs = value.parse()?,
            ["render", "music_volume"] => p.render.music_volume = value.parse()?,
            ["render", "ffmpeg_path"] => p.render.ffmpeg_path = Some(PathBuf::from(value)),
            ["script", "api_key"] => p.script.api_key = Some(value.to_string()),
            ["script", "model"] => p.script.model = value.to_string(),
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }
        Ok(())
    }

    /// Set a configuration value and persist it
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(key, value)?;
        self.save()?;
        Ok(())
    }
}
