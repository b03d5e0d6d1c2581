//! Narration script generation
//!
//! Produces a short spoken sales script for a product name through an
//! OpenAI-compatible chat-completions endpoint (Groq by default).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ScriptConfig;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Script API key not configured")]
    NotConfigured,

    #[error("Narration text is empty")]
    Empty,

    #[error("LLM error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ScriptResult<T> = Result<T, ScriptError>;

#[async_trait]
pub trait ScriptWriter: Send + Sync {
    async fn write_script(&self, product_name: &str) -> ScriptResult<String>;
}

const SYSTEM_PROMPT: &str =
    "You are a professional TikTok content creator and affiliate marketer.";

fn user_prompt(product_name: &str) -> String {
    format!(
        r#"Tugas: Buat naskah video TikTok Affiliate yang VIRAL dan PERSUASIF untuk: {product_name}.

TARGET DURASI: 15-30 detik (Sangat Singkat & To-the-point).

KATEGORI HOOK (Pilih satu yang paling unik):
1. THE SECRET: "Jujur, nyesel banget baru tau ada barang ginian..."
2. THE PROBLEM: "Cowok/Cewek wajib punya ini kalau nggak mau..."
3. THE VISUAL: "Liat deh, ini beneran life changer banget buat..."
4. THE URGENCY: "Stop scroll! Barang ini lagi viral dan sisa dikit..."
5. THE TEASE: "Kalian nggak akan percaya harga barang sekeren ini..."

Struktur Naskah:
1. HOOK UNIK (3-5 detik): Gunakan salah satu gaya di atas yang paling cocok.
2. BODY (10-20 detik): Jelaskan 2 MANFAAT UTAMA yang paling 'ngena'. Fokus pada solusi.
3. CALL TO ACTION (CTA): Ajak klik keranjang kuning SEKARANG sebelum kehabisan.

Gaya Bahasa:
- Bahasa gaul Jakarta/TikTok yang natural (pake 'lo/gue' atau 'kalian' yang sopan tapi asik).
- Sangat ekspresif dan penuh energi.

ATURAN KETAT:
- HANYA keluarkan teks deskripsi.
- JANGAN gunakan tanda bintang (*), hashtag (#), emoji, atau markup.
- Panjang teks WAJIB antara 40-70 kata (Agar durasi 15-30 detik).
- Gunakan Bahasa Indonesia yang sangat natural, jangan kaku."#
    )
}

/// Strip markdown emphasis and headings the model sometimes emits anyway
pub fn sanitize(text: &str) -> String {
    text.replace(['*', '#'], "").trim().to_string()
}

/// Groq (or any OpenAI-compatible) chat-completions writer
pub struct GroqScriptWriter {
    client: Client,
    config: ScriptConfig,
}

impl GroqScriptWriter {
    pub fn new(config: &ScriptConfig) -> ScriptResult<Self> {
        if config.api_key.is_none() {
            warn!("GROQ_API_KEY not set, script generation will fail");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ScriptWriter for GroqScriptWriter {
    async fn write_script(&self, product_name: &str) -> ScriptResult<String> {
        let api_key = self.config.api_key.as_ref().ok_or(ScriptError::NotConfigured)?;

        info!("Generating narration script for '{}' with {}", product_name, self.config.model);

        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(product_name) }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ScriptError::Api(format!("{}: {}", status, error_text)));
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ScriptError::Api("response has no message content".to_string()))?;

        let script = sanitize(content);
        if script.is_empty() {
            return Err(ScriptError::Empty);
        }
        Ok(script)
    }
}

/// `<video-stem>_script.txt` beside the video
pub fn script_path_for(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    video.with_file_name(format!("{}_script.txt", stem))
}

pub async fn save_script(video: &Path, script: &str) -> ScriptResult<PathBuf> {
    let path = script_path_for(video);
    tokio::fs::write(&path, script).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_markup() {
        assert_eq!(
            sanitize("  **Stop scroll!** # Barang ini viral  \n"),
            "Stop scroll!  Barang ini viral"
        );
    }

    #[test]
    fn test_prompt_mentions_product() {
        let prompt = user_prompt("Serum Vitamin C");
        assert!(prompt.contains("untuk: Serum Vitamin C."));
        assert!(prompt.contains("40-70 kata"));
    }

    #[test]
    fn test_script_path_for() {
        assert_eq!(
            script_path_for(Path::new("/out/promo_01.mp4")),
            PathBuf::from("/out/promo_01_script.txt")
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let writer = GroqScriptWriter::new(&ScriptConfig {
            api_key: None,
            ..ScriptConfig::default()
        })
        .unwrap();
        let err = writer.write_script("Serum").await.unwrap_err();
        assert!(matches!(err, ScriptError::NotConfigured));
    }

    #[tokio::test]
    async fn test_save_script_beside_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("promo.mp4");
        let path = save_script(&video, "Halo semua").await.unwrap();
        assert_eq!(path, dir.path().join("promo_script.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Halo semua");
    }
}
