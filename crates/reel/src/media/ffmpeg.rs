//! FFmpeg wrapper for probing, concatenation and rendering

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{MediaError, MediaResult, MediaToolkit};
use crate::config::RenderConfig;
use crate::render::RenderSpec;

/// FFmpeg client for the reel pipeline
#[derive(Debug, Clone)]
pub struct FFmpegClient {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FFmpegClient {
    /// Locate `ffmpeg` and `ffprobe` on PATH
    pub fn new() -> MediaResult<Self> {
        Ok(Self {
            ffmpeg_path: Self::find_executable("ffmpeg")?,
            ffprobe_path: Self::find_executable("ffprobe")?,
        })
    }

    /// Use configured binaries, falling back to PATH lookup for whichever is unset
    pub fn from_config(config: &RenderConfig) -> MediaResult<Self> {
        let ffmpeg_path = match &config.ffmpeg_path {
            Some(p) => p.clone(),
            None => Self::find_executable("ffmpeg")?,
        };
        let ffprobe_path = match &config.ffprobe_path {
            Some(p) => p.clone(),
            None => Self::find_executable("ffprobe")?,
        };
        Ok(Self::with_paths(ffmpeg_path, ffprobe_path))
    }

    pub fn with_paths(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn find_executable(name: &str) -> MediaResult<PathBuf> {
        which::which(name).map_err(|e| MediaError::NotAvailable(format!("{}: {}", name, e)))
    }

    /// Get the FFmpeg executable path
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Full command line for a spec, for logging and dry runs
    pub fn command_line(&self, spec: &RenderSpec, output: &Path) -> String {
        let mut parts = vec![self.ffmpeg_path.to_string_lossy().to_string()];
        parts.extend(spec.to_args(output).into_iter().map(|a| shell_quote(&a)));
        parts.join(" ")
    }

    async fn run_ffmpeg(&self, args: &[String]) -> MediaResult<()> {
        debug!("Running ffmpeg with {} args", args.len());
        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MediaError::Process(e.to_string()))?;

        if !output.status.success() {
            return Err(MediaError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaToolkit for FFmpegClient {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v", "error",
                "-show_entries", "format=duration",
                "-of", "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| MediaError::Process(e.to_string()))?;

        if !output.status.success() {
            return Err(MediaError::Probe(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn concat_copy(
        &self,
        segments: &[PathBuf],
        manifest: &Path,
        output: &Path,
    ) -> MediaResult<()> {
        if segments.is_empty() {
            return Err(MediaError::EmptyConcat);
        }

        let mut absolute = Vec::with_capacity(segments.len());
        for segment in segments {
            if !segment.exists() {
                return Err(MediaError::FileNotFound(segment.clone()));
            }
            absolute.push(tokio::fs::canonicalize(segment).await?);
        }
        tokio::fs::write(manifest, concat_manifest(&absolute)).await?;

        let args = vec![
            "-y".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            manifest.to_string_lossy().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output.to_string_lossy().to_string(),
        ];
        self.run_ffmpeg(&args).await
    }

    async fn encode(&self, spec: &RenderSpec, output: &Path) -> MediaResult<()> {
        ensure_parent_dir(output).await?;

        // Only a zero exit publishes the file at `output`.
        let staging = staging_path(output);
        info!("Encoding {} inputs into {}", spec.inputs.len(), output.display());
        debug!("{}", self.command_line(spec, &staging));

        match self.run_ffmpeg(&spec.to_args(&staging)).await {
            Ok(()) => {
                tokio::fs::rename(&staging, output).await?;
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                // A video left over from an earlier run must not pass for this one
                match tokio::fs::remove_file(output).await {
                    Ok(()) => warn!("Removed stale {} after failed encode", output.display()),
                    Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                    Err(rm) => warn!("Could not remove stale {}: {}", output.display(), rm),
                }
                Err(e)
            }
        }
    }
}

/// Ordered list-of-files manifest for the concat demuxer
pub fn concat_manifest(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

fn parse_duration(stdout: &str) -> MediaResult<f64> {
    let trimmed = stdout.trim();
    let secs: f64 = trimmed
        .parse()
        .map_err(|_| MediaError::Probe(format!("unreadable duration '{}'", trimmed)))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(MediaError::Probe(format!("non-positive duration {}", secs)));
    }
    Ok(secs)
}

/// Hidden sibling of `output` that keeps the container extension
pub(crate) fn staging_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "render".to_string());
    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "mp4".to_string());
    let token = &uuid::Uuid::new_v4().simple().to_string()[..8];
    output.with_file_name(format!(".{}.{}.partial.{}", stem, token, ext))
}

async fn ensure_parent_dir(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_manifest_keeps_order_and_escapes_quotes() {
        let manifest = concat_manifest(&[
            PathBuf::from("/tmp/run/chunk_0.mp3"),
            PathBuf::from("/tmp/run/it's_1.mp3"),
        ]);
        assert_eq!(
            manifest,
            "file '/tmp/run/chunk_0.mp3'\nfile '/tmp/run/it'\\''s_1.mp3'\n"
        );
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.345000\n").unwrap(), 12.345);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("0.0").is_err());
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let staging = staging_path(Path::new("/out/videos/promo.mp4"));
        assert_eq!(staging.parent(), Some(Path::new("/out/videos")));
        let name = staging.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".promo."));
        assert!(name.ends_with(".partial.mp4"));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("-y"), "-y");
        assert_eq!(shell_quote("[v0]"), "'[v0]'");
    }

    #[tokio::test]
    async fn test_concat_rejects_empty_input() {
        let client = FFmpegClient::with_paths("ffmpeg", "ffprobe");
        let dir = tempfile::tempdir().unwrap();
        let err = client
            .concat_copy(&[], &dir.path().join("list.txt"), &dir.path().join("out.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::EmptyConcat));
    }

    #[tokio::test]
    async fn test_duration_of_missing_file() {
        let client = FFmpegClient::with_paths("ffmpeg", "ffprobe");
        let err = client
            .probe_duration(Path::new("/definitely/not/here.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    /// Runs the real process plumbing against `/bin/sh` stand-ins for the binaries
    #[cfg(unix)]
    mod process {
        use std::os::unix::fs::PermissionsExt;

        use super::*;
        use crate::render::{ImageSet, RenderGraphBuilder, TimingPlan};
        use crate::voice::AudioTrack;

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn single_image_spec(dir: &Path) -> RenderSpec {
            let image = dir.join("img_0.jpg");
            std::fs::write(&image, b"jpg").unwrap();
            let audio = dir.join("voice.mp3");
            std::fs::write(&audio, b"mp3").unwrap();
            RenderGraphBuilder::new(RenderConfig::default())
                .build(
                    &ImageSet::new(vec![image]).unwrap(),
                    &TimingPlan::plan(1, 4.0),
                    &AudioTrack {
                        path: audio,
                        duration: 4.0,
                    },
                    None,
                )
                .unwrap()
        }

        fn file_names(dir: &Path) -> Vec<String> {
            let mut names: Vec<String> = std::fs::read_dir(dir)
                .unwrap()
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect();
            names.sort();
            names
        }

        #[tokio::test]
        async fn test_failed_encode_keeps_stderr_and_leaves_nothing_behind() {
            let bin = tempfile::tempdir().unwrap();
            let inputs = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let ffmpeg = script(
                bin.path(),
                "ffmpeg",
                r#"for last; do :; done
printf partial > "$last"
printf 'boom stderr\n' >&2
exit 1"#,
            );
            let client = FFmpegClient::with_paths(ffmpeg, "ffprobe");

            let output = out.path().join("promo.mp4");
            std::fs::write(&output, b"old").unwrap();

            let err = client
                .encode(&single_image_spec(inputs.path()), &output)
                .await
                .unwrap_err();

            assert!(matches!(err, MediaError::Engine { .. }));
            assert_eq!(err.diagnostic(), "boom stderr\n");
            assert!(file_names(out.path()).is_empty());
        }

        #[tokio::test]
        async fn test_successful_encode_publishes_staging_file() {
            let bin = tempfile::tempdir().unwrap();
            let inputs = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let target_log = bin.path().join("target.txt");
            let ffmpeg = script(
                bin.path(),
                "ffmpeg",
                &format!(
                    r#"for last; do :; done
printf '%s' "$last" > '{}'
printf video > "$last""#,
                    target_log.display()
                ),
            );
            let client = FFmpegClient::with_paths(ffmpeg, "ffprobe");

            let output = out.path().join("promo.mp4");
            std::fs::write(&output, b"old").unwrap();

            client
                .encode(&single_image_spec(inputs.path()), &output)
                .await
                .unwrap();

            assert_eq!(std::fs::read_to_string(&output).unwrap(), "video");
            assert_eq!(file_names(out.path()), vec!["promo.mp4"]);

            let written_to = PathBuf::from(std::fs::read_to_string(&target_log).unwrap());
            assert_eq!(written_to.parent(), Some(out.path()));
            let name = written_to.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with(".promo."));
            assert!(name.ends_with(".partial.mp4"));
        }

        #[tokio::test]
        async fn test_concat_passes_ordered_manifest_to_demuxer() {
            let bin = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let args_log = bin.path().join("args.txt");
            let ffmpeg = script(
                bin.path(),
                "ffmpeg",
                &format!(
                    r#"printf '%s\n' "$@" > '{}'
for last; do :; done
: > "$last""#,
                    args_log.display()
                ),
            );
            let client = FFmpegClient::with_paths(ffmpeg, "ffprobe");

            let first = work.path().join("c 0.mp3");
            let second = work.path().join("c_1.mp3");
            std::fs::write(&first, b"a").unwrap();
            std::fs::write(&second, b"b").unwrap();
            let manifest = work.path().join("list.txt");
            let output = work.path().join("voice.mp3");

            client
                .concat_copy(&[first.clone(), second.clone()], &manifest, &output)
                .await
                .unwrap();

            let args: Vec<String> = std::fs::read_to_string(&args_log)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect();
            let manifest_arg = manifest.to_string_lossy().to_string();
            let output_arg = output.to_string_lossy().to_string();
            assert_eq!(
                args,
                vec![
                    "-y", "-f", "concat", "-safe", "0", "-i", manifest_arg.as_str(), "-c", "copy",
                    output_arg.as_str(),
                ]
            );

            let expected = concat_manifest(&[
                std::fs::canonicalize(&first).unwrap(),
                std::fs::canonicalize(&second).unwrap(),
            ]);
            assert_eq!(std::fs::read_to_string(&manifest).unwrap(), expected);
            assert!(output.exists());
        }

        #[tokio::test]
        async fn test_duration_read_from_tool_stdout() {
            let bin = tempfile::tempdir().unwrap();
            let ffprobe = script(bin.path(), "ffprobe", "echo 4.250000");
            let client = FFmpegClient::with_paths("ffmpeg", ffprobe);

            let audio = bin.path().join("voice.mp3");
            std::fs::write(&audio, b"mp3").unwrap();

            assert_eq!(client.probe_duration(&audio).await.unwrap(), 4.25);
        }

        #[tokio::test]
        async fn test_duration_failure_reports_stderr() {
            let bin = tempfile::tempdir().unwrap();
            let ffprobe = script(
                bin.path(),
                "ffprobe",
                "echo 'Invalid data found when processing input' >&2\nexit 1",
            );
            let client = FFmpegClient::with_paths("ffmpeg", ffprobe);

            let audio = bin.path().join("voice.mp3");
            std::fs::write(&audio, b"garbage").unwrap();

            let err = client.probe_duration(&audio).await.unwrap_err();
            assert!(
                matches!(err, MediaError::Probe(ref msg) if msg == "Invalid data found when processing input")
            );
        }
    }
}
