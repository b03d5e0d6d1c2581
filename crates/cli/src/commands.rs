//! CLI subcommand handlers
//!
//! Handles render, voice, plan and config commands.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use reel::{
    AudioTrack, FFmpegClient, ImageSet, MediaToolkit, NarrationRequest, Pipeline, PipelineError,
    RenderGraphBuilder, ScriptSource, SpeechSynthesizer, TimingPlan, VideoJob,
};
use tracing::{debug, warn};

use crate::{config::Config, output::OutputHandler};

/// How the music track for a command was chosen
#[derive(Debug, Clone, Default)]
pub struct MusicChoice {
    pub path: Option<PathBuf>,
    pub disabled: bool,
}

impl MusicChoice {
    /// Explicit path, else `background.*` from the music directory, unless disabled
    fn resolve(&self, config: &Config) -> Option<PathBuf> {
        if self.disabled {
            return None;
        }
        self.path.clone().or_else(|| {
            config
                .music_dir()
                .and_then(|dir| utils::assets::find_background_music(&dir))
        })
    }
}

pub struct RenderArgs {
    pub images: Vec<PathBuf>,
    pub narration: Option<String>,
    pub narration_file: Option<PathBuf>,
    pub product: Option<String>,
    pub music: MusicChoice,
    pub output: Option<PathBuf>,
}

pub struct PlanArgs {
    pub images: Vec<PathBuf>,
    pub audio: PathBuf,
    pub duration: Option<f64>,
    pub music: MusicChoice,
    pub output: Option<PathBuf>,
    pub raw: bool,
}

/// Exactly one of the three narration inputs must be given
fn script_source(
    narration: Option<String>,
    narration_file: Option<&Path>,
    product: Option<String>,
) -> Result<ScriptSource> {
    match (narration, narration_file, product) {
        (Some(text), None, None) => Ok(ScriptSource::Narration(text)),
        (None, Some(path), None) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read narration file {}", path.display()))?;
            Ok(ScriptSource::Narration(text))
        }
        (None, None, Some(name)) => Ok(ScriptSource::Product(name)),
        (None, None, None) => {
            anyhow::bail!("Give one of --narration, --narration-file or --product")
        }
        _ => anyhow::bail!("--narration, --narration-file and --product are mutually exclusive"),
    }
}

fn default_output_name(now: DateTime<Local>) -> String {
    format!("reel_{}.mp4", now.format("%Y%m%d_%H%M%S"))
}

fn output_path(config: &Config, explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(config.output_dir()?.join(default_output_name(Local::now()))),
    }
}

/// Run the whole pipeline
pub async fn render(config: &Config, args: RenderArgs) -> Result<ExitCode> {
    let output = OutputHandler::new();

    let script = script_source(args.narration, args.narration_file.as_deref(), args.product)?;
    let music = args.music.resolve(config);
    let target = output_path(config, args.output)?;

    output.print_header("Rendering video");
    output.print_field("Images", &args.images.len().to_string());
    output.print_field(
        "Script",
        match &script {
            ScriptSource::Narration(_) => "provided narration",
            ScriptSource::Product(_) => "generated from product name",
        },
    );
    output.print_field(
        "Music",
        &music
            .as_ref()
            .map(|m| m.display().to_string())
            .unwrap_or_else(|| "none".to_string()),
    );
    output.print_field("Output", &target.display().to_string());
    if let Some(path) = &music {
        if !path.exists() {
            output.print_warning("Background music not found, rendering with narration only");
        }
    }

    let pipeline = match Pipeline::from_config(config.pipeline.clone()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            output.print_error(&e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    let job = VideoJob {
        images: args.images,
        script,
        music,
        output: target,
    };

    match pipeline.run(job).await {
        Ok(artifact) => {
            output.print_artifact(&artifact);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report_failure(&output, &e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report_failure(output: &OutputHandler, err: &PipelineError) {
    match err {
        PipelineError::Synthesis(failure) => {
            output.print_error(&err.user_message());
            output.print_attempts(&failure.attempts);
        }
        PipelineError::Encode(diagnostic) => {
            output.print_error(&format!("{} failed", err.stage().label()));
            println!();
            for line in diagnostic_tail(diagnostic, 15) {
                println!("  {}", line.dimmed());
            }
        }
        _ => output.print_error(&err.user_message()),
    }
}

/// Last `max` non-blank lines of encoder stderr, right-trimmed for display
fn diagnostic_tail(diagnostic: &str, max: usize) -> Vec<&str> {
    let lines: Vec<&str> = diagnostic
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    lines[lines.len().saturating_sub(max)..].to_vec()
}

/// Run only speech synthesis
pub async fn voice(
    config: &Config,
    text: Option<String>,
    file: Option<PathBuf>,
    target: PathBuf,
) -> Result<ExitCode> {
    let output = OutputHandler::new();

    let text = match (text, file) {
        (Some(text), None) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => anyhow::bail!("Give exactly one of --text or --file"),
    };
    if text.trim().is_empty() {
        output.print_error("Narration text is empty");
        return Ok(ExitCode::FAILURE);
    }

    let toolkit: Arc<dyn MediaToolkit> = Arc::new(FFmpegClient::from_config(&config.pipeline.render)?);
    let synthesizer = SpeechSynthesizer::from_config(&config.pipeline.voice, toolkit)?;

    output.print_header("Synthesizing narration");
    output.print_field("Providers", &synthesizer.provider_names().join(" → "));

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let request = NarrationRequest::new(text.trim(), config.pipeline.voice.language.as_str());
    match synthesizer.synthesize(&request, &target).await {
        Ok(track) => {
            output.print_success(&format!(
                "Wrote {} ({:.2}s)",
                track.path.display(),
                track.duration
            ));
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            output.print_error(&format!("voice synthesis failed: {}", failure));
            output.print_attempts(&failure.attempts);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Print the timing plan and encoder command without running it
pub async fn plan(config: &Config, args: PlanArgs) -> Result<ExitCode> {
    let output = OutputHandler::new();
    let render = &config.pipeline.render;

    let toolkit = match FFmpegClient::from_config(render) {
        Ok(client) => client,
        Err(e) if args.duration.is_some() => {
            warn!("{}; printing the command with bare binary names", e);
            FFmpegClient::with_paths("ffmpeg", "ffprobe")
        }
        Err(e) => return Err(e).context("--duration is required when ffprobe is unavailable"),
    };

    let duration = match args.duration {
        Some(secs) => secs,
        None => toolkit.probe_duration(&args.audio).await?,
    };
    debug!("Planning with narration duration {:.3}s", duration);

    let images = ImageSet::new(args.images)?;
    let timing = TimingPlan::with_transition(images.len(), duration, render.transition_secs);
    let track = AudioTrack {
        path: args.audio,
        duration,
    };
    let music = args.music.resolve(config);
    let target = output_path(config, args.output)?;

    let spec = RenderGraphBuilder::new(render.clone()).build(&images, &timing, &track, music.as_deref())?;

    if args.raw {
        println!("{}", toolkit.command_line(&spec, &target));
        return Ok(ExitCode::SUCCESS);
    }

    output.print_header("Timing plan");
    output.print_field("Narration", &format!("{:.2}s", duration));
    output.print_field("Per image", &format!("{:.3}s", timing.per_image_duration));
    output.print_field("Transition", &format!("{:.2}s", timing.transition_duration));
    output.print_field("Video length", &format!("{:.2}s", timing.total_duration()));
    output.print_timing(images.as_slice(), &timing);

    output.print_header("Filter graph");
    for chain in spec.filter_complex().split(';') {
        println!("  {}", chain);
    }

    output.print_header("Encoder command");
    let mut command = vec![toolkit.ffmpeg_path().display().to_string()];
    command.extend(spec.to_args(&target));
    output.print_command(&command);

    if !spec.has_music() {
        println!();
        output.print_info("No background music; the narration is the only audio");
    }

    Ok(ExitCode::SUCCESS)
}

/// Show configuration
pub fn show_config(config: &Config) -> Result<()> {
    let output = OutputHandler::new();

    output.print_header("Configuration");

    let not_set = || "not set".dimmed().to_string();
    let section = |name: &str, keys: &[&str]| {
        println!();
        if !name.is_empty() {
            println!("  {}", format!("[{}]", name).bright_cyan());
        }
        for key in keys {
            let full = if name.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", name, key)
            };
            println!(
                "    {} = {}",
                key.dimmed(),
                config.get(&full).unwrap_or_else(not_set)
            );
        }
    };

    section("", &["work_root", "save_script"]);
    section(
        "voice",
        &[
            "openai_api_key",
            "openai_voice",
            "tiktok_voice",
            "language",
            "max_concurrent_chunks",
        ],
    );
    section(
        "render",
        &["fps", "transition_secs", "music_volume", "ffmpeg_path"],
    );
    section("script", &["api_key", "model"]);
    section("paths", &["music_dir", "output_dir"]);

    println!();
    println!(
        "  {} {}",
        "Config file:".dimmed(),
        Config::config_path().display()
    );

    Ok(())
}

/// Set a configuration value
/// Split `key=value`, trimming both sides and surrounding quotes on the value
fn parse_assignment(kv: &str) -> Result<(&str, &str)> {
    let Some((key, value)) = kv.split_once('=') else {
        anyhow::bail!("Invalid format. Use: key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Missing configuration key before '='");
    }
    Ok((key, value.trim().trim_matches('"')))
}

pub fn set_config(kv: &str) -> Result<()> {
    let output = OutputHandler::new();
    let (key, value) = parse_assignment(kv)?;

    let mut config = Config::load()?;
    config
        .set(key, value)
        .with_context(|| format!("Failed to set {}", key))?;
    output.print_success(&format!("Set {} = \"{}\"", key, value));
    Ok(())
}
