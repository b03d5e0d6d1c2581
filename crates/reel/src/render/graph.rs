//! Filter-graph IR and render spec construction
//!
//! The graph is assembled as typed stages and only turned into ffmpeg's
//! `-filter_complex` syntax by [`FilterGraph::render`]. Stage layout:
//!
//! ```text
//! [0:v] scale,pad,setsar [v0] ─┐
//! [1:v] scale,pad,setsar [v1] ─┴─ xfade [xf1] ─┐
//! [2:v] scale,pad,setsar [v2] ─────────────────┴─ xfade [xf2]  ──▶ video map
//!
//! [N:a]   volume(1.0)  [a_voice] ─┐
//! [N+1:a] volume(0.15) [a_music] ─┴─ amix(duration=first) [outa] ──▶ audio map
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ImageSet, RenderError, TimingPlan};
use crate::config::RenderConfig;
use crate::voice::AudioTrack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(&self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

/// How an input file is read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputKind {
    /// Single picture looped for `duration` seconds
    StillImage { duration: f64 },
    /// Read once
    Audio,
    /// Repeated indefinitely; the mix decides when it stops
    LoopedAudio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInput {
    pub path: PathBuf,
    pub kind: InputKind,
}

impl RenderInput {
    fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        match &self.kind {
            InputKind::StillImage { duration } => {
                args.extend(["-loop".to_string(), "1".to_string()]);
                args.extend(["-t".to_string(), fmt_num(*duration)]);
            }
            InputKind::Audio => {}
            InputKind::LoopedAudio => {
                args.extend(["-stream_loop".to_string(), "-1".to_string()]);
            }
        }
        args.push("-i".to_string());
        args.push(self.path.to_string_lossy().to_string());
        args
    }
}

/// A stream reference: either an input stream or a labelled filter output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pad {
    Input { index: usize, stream: StreamKind },
    Label(String),
}

impl Pad {
    pub fn label(name: impl Into<String>) -> Self {
        Pad::Label(name.into())
    }

    /// Form used after `-map`; labels need brackets there, input streams do not
    pub fn map_arg(&self) -> String {
        match self {
            Pad::Input { .. } => self.to_string(),
            Pad::Label(_) => format!("[{}]", self),
        }
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pad::Input { index, stream } => write!(f, "{}:{}", index, stream.specifier()),
            Pad::Label(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XfadeTransition {
    Fade,
}

impl XfadeTransition {
    fn as_str(&self) -> &'static str {
        match self {
            XfadeTransition::Fade => "fade",
        }
    }
}

/// Which input decides the length of an `amix`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixDuration {
    First,
    Longest,
    Shortest,
}

impl MixDuration {
    fn as_str(&self) -> &'static str {
        match self {
            MixDuration::First => "first",
            MixDuration::Longest => "longest",
            MixDuration::Shortest => "shortest",
        }
    }
}

/// One filter stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum Filter {
    /// Shrink to fit inside the box, keeping aspect ratio
    ScaleToFit { width: u32, height: u32 },
    /// Pad to the exact box, content centred
    PadCenter { width: u32, height: u32 },
    SquarePixels,
    Xfade {
        transition: XfadeTransition,
        duration: f64,
        offset: f64,
    },
    Volume { level: f64 },
    Amix {
        inputs: usize,
        duration: MixDuration,
        normalize: bool,
    },
}

impl Filter {
    pub fn name(&self) -> &'static str {
        match self {
            Filter::ScaleToFit { .. } => "scale",
            Filter::PadCenter { .. } => "pad",
            Filter::SquarePixels => "setsar",
            Filter::Xfade { .. } => "xfade",
            Filter::Volume { .. } => "volume",
            Filter::Amix { .. } => "amix",
        }
    }

    pub fn render(&self) -> String {
        match self {
            Filter::ScaleToFit { width, height } => format!(
                "scale={}:{}:force_original_aspect_ratio=decrease",
                width, height
            ),
            Filter::PadCenter { width, height } => {
                format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2", width, height)
            }
            Filter::SquarePixels => "setsar=1".to_string(),
            Filter::Xfade {
                transition,
                duration,
                offset,
            } => format!(
                "xfade=transition={}:duration={}:offset={}",
                transition.as_str(),
                fmt_num(*duration),
                fmt_num(*offset)
            ),
            Filter::Volume { level } => format!("volume={}", fmt_num(*level)),
            Filter::Amix {
                inputs,
                duration,
                normalize,
            } => format!(
                "amix=inputs={}:duration={}:normalize={}",
                inputs,
                duration.as_str(),
                u8::from(*normalize)
            ),
        }
    }
}

/// Linear chain: `[in...]f1,f2,...[out]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub filters: Vec<Filter>,
    pub output: String,
}

impl FilterChain {
    pub fn render(&self) -> String {
        let inputs: String = self.inputs.iter().map(|p| format!("[{}]", p)).collect();
        let filters: Vec<String> = self.filters.iter().map(Filter::render).collect();
        format!("{}{}[{}]", inputs, filters.join(","), self.output)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterGraph {
    pub chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn push(&mut self, chain: FilterChain) -> Pad {
        let out = Pad::label(chain.output.clone());
        self.chains.push(chain);
        out
    }

    pub fn render(&self) -> String {
        self.chains
            .iter()
            .map(FilterChain::render)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Number of stages using the named filter
    pub fn count(&self, filter_name: &str) -> usize {
        self.chains
            .iter()
            .flat_map(|c| c.filters.iter())
            .filter(|f| f.name() == filter_name)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

/// Fixed output encoding parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputOptions {
    pub video_codec: String,
    pub preset: String,
    pub tune: Option<String>,
    pub pixel_format: String,
    pub fps: u32,
    pub audio_codec: String,
    /// Stop at the end of the shortest mapped stream
    pub shortest: bool,
}

impl OutputOptions {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            video_codec: config.video_codec.clone(),
            preset: config.encoder_preset.clone(),
            tune: config.encoder_tune.clone(),
            pixel_format: config.pixel_format.clone(),
            fps: config.fps,
            audio_codec: config.audio_codec.clone(),
            shortest: true,
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ];
        if let Some(tune) = &self.tune {
            args.push("-tune".to_string());
            args.push(tune.clone());
        }
        args.extend([
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-r".to_string(),
            self.fps.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
        ]);
        if self.shortest {
            args.push("-shortest".to_string());
        }
        args
    }
}

/// Everything the encoder needs for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSpec {
    pub inputs: Vec<RenderInput>,
    pub graph: FilterGraph,
    pub video_map: Pad,
    pub audio_map: Pad,
    pub output: OutputOptions,
}

impl RenderSpec {
    pub fn filter_complex(&self) -> String {
        self.graph.render()
    }

    pub fn has_music(&self) -> bool {
        self.inputs
            .iter()
            .any(|i| matches!(i.kind, InputKind::LoopedAudio))
    }

    /// Complete ffmpeg argument list (without the program name), always overwriting
    pub fn to_args(&self, output: &Path) -> Vec<String> {
        let mut args = vec!["-y".to_string()];
        for input in &self.inputs {
            args.extend(input.args());
        }
        if !self.graph.is_empty() {
            args.push("-filter_complex".to_string());
            args.push(self.filter_complex());
        }
        args.extend([
            "-map".to_string(),
            self.video_map.map_arg(),
            "-map".to_string(),
            self.audio_map.map_arg(),
        ]);
        args.extend(self.output.args());
        args.push(output.to_string_lossy().to_string());
        args
    }
}

/// Builds a [`RenderSpec`] from images, timing and audio
#[derive(Debug, Clone)]
pub struct RenderGraphBuilder {
    config: RenderConfig,
}

impl RenderGraphBuilder {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        images: &ImageSet,
        timing: &TimingPlan,
        audio: &AudioTrack,
        music: Option<&Path>,
    ) -> Result<RenderSpec, RenderError> {
        if images.is_empty() {
            return Err(RenderError::NoImages);
        }
        if !audio.path.exists() {
            return Err(RenderError::AudioMissing(audio.path.clone()));
        }
        if timing.image_count != images.len() || timing.crossfade_offsets.len() + 1 != images.len()
        {
            return Err(RenderError::TimingMismatch {
                images: images.len(),
                planned: timing.image_count,
                offsets: timing.crossfade_offsets.len(),
            });
        }

        let (width, height) = (self.config.width, self.config.height);
        let mut inputs = Vec::with_capacity(images.len() + 2);
        let mut graph = FilterGraph::default();

        // Per-image normalisation to the output box
        let mut scaled = Vec::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            inputs.push(RenderInput {
                path: image.to_path_buf(),
                kind: InputKind::StillImage {
                    duration: timing.input_duration(),
                },
            });
            scaled.push(graph.push(FilterChain {
                inputs: vec![Pad::Input {
                    index: i,
                    stream: StreamKind::Video,
                }],
                filters: vec![
                    Filter::ScaleToFit { width, height },
                    Filter::PadCenter { width, height },
                    Filter::SquarePixels,
                ],
                output: format!("v{}", i),
            }));
        }

        // Left fold of crossfades
        let mut video = scaled[0].clone();
        for (k, &offset) in (1..).zip(&timing.crossfade_offsets) {
            let next = &scaled[k];
            video = graph.push(FilterChain {
                inputs: vec![video, next.clone()],
                filters: vec![Filter::Xfade {
                    transition: XfadeTransition::Fade,
                    duration: timing.transition_duration,
                    offset,
                }],
                output: format!("xf{}", k),
            });
        }

        let voice_index = images.len();
        inputs.push(RenderInput {
            path: audio.path.clone(),
            kind: InputKind::Audio,
        });
        let voice = Pad::Input {
            index: voice_index,
            stream: StreamKind::Audio,
        };

        let music = music.and_then(|path| {
            if path.exists() {
                Some(path)
            } else {
                warn!("Background music {} not found; using narration only", path.display());
                None
            }
        });

        let audio_map = match music {
            None => voice,
            Some(music_path) => {
                inputs.push(RenderInput {
                    path: music_path.to_path_buf(),
                    kind: InputKind::LoopedAudio,
                });
                let voice_level = graph.push(FilterChain {
                    inputs: vec![voice],
                    filters: vec![Filter::Volume {
                        level: self.config.voice_volume,
                    }],
                    output: "a_voice".to_string(),
                });
                let music_level = graph.push(FilterChain {
                    inputs: vec![Pad::Input {
                        index: voice_index + 1,
                        stream: StreamKind::Audio,
                    }],
                    filters: vec![Filter::Volume {
                        level: self.config.music_volume,
                    }],
                    output: "a_music".to_string(),
                });
                graph.push(FilterChain {
                    inputs: vec![voice_level, music_level],
                    filters: vec![Filter::Amix {
                        inputs: 2,
                        duration: MixDuration::First,
                        normalize: false,
                    }],
                    output: "outa".to_string(),
                })
            }
        };

        debug!(
            "Render graph: {} images, {} crossfades, music: {}",
            images.len(),
            graph.count("xfade"),
            music.is_some()
        );

        Ok(RenderSpec {
            inputs,
            graph,
            video_map: video,
            audio_map,
            output: OutputOptions::from_config(&self.config),
        })
    }
}

/// Seconds/levels with at most millisecond precision and no trailing zeros
pub(crate) fn fmt_num(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" { "0".to_string() } else { s.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        images: ImageSet,
        audio: AudioTrack,
        music: PathBuf,
    }

    fn fixture(image_count: usize, duration: f64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..image_count {
            let p = dir.path().join(format!("img_{}.jpg", i));
            std::fs::write(&p, b"jpg").unwrap();
            paths.push(p);
        }
        let audio_path = dir.path().join("voice.mp3");
        std::fs::write(&audio_path, b"mp3").unwrap();
        let music = dir.path().join("background.mp3");
        std::fs::write(&music, b"mp3").unwrap();
        Fixture {
            images: ImageSet::new(paths).unwrap(),
            audio: AudioTrack {
                path: audio_path,
                duration,
            },
            music,
            _dir: dir,
        }
    }

    fn build(fx: &Fixture, music: Option<&Path>) -> RenderSpec {
        let timing = TimingPlan::plan(fx.images.len(), fx.audio.duration);
        RenderGraphBuilder::new(RenderConfig::default())
            .build(&fx.images, &timing, &fx.audio, music)
            .unwrap()
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(5.0), "5");
        assert_eq!(fmt_num(10.0), "10");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(0.15), "0.15");
        assert_eq!(fmt_num(0.0), "0");
        assert_eq!(fmt_num(10.0 / 3.0), "3.333");
    }

    #[test]
    fn test_single_image_has_no_crossfade() {
        let fx = fixture(1, 10.0);
        let spec = build(&fx, None);

        assert_eq!(spec.graph.count("xfade"), 0);
        assert_eq!(spec.video_map, Pad::label("v0"));
        assert_eq!(
            spec.audio_map,
            Pad::Input {
                index: 1,
                stream: StreamKind::Audio
            }
        );
        assert_eq!(
            spec.filter_complex(),
            "[0:v]scale=1080:1920:force_original_aspect_ratio=decrease,pad=1080:1920:(ow-iw)/2:(oh-ih)/2,setsar=1[v0]"
        );
        assert_eq!(
            spec.inputs[0].kind,
            InputKind::StillImage { duration: 10.0 }
        );
    }

    #[test]
    fn test_three_images_chain_crossfades() {
        let fx = fixture(3, 15.0);
        let spec = build(&fx, None);

        assert_eq!(spec.graph.count("xfade"), 2);
        assert_eq!(spec.graph.count("scale"), 3);
        assert_eq!(spec.video_map, Pad::label("xf2"));

        let rendered = spec.filter_complex();
        assert!(rendered.contains("[v0][v1]xfade=transition=fade:duration=0.5:offset=5[xf1]"));
        assert!(rendered.contains("[xf1][v2]xfade=transition=fade:duration=0.5:offset=10[xf2]"));
        for input in &spec.inputs[..3] {
            assert_eq!(input.kind, InputKind::StillImage { duration: 5.5 });
        }
    }

    #[test]
    fn test_music_is_looped_attenuated_and_mixed_by_voice_length() {
        let fx = fixture(5, 20.0);
        let spec = build(&fx, Some(&fx.music));

        assert!(spec.has_music());
        assert_eq!(spec.inputs.len(), 7);
        assert_eq!(spec.inputs[5].kind, InputKind::Audio);
        assert_eq!(spec.inputs[6].kind, InputKind::LoopedAudio);
        assert_eq!(spec.audio_map, Pad::label("outa"));

        let rendered = spec.filter_complex();
        assert!(rendered.contains("[5:a]volume=1[a_voice]"));
        assert!(rendered.contains("[6:a]volume=0.15[a_music]"));
        assert!(rendered.contains("[a_voice][a_music]amix=inputs=2:duration=first:normalize=0[outa]"));
        assert_eq!(spec.graph.count("xfade"), 4);
        assert!(spec.output.shortest);
    }

    #[test]
    fn test_missing_music_falls_back_to_voice() {
        let fx = fixture(2, 6.0);
        let spec = build(&fx, Some(Path::new("/no/such/music.mp3")));
        assert!(!spec.has_music());
        assert_eq!(spec.graph.count("amix"), 0);
    }

    #[test]
    fn test_missing_audio_rejected_before_graph() {
        let fx = fixture(2, 6.0);
        let audio = AudioTrack {
            path: PathBuf::from("/no/such/voice.mp3"),
            duration: 6.0,
        };
        let err = RenderGraphBuilder::new(RenderConfig::default())
            .build(&fx.images, &TimingPlan::plan(2, 6.0), &audio, None)
            .unwrap_err();
        assert!(matches!(err, RenderError::AudioMissing(_)));
    }

    #[test]
    fn test_timing_for_other_image_count_rejected() {
        let fx = fixture(3, 15.0);
        let err = RenderGraphBuilder::new(RenderConfig::default())
            .build(&fx.images, &TimingPlan::plan(2, 15.0), &fx.audio, None)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::TimingMismatch {
                images: 3,
                planned: 2,
                offsets: 1
            }
        ));
    }

    #[test]
    fn test_short_crossfade_offsets_rejected() {
        let fx = fixture(3, 15.0);
        let mut timing = TimingPlan::plan(3, 15.0);
        timing.crossfade_offsets.pop();
        let err = RenderGraphBuilder::new(RenderConfig::default())
            .build(&fx.images, &timing, &fx.audio, None)
            .unwrap_err();
        assert!(matches!(err, RenderError::TimingMismatch { offsets: 1, .. }));
    }

    #[test]
    fn test_args_layout() {
        let fx = fixture(2, 8.0);
        let spec = build(&fx, Some(&fx.music));
        let args = spec.to_args(Path::new("/out/promo.mp4"));

        assert_eq!(args[0], "-y");
        assert_eq!(&args[1..5], ["-loop", "1", "-t", "4.5"]);
        assert!(args.windows(2).any(|w| w == ["-stream_loop", "-1"]));
        assert!(args.windows(2).any(|w| w == ["-map", "[xf1]"]));
        assert!(args.windows(2).any(|w| w == ["-map", "[outa]"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(args.windows(2).any(|w| w == ["-r", "25"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.contains(&"-shortest".to_string()));
        assert_eq!(args.last().unwrap(), "/out/promo.mp4");
    }

    #[test]
    fn test_voice_only_maps_input_stream_directly() {
        let fx = fixture(1, 4.0);
        let args = build(&fx, None).to_args(Path::new("out.mp4"));
        assert!(args.windows(2).any(|w| w == ["-map", "1:a"]));
    }

    #[test]
    fn test_build_is_deterministic() {
        let fx = fixture(4, 12.0);
        let a = build(&fx, Some(&fx.music));
        let b = build(&fx, Some(&fx.music));
        assert_eq!(a, b);
        assert_eq!(a.to_args(Path::new("o.mp4")), b.to_args(Path::new("o.mp4")));
    }
}
