//! Reel CLI - narrated product videos from the terminal
//!
//! Wraps the reel pipeline: product photos plus a narration (or a product name to write
//! one for) in, a vertical promo video out.

mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use commands::{MusicChoice, PlanArgs, RenderArgs};

/// Reel CLI - narrated product video renderer
#[derive(Parser)]
#[command(name = "reel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render narrated vertical product videos from photos")]
#[command(long_about = r#"
Reel turns an ordered set of product photos and a narration into a 1080x1920 promo video.

Speech is synthesized by the first provider that succeeds (OpenAI, TikTok, Google), the
photos are crossfaded to fill the narration exactly, and background music is mixed in
under the voice when available.

Examples:
  reel render -i a.jpg -i b.jpg --narration "Stop scroll! ..."
  reel render -i a.jpg --product "Serum Vitamin C" -o promo.mp4
  reel voice --text "Halo semua" -o voice.mp3
  reel plan -i a.jpg -i b.jpg --audio voice.mp3
  reel config --set render.fps=30
"#)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct MusicArgs {
    /// Background music (defaults to background.* in the music directory)
    #[arg(short, long, conflicts_with = "no_music")]
    music: Option<PathBuf>,

    /// Narration only, even if background music is available
    #[arg(long)]
    no_music: bool,
}

impl From<MusicArgs> for MusicChoice {
    fn from(args: MusicArgs) -> Self {
        MusicChoice {
            path: args.music,
            disabled: args.no_music,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render a video end to end
    Render {
        /// Product photo, in display order (repeatable)
        #[arg(short, long = "image", required = true)]
        images: Vec<PathBuf>,

        /// Narration text to speak as-is
        #[arg(long, group = "script")]
        narration: Option<String>,

        /// Read the narration from a file
        #[arg(long, group = "script")]
        narration_file: Option<PathBuf>,

        /// Generate the narration for this product name
        #[arg(short, long, group = "script")]
        product: Option<String>,

        #[command(flatten)]
        music: MusicArgs,

        /// Output video (defaults to the output directory with a timestamped name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Synthesize narration audio only
    Voice {
        /// Text to speak
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output audio file
        #[arg(short, long, default_value = "narration.mp3")]
        output: PathBuf,
    },

    /// Show the timing plan and encoder command without rendering
    Plan {
        /// Product photo, in display order (repeatable)
        #[arg(short, long = "image", required = true)]
        images: Vec<PathBuf>,

        /// Narration audio the video will carry
        #[arg(short, long)]
        audio: PathBuf,

        /// Narration length in seconds (read from --audio when omitted)
        #[arg(short, long)]
        duration: Option<f64>,

        #[command(flatten)]
        music: MusicArgs,

        /// Output video path used in the printed command
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print only the command line
        #[arg(long)]
        raw: bool,
    },

    /// Configuration management
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set a configuration value (key=value)
        #[arg(long)]
        set: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    utils::logging::init_tracing(log_level);

    // Load configuration
    let config = config::Config::load()?;

    let code = match cli.command {
        Commands::Render {
            images,
            narration,
            narration_file,
            product,
            music,
            output,
        } => {
            let args = RenderArgs {
                images,
                narration,
                narration_file,
                product,
                music: music.into(),
                output,
            };
            commands::render(&config, args).await?
        }
        Commands::Voice { text, file, output } => {
            commands::voice(&config, text, file, output).await?
        }
        Commands::Plan {
            images,
            audio,
            duration,
            music,
            output,
            raw,
        } => {
            let args = PlanArgs {
                images,
                audio,
                duration,
                music: music.into(),
                output,
                raw,
            };
            commands::plan(&config, args).await?
        }
        Commands::Config { show, set } => {
            if show {
                commands::show_config(&config)?;
            } else if let Some(kv) = set {
                commands::set_config(&kv)?;
            } else {
                commands::show_config(&config)?;
            }
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
