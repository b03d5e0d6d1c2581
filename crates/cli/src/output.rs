//! Output formatting and terminal rendering

use std::path::Path;

use colored::Colorize;
use reel::{ProviderAttempt, TimingPlan, VideoArtifact};

/// Seconds as `12.34s`
fn format_secs(secs: f64) -> String {
    format!("{:.2}s", secs)
}

/// Output handler for terminal display
#[derive(Default)]
pub struct OutputHandler;

impl OutputHandler {
    /// Colors are dropped when `NO_COLOR` is set
    pub fn new() -> Self {
        if std::env::var_os("NO_COLOR").is_some() {
            colored::control::set_override(false);
        }
        Self
    }

    /// Print a section header
    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", format!("▶ {}", text).bright_yellow().bold());
        println!("{}", "─".repeat(60).dimmed());
    }

    /// Print a success message
    pub fn print_success(&self, text: &str) {
        println!("{} {}", "✓".bright_green(), text.bright_white());
    }

    /// Print an error message
    pub fn print_error(&self, text: &str) {
        eprintln!("{} {}", "✗".bright_red(), text.bright_red());
    }

    /// Print a warning message
    pub fn print_warning(&self, text: &str) {
        println!("{} {}", "⚠".bright_yellow(), text.yellow());
    }

    /// Print an info message
    pub fn print_info(&self, text: &str) {
        println!("{} {}", "ℹ".bright_blue(), text);
    }

    /// Print an aligned `key: value` line
    pub fn print_field(&self, key: &str, value: &str) {
        println!("  {:<22} {}", format!("{}:", key).dimmed(), value.bright_white());
    }

    /// Print the summary of a finished video
    pub fn print_artifact(&self, artifact: &VideoArtifact) {
        println!();
        println!(
            "{}",
            "╔═══════════════════════════════════════════════════════════════╗".bright_green()
        );
        println!(
            "{}",
            "║                       VIDEO READY                             ║".bright_green()
        );
        println!(
            "{}",
            "╚═══════════════════════════════════════════════════════════════╝".bright_green()
        );
        self.print_field("Output", &artifact.output_path.display().to_string());
        self.print_field("Duration", &format_secs(artifact.duration));
        self.print_field("Images", &artifact.image_count.to_string());
        if let Some(script) = &artifact.script_path {
            self.print_field("Script", &script.display().to_string());
        }
        println!();
        println!("{}", "Narration".bright_cyan().bold());
        for line in artifact.narration.lines() {
            println!("  {}", line.dimmed());
        }
        println!();
    }

    /// Print why each speech provider was passed over
    pub fn print_attempts(&self, attempts: &[ProviderAttempt]) {
        println!();
        println!(
            "{}",
            format!("{:<10} {:<10} {}", "Provider", "Tier", "Reason")
                .bright_white()
                .bold()
        );
        println!("{}", "─".repeat(70).dimmed());

        for attempt in attempts {
            let reason = if attempt.reason.chars().count() > 48 {
                let cut: String = attempt.reason.chars().take(45).collect();
                format!("{}...", cut)
            } else {
                attempt.reason.clone()
            };
            println!(
                "{:<10} {:<10} {}",
                attempt.provider.bright_white(),
                attempt.kind.to_string().dimmed(),
                reason.red()
            );
        }
        println!();
    }

    /// Print per-image timing of a plan
    pub fn print_timing(&self, images: &[impl AsRef<Path>], plan: &TimingPlan) {
        println!();
        println!(
            "{}",
            format!("{:<4} {:>10} {:>10}  {}", "#", "Starts", "Shown", "Image")
                .bright_white()
                .bold()
        );
        println!("{}", "─".repeat(70).dimmed());

        for (i, image) in images.iter().enumerate() {
            let start = plan.per_image_duration * i as f64;
            println!(
                "{:<4} {:>10} {:>10}  {}",
                i,
                format_secs(start),
                format_secs(plan.input_duration()),
                image.as_ref().display().to_string().dimmed()
            );
        }
        println!();
    }

    /// Print an external command, one argument per line after the program
    pub fn print_command(&self, command: &[String]) {
        let Some((program, args)) = command.split_first() else {
            return;
        };
        println!("{}", program.bright_green());
        for arg in args {
            if arg.starts_with('-') {
                println!("  {}", arg.bright_cyan());
            } else {
                println!("    {}", arg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(12.3456), "12.35s");
        assert_eq!(format_secs(0.0), "0.00s");
    }
}
