//! Output formatting and logging utilities
//!
//! Tokens go to stdout untouched so output can be piped. Everything else
//! (status lines, decisions, errors) goes to stderr, colored when stderr is a
//! terminal.

use owo_colors::OwoColorize;
use std::env;
use std::io::{self, Write};
use streamgate_core::RateLimitDecision;
use tracing_subscriber::EnvFilter;

/// Output level for controlling what gets displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLevel {
    /// Show all output (normal mode)
    Normal,
    /// Show only errors (quiet mode)
    Quiet,
    /// Show extra debug information (verbose mode)
    Verbose,
}

impl OutputLevel {
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    /// Check if user-facing messages should be shown (excludes errors/hints which always show)
    pub fn show_user(&self) -> bool {
        matches!(self, Self::Normal | Self::Verbose)
    }

    fn default_directive(&self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "streamgate=debug,streamgate_core=debug,warn",
        }
    }
}

/// Install the global log subscriber.
///
/// `RUST_LOG` takes precedence over the level implied by `-v`/`-q`. Records
/// from the `log` facade used by the library are captured too.
pub fn init_logging(output_level: OutputLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(output_level.default_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(!colors_disabled())
        .try_init();
}

/// Check if colored output should be disabled
fn colors_disabled() -> bool {
    env::var("NO_COLOR").is_ok()
        || env::var("TERM").is_ok_and(|t| t == "dumb")
        || !atty::is(atty::Stream::Stderr)
}

fn print_colored<T>(msg: &str, styled_msg: T, output_level: OutputLevel, always_show: bool)
where
    T: std::fmt::Display,
{
    if always_show || output_level.show_user() {
        if !colors_disabled() {
            eprintln!("{styled_msg}");
        } else {
            eprintln!("{msg}");
        }
    }
}

/// Print a heading with bold formatting
pub fn heading(msg: &str, output_level: OutputLevel) {
    print_colored(msg, msg.bold(), output_level, false);
}

/// Print a note message with default formatting (no prefix)
pub fn note(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        eprintln!("{msg}");
    }
}

/// Print a success message with green color (no prefix)
pub fn success(msg: &str, output_level: OutputLevel) {
    print_colored(msg, msg.green(), output_level, false);
}

/// Print a warning message with "Warning:" prefix in yellow
pub fn warning(msg: &str, output_level: OutputLevel) {
    if output_level.show_user() {
        if !colors_disabled() {
            eprintln!("{} {}", "Warning:".yellow().bold(), msg.yellow());
        } else {
            eprintln!("Warning: {msg}");
        }
    }
}

/// Print an error message with "Error:" prefix in red (always shown)
pub fn error(msg: &str) {
    if !colors_disabled() {
        eprintln!("{} {}", "Error:".red().bold(), msg.red());
    } else {
        eprintln!("Error: {msg}");
    }
}

/// Print a hint message with "Hint:" prefix in blue (always shown)
pub fn hint(msg: &str) {
    if !colors_disabled() {
        eprintln!("{} {}", "Hint:".blue().bold(), msg.blue());
    } else {
        eprintln!("Hint: {msg}");
    }
}

/// Write one token to stdout as soon as it arrives
pub fn token(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}

/// Format a provider name with colors
pub fn format_provider(provider: &str) -> String {
    if colors_disabled() {
        provider.to_string()
    } else {
        provider.magenta().bold().to_string()
    }
}

/// One-line summary of a rate limit decision
pub fn format_decision(decision: &RateLimitDecision) -> String {
    let reset = format!("{:.1}s", decision.reset_after.as_secs_f64());
    let (verdict, styled) = if decision.allowed {
        ("allowed", "allowed".green().bold().to_string())
    } else {
        ("rejected", "rejected".red().bold().to_string())
    };
    let verdict = if colors_disabled() {
        verdict.to_string()
    } else {
        styled
    };

    format!(
        "{verdict} remaining={}/{} reset_in={reset}",
        decision.remaining, decision.limit
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_output_level_from_flags() {
        assert_eq!(OutputLevel::from_flags(true, true), OutputLevel::Quiet);
        assert_eq!(OutputLevel::from_flags(false, true), OutputLevel::Verbose);
        assert!(OutputLevel::from_flags(false, false).show_user());
        assert!(!OutputLevel::Quiet.show_user());
    }

    #[test]
    fn test_format_decision_mentions_quota() {
        let decision = RateLimitDecision {
            allowed: true,
            remaining: 3,
            limit: 5,
            reset_after: Duration::from_millis(29_500),
        };
        let line = format_decision(&decision);
        assert!(line.contains("remaining=3/5"));
        assert!(line.contains("reset_in=29.5s"));
    }
}
