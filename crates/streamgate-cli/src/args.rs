use clap::Parser;
use std::path::PathBuf;

use crate::commands::Commands;
use crate::constants::BINARY_NAME;

// Example strings for after_long_help
const CLI_EXAMPLES: &str = r#"EXAMPLES:
  streamgate replay -p anthropic capture.sse          # Replay a captured provider stream
  curl -N ... | streamgate replay -p openai           # Adapt a live stream piped on stdin
  streamgate relay -p openai URL -b @req.json \
    -H "Authorization=Bearer $OPENAI_API_KEY"         # Rate-limited provider call
  streamgate limit 203.0.113.7 -n 7                   # Watch a key run out of quota
  streamgate info                                     # Show resolved configuration"#;

/// Helper function to remove quotes from values
fn unquote_value(value: &str) -> String {
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

/// Parse a single header
/// Supports formats: "Name=value", "Name: value", "Name=\"quoted value\""
pub fn parse_header(s: &str) -> anyhow::Result<(String, String)> {
    let s = s.trim();

    if s.is_empty() {
        return Err(anyhow::anyhow!(
            "invalid NAME=VALUE or NAME: VALUE header: empty input"
        ));
    }

    // Whichever separator comes first wins, so values may contain the other one
    let pos = s.find(['=', ':']).ok_or_else(|| {
        anyhow::anyhow!("invalid NAME=VALUE or NAME: VALUE header: no '=' or ':' found in `{s}`")
    })?;

    let name = s[..pos].trim().to_string();
    let value = s[pos + 1..].trim();

    if name.is_empty() {
        return Err(anyhow::anyhow!("invalid header: empty name"));
    }
    if name.contains(char::is_whitespace) {
        return Err(anyhow::anyhow!("invalid header name `{name}`"));
    }

    Ok((name, unquote_value(value)))
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(about = "Rate-limited, provider-agnostic streaming for LLM APIs")]
#[command(name = BINARY_NAME)]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to use instead of the platform default
    #[arg(long, global = true, env = "STREAMGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (only show errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}
