//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Parser, Subcommand};

use crate::client::{DEFAULT_TIMEOUT_SECS, TimeWindow, USGS_BASE_URL};
use crate::filters::MagnitudeThreshold;
use crate::output::Format;

/// Interactive earthquake map with magnitude and time-window filtering.
#[derive(Parser, Debug)]
#[command(name = "quakemap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Base URL of the earthquake feed host
    #[arg(long, global = true, env = "QUAKEMAP_FEED_URL", default_value = USGS_BASE_URL)]
    pub feed_url: String,

    /// Feed request timeout in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Show popup times in UTC instead of the local offset
    #[arg(long, global = true)]
    pub utc: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the interactive map
    Serve(ServeArgs),

    /// Fetch once and print the markers that would be drawn
    Show(ShowArgs),
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, short = 'p', env = "QUAKEMAP_PORT", default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, env = "QUAKEMAP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Initial time window
    #[arg(long, short = 'w', default_value = "day", value_parser = parse_window)]
    pub window: TimeWindow,

    /// Initial minimum magnitude (0-7, step 0.5)
    #[arg(long, short = 'm', default_value = "0", value_parser = parse_threshold)]
    pub min_magnitude: MagnitudeThreshold,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Arguments for the `show` command.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Time window to fetch
    #[arg(long, short = 'w', default_value = "day", value_parser = parse_window)]
    pub window: TimeWindow,

    /// Minimum magnitude to show (0-7, step 0.5)
    #[arg(long, short = 'm', default_value = "0", value_parser = parse_threshold)]
    pub min_magnitude: MagnitudeThreshold,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Parse a time window from string.
fn parse_window(s: &str) -> Result<TimeWindow, String> {
    s.parse()
}

/// Parse a magnitude threshold from string.
fn parse_threshold(s: &str) -> Result<MagnitudeThreshold, String> {
    s.parse()
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_show_defaults() {
        let cli = Cli::try_parse_from(["quakemap", "show"]).unwrap();
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.window, TimeWindow::Day);
        assert_eq!(args.min_magnitude, MagnitudeThreshold::default());
        assert_eq!(args.format, Format::Human);
    }

    #[test]
    fn test_serve_rejects_off_grid_threshold() {
        let result = Cli::try_parse_from(["quakemap", "serve", "--min-magnitude", "2.2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "quakemap", "show", "--window", "week", "--utc", "--feed-url", "http://localhost:1",
        ])
        .unwrap();
        assert!(cli.utc);
        assert_eq!(cli.feed_url, "http://localhost:1");
    }
}
