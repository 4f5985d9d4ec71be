//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// SlackPulse - weekly Slack activity digest
///
/// Counts messages per member and per channel over a trailing window,
/// tracks week-over-week trends and posts the digest back to Slack.
///
/// Examples:
///   slackpulse
///   slackpulse --channel C0123456789 --days 14
///   slackpulse --dry-run --format json
///   slackpulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Slack bot token (xoxb-...)
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Channel or user id the digest is posted to
    #[arg(long, env = "SLACK_CHANNEL_ID", value_name = "ID")]
    pub channel: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .slackpulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Slack Web API base URL
    #[arg(long, env = "SLACK_API_BASE", value_name = "URL")]
    pub api_base: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Length of the reporting window in days
    #[arg(long, value_name = "DAYS")]
    pub days: Option<u32>,

    /// Number of members in the ranking
    #[arg(long, value_name = "COUNT")]
    pub top_users: Option<usize>,

    /// Number of channels in the ranking
    #[arg(long, value_name = "COUNT")]
    pub top_channels: Option<usize>,

    /// Read every non-archived channel, not only those the bot has joined
    ///
    /// Channels the bot cannot read are counted as zero.
    #[arg(long)]
    pub all_channels: bool,

    /// Trend record location
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Disable week-over-week trend tracking
    #[arg(long)]
    pub no_trend: bool,

    /// Print the digest instead of posting it
    ///
    /// The trend record is left untouched.
    #[arg(long)]
    pub dry_run: bool,

    /// Output format for --dry-run (text, json)
    ///
    /// JSON is only accepted together with --dry-run.
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .slackpulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for dry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// The digest text as it would be posted (default)
    #[default]
    Text,
    /// Aggregated figures as JSON
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err("A Slack bot token is required (--token or SLACK_BOT_TOKEN)".to_string());
        }

        if !self.dry_run && self.channel.as_deref().map_or(true, |c| c.trim().is_empty()) {
            return Err(
                "A destination channel is required (--channel or SLACK_CHANNEL_ID)".to_string(),
            );
        }

        if let Some(ref api_base) = self.api_base {
            if !api_base.starts_with("http://") && !api_base.starts_with("https://") {
                return Err("API base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.days == Some(0) {
            return Err("Window must be at least 1 day".to_string());
        }

        if self.top_users == Some(0) || self.top_channels == Some(0) {
            return Err("Rankings must list at least 1 entry".to_string());
        }

        if self.format == OutputFormat::Json && !self.dry_run {
            return Err("--format json is only available with --dry-run".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            token: Some("xoxb-test".to_string()),
            channel: Some("C0123".to_string()),
            config: None,
            api_base: None,
            timeout: None,
            days: None,
            top_users: None,
            top_channels: None,
            all_channels: false,
            state_file: None,
            no_trend: false,
            dry_run: false,
            format: OutputFormat::Text,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_valid_args() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_requires_token() {
        let mut args = make_args();
        args.token = Some("  ".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_dry_run_does_not_need_channel() {
        let mut args = make_args();
        args.channel = None;
        assert!(args.validate().is_err());

        args.dry_run = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_days_and_bad_url() {
        let mut args = make_args();
        args.days = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.api_base = Some("slack.com/api".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_rankings() {
        let mut args = make_args();
        args.top_users = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.top_channels = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.top_users = Some(1);
        args.top_channels = Some(1);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_json_format_requires_dry_run() {
        let mut args = make_args();
        args.format = OutputFormat::Json;
        assert!(args.validate().is_err());

        args.dry_run = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.token = None;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
