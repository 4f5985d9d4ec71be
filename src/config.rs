//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.slackpulse.toml` files. Secrets (the bot token) are never read from
//! the file; they come from the command line or the environment.

use crate::analysis::MembershipPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".slackpulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Slack API settings.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Digest content settings.
    #[serde(default)]
    pub digest: DigestConfig,

    /// Trend tracking settings.
    #[serde(default)]
    pub trend: TrendConfig,
}

/// Slack Web API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Base URL of the Web API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Items requested per page on listing endpoints.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Conversation types passed to `conversations.list`.
    #[serde(default = "default_channel_types")]
    pub channel_types: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_seconds: default_timeout(),
            page_size: default_page_size(),
            channel_types: default_channel_types(),
        }
    }
}

fn default_api_base() -> String {
    "https://slack.com/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_page_size() -> usize {
    200
}

fn default_channel_types() -> String {
    "public_channel".to_string()
}

/// What goes into the digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Length of the trailing window in days.
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Number of users in the ranking.
    #[serde(default = "default_top_users")]
    pub top_users: usize,

    /// Number of channels in the ranking.
    #[serde(default = "default_top_channels")]
    pub top_channels: usize,

    /// Users with fewer messages than this are listed as quiet.
    #[serde(default = "default_quiet_threshold")]
    pub quiet_threshold: usize,

    /// Include the quiet-member section.
    #[serde(default = "default_true")]
    pub show_quiet_users: bool,

    /// Which channels are read.
    #[serde(default)]
    pub membership: MembershipPolicy,

    /// Final line of every digest.
    #[serde(default = "default_closing_line")]
    pub closing_line: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            top_users: default_top_users(),
            top_channels: default_top_channels(),
            quiet_threshold: default_quiet_threshold(),
            show_quiet_users: true,
            membership: MembershipPolicy::default(),
            closing_line: default_closing_line(),
        }
    }
}

fn default_window_days() -> u32 {
    7
}

fn default_top_users() -> usize {
    5
}

fn default_top_channels() -> usize {
    4
}

fn default_quiet_threshold() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_closing_line() -> String {
    "⚙️ Summary: steady engagement.".to_string()
}

/// Week-over-week trend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Track growth and emerging voices across runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Where the trend record is stored.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            state_file: default_state_file(),
        }
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".slackpulse_trend.json")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref api_base) = args.api_base {
            self.slack.api_base = api_base.clone();
        }
        if let Some(timeout) = args.timeout {
            self.slack.timeout_seconds = timeout;
        }

        if let Some(days) = args.days {
            self.digest.window_days = days;
        }
        if let Some(n) = args.top_users {
            self.digest.top_users = n;
        }
        if let Some(n) = args.top_channels {
            self.digest.top_channels = n;
        }
        if args.all_channels {
            self.digest.membership = MembershipPolicy::All;
        }

        if let Some(ref state_file) = args.state_file {
            self.trend.state_file = state_file.clone();
        }
        if args.no_trend {
            self.trend.enabled = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
