//! Data models for the workspace digest.
//!
//! This module contains the Slack entities we read from the Web API and
//! the reporting window shared by the pipeline and the report composer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Subtype Slack assigns to messages posted by integrations.
pub const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

/// A workspace channel as returned by `conversations.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// Archived channels are never read.
    #[serde(default)]
    pub is_archived: bool,
    /// Whether the bot account has joined the channel.
    #[serde(default)]
    pub is_member: bool,
}

/// A single entry from `conversations.history`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author id. Absent for most integration posts.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub ts: String,
}

impl Message {
    /// Returns true if the message was posted by a bot, integration or app.
    pub fn is_bot_origin(&self) -> bool {
        self.subtype.as_deref() == Some(BOT_MESSAGE_SUBTYPE)
            || self.bot_id.is_some()
            || self.app_id.is_some()
    }
}

/// Profile block attached to every workspace member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub real_name: Option<String>,
}

/// A workspace member as returned by `users.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Account (handle) name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub profile: UserProfile,
}

impl User {
    /// A human user is neither a bot account nor deleted.
    pub fn is_human(&self) -> bool {
        !self.is_bot && !self.deleted
    }

    /// Name shown in the digest: profile real name, then account name, then raw id.
    pub fn display_name(&self) -> &str {
        non_empty(self.profile.real_name.as_deref())
            .or_else(|| non_empty(self.name.as_deref()))
            .unwrap_or(&self.id)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// The trailing time window a digest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// Window ending at `end` and reaching back `days` days.
    pub fn trailing_days(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    /// The window start as a Slack `oldest` timestamp (`seconds.micros`).
    pub fn oldest_ts(&self) -> String {
        format!(
            "{}.{:06}",
            self.start.timestamp(),
            self.start.timestamp_subsec_micros()
        )
    }

    /// Human-readable range, e.g. `Oct 12–Oct 19`.
    pub fn label(&self) -> String {
        format!("{}–{}", self.start.format("%b %d"), self.end.format("%b %d"))
    }
}
