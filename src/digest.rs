//! The digest pipeline.
//!
//! Fetches workspace activity, aggregates it, folds in the stored trend,
//! composes the report and optionally delivers it. Every step runs
//! sequentially and flows in one direction only.

use crate::analysis::{
    aggregate, human_directory, quiet_users, select_channels, top_users, Aggregates,
    ChannelHistory, HumanDirectory, MembershipPolicy,
};
use crate::config::Config;
use crate::models::{Channel, ReportWindow};
use crate::publisher::{publish, PublishOutcome};
use crate::report::{compose_report, render_text, ReportInput};
use crate::slack::{collect_pages, SlackClient};
use crate::trend::{Growth, TrendRecord, TrendStore};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Settings for one digest run, resolved from configuration.
#[derive(Debug, Clone)]
pub struct DigestSettings {
    pub window: ReportWindow,
    pub channel_types: String,
    pub membership: MembershipPolicy,
    pub top_users: usize,
    pub top_channels: usize,
    pub quiet_threshold: usize,
    pub show_quiet_users: bool,
    pub closing_line: String,
}

impl DigestSettings {
    /// Settings for a window ending at `end`.
    pub fn from_config(config: &Config, end: DateTime<Utc>) -> Self {
        Self {
            window: ReportWindow::trailing_days(end, config.digest.window_days.max(1)),
            channel_types: config.slack.channel_types.clone(),
            membership: config.digest.membership,
            top_users: config.digest.top_users.max(1),
            top_channels: config.digest.top_channels.max(1),
            quiet_threshold: config.digest.quiet_threshold,
            show_quiet_users: config.digest.show_quiet_users,
            closing_line: config.digest.closing_line.clone(),
        }
    }
}

/// Raw data gathered from Slack for one window.
#[derive(Debug, Clone, Default)]
pub struct Activity {
    pub humans: HumanDirectory,
    pub histories: Vec<ChannelHistory>,
    /// Listing calls (`users.list`, `conversations.list`) that stopped early.
    pub listing_failures: Vec<String>,
}

impl Activity {
    /// True when both directory listings were read to the end.
    pub fn listings_complete(&self) -> bool {
        self.listing_failures.is_empty()
    }
}

/// Read users, channels and per-channel history.
///
/// Listing failures are logged and the run continues with whatever was
/// collected. A history failure zeroes that channel only.
pub async fn fetch_activity(
    client: &SlackClient,
    settings: &DigestSettings,
    show_progress: bool,
) -> Activity {
    let mut listing_failures = Vec::new();

    let users = collect_pages("users.list", move |cursor| client.users_page(cursor)).await;
    if let Some(ref failure) = users.failure {
        warn!(
            "Error listing users after {} pages: {} (continuing with {} users)",
            failure.pages_completed,
            failure.reason,
            users.items.len()
        );
        listing_failures.push(format!("users.list: {}", failure.reason));
    }
    let humans = human_directory(users.items);
    info!("Found {} human users", humans.len());

    let types = settings.channel_types.as_str();
    let channels = collect_pages("conversations.list", move |cursor| {
        client.list_channels_page(types, cursor)
    })
    .await;
    if let Some(ref failure) = channels.failure {
        warn!(
            "Error listing channels after {} pages: {} (continuing with {} channels)",
            failure.pages_completed,
            failure.reason,
            channels.items.len()
        );
        listing_failures.push(format!("conversations.list: {}", failure.reason));
    }

    let listed = channels.items.len();
    let selected = select_channels(channels.items, settings.membership);
    info!(
        "Reading {} of {} channels ({:?})",
        selected.len(),
        listed,
        settings.membership
    );

    let histories = fetch_histories(client, &selected, &settings.window, show_progress).await;

    Activity {
        humans,
        histories,
        listing_failures,
    }
}

async fn fetch_histories(
    client: &SlackClient,
    channels: &[Channel],
    window: &ReportWindow,
    show_progress: bool,
) -> Vec<ChannelHistory> {
    let progress = if show_progress {
        let pb = ProgressBar::new(channels.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} #{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let oldest_ts = window.oldest_ts();
    let mut histories = Vec::with_capacity(channels.len());

    for channel in channels {
        progress.set_message(channel.name.clone());

        let channel_id = channel.id.as_str();
        let oldest = oldest_ts.as_str();
        let label = format!("conversations.history #{}", channel.name);
        let fetched = collect_pages(&label, move |cursor| {
            client.history_page(channel_id, oldest, cursor)
        })
        .await;

        let messages = fetched.into_complete();
        match &messages {
            Ok(messages) => debug!("#{}: {} messages", channel.name, messages.len()),
            Err(failure) => warn!("Skip #{} ({}): {}", channel.name, channel.id, failure.reason),
        }

        histories.push(ChannelHistory {
            channel: channel.clone(),
            messages,
        });
        progress.inc(1);
    }

    progress.finish_and_clear();
    histories
}

/// One ranked entry in the JSON summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub name: String,
    pub messages: usize,
}

fn ranked(entries: &[(String, usize)]) -> Vec<RankedEntry> {
    entries
        .iter()
        .map(|(name, messages)| RankedEntry {
            name: name.clone(),
            messages: *messages,
        })
        .collect()
}

/// Machine-readable view of a digest.
#[derive(Debug, Clone, Serialize)]
pub struct DigestSummary {
    pub window: ReportWindow,
    pub total_messages: usize,
    pub active_members: usize,
    pub top_users: Vec<RankedEntry>,
    pub top_channels: Vec<RankedEntry>,
    pub unreadable_channels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet_users: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emerging_voices: Option<Vec<String>>,
    pub weekly_totals: Vec<u64>,
}

/// A composed digest and the trend record that follows from it.
#[derive(Debug, Clone)]
pub struct Digest {
    pub aggregates: Aggregates,
    pub report: ReportInput,
    /// Record to persist after delivery; `None` when trends are disabled.
    pub next_trend: Option<TrendRecord>,
}

impl Digest {
    /// The message body as it is posted.
    pub fn text(&self) -> String {
        render_text(&compose_report(&self.report))
    }

    pub fn summary(&self) -> DigestSummary {
        let trend = self.report.trend.as_ref();

        DigestSummary {
            window: self.report.window,
            total_messages: self.report.total_messages,
            active_members: self.report.active_members,
            top_users: ranked(&self.report.top_users),
            top_channels: ranked(&self.report.top_channels),
            unreadable_channels: self.aggregates.unreadable_channels.clone(),
            quiet_users: self.report.quiet_users.clone(),
            growth_pct: trend.and_then(|t| match t.growth {
                Growth::Percent(pct) => Some(pct),
                Growth::NoBaseline => None,
            }),
            emerging_voices: trend
                .filter(|t| t.has_baseline)
                .map(|t| t.new_active.iter().cloned().collect()),
            weekly_totals: self.report.weekly_totals.clone(),
        }
    }
}

/// Aggregate activity and fold in the previous trend record, if any.
pub fn build_digest(
    activity: &Activity,
    settings: &DigestSettings,
    previous: Option<&TrendRecord>,
) -> Digest {
    let aggregates = aggregate(&activity.histories, &activity.humans);
    let total = aggregates.total_messages() as u64;
    let active_ids = aggregates.active_user_ids();

    let delta = previous.map(|record| record.merge(total, &active_ids));
    let next_trend = previous.map(|record| record.advance(total, &active_ids));

    let quiet = settings
        .show_quiet_users
        .then(|| quiet_users(&aggregates, &activity.humans, settings.quiet_threshold));

    let report = ReportInput {
        window: settings.window,
        total_messages: aggregates.total_messages(),
        active_members: aggregates.active_members(),
        top_users: top_users(&aggregates, &activity.humans, settings.top_users),
        top_users_limit: settings.top_users,
        top_channels: aggregates.by_channel.most_common(settings.top_channels),
        quiet_users: quiet,
        quiet_threshold: settings.quiet_threshold,
        trend: delta,
        weekly_totals: next_trend
            .as_ref()
            .map(|r| r.weeks.clone())
            .unwrap_or_default(),
        closing_line: settings.closing_line.clone(),
    };

    Digest {
        aggregates,
        report,
        next_trend,
    }
}

/// What to do with the composed digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery<'a> {
    /// Post to this channel or user id and persist the trend.
    Post { destination: &'a str },
    /// Compose only; nothing is posted or persisted.
    DryRun,
}

/// Everything that happened during one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub digest: Digest,
    /// `None` for dry runs.
    pub published: Option<PublishOutcome>,
    pub trend_saved: bool,
}

/// Run the full pipeline once.
///
/// Never fails: remote and storage errors are logged and degrade the
/// digest instead of aborting it.
pub async fn execute(
    client: &SlackClient,
    settings: &DigestSettings,
    store: Option<&TrendStore>,
    delivery: Delivery<'_>,
    show_progress: bool,
) -> RunReport {
    let (previous, mut writable) = match store {
        None => (None, false),
        Some(store) => match store.load() {
            Ok(record) => (Some(record), true),
            Err(e) if e.is_replaceable() => {
                warn!("Replacing unusable trend file: {}", e);
                (Some(TrendRecord::default()), true)
            }
            Err(e) => {
                warn!("Leaving trend file untouched this run: {}", e);
                (Some(TrendRecord::default()), false)
            }
        },
    };

    let activity = fetch_activity(client, settings, show_progress).await;
    let digest = build_digest(&activity, settings, previous.as_ref());

    if writable && !activity.listings_complete() {
        warn!(
            "Not updating trend record, listings were incomplete: {}",
            activity.listing_failures.join("; ")
        );
        writable = false;
    }

    info!(
        "Counted {} messages across {} channels",
        digest.aggregates.total_messages(),
        digest.aggregates.by_channel.len()
    );
    if digest.aggregates.by_user.is_empty() {
        warn!("No messages from human members in {}", settings.window.label());
    }
    if !digest.aggregates.unreadable_channels.is_empty() {
        warn!(
            "{} channels could not be read: {}",
            digest.aggregates.unreadable_channels.len(),
            digest.aggregates.unreadable_channels.join(", ")
        );
    }

    let destination = match delivery {
        Delivery::Post { destination } => destination,
        Delivery::DryRun => {
            return RunReport {
                digest,
                published: None,
                trend_saved: false,
            };
        }
    };

    let published = publish(client, destination, &digest.text()).await;

    let mut trend_saved = false;
    if let (true, Some(store), Some(record)) = (writable, store, digest.next_trend.as_ref()) {
        match store.save(record) {
            Ok(()) => trend_saved = true,
            Err(e) => warn!("Failed to save trend record: {:#}", e),
        }
    }

    RunReport {
        digest,
        published: Some(published),
        trend_saved,
    }
}
