//! Digest text composition.
//!
//! Turns aggregated activity into the ordered lines of the weekly digest.
//! Nothing here performs I/O, so every section can be tested from
//! synthetic input.

use crate::models::ReportWindow;
use crate::trend::{Growth, TrendDelta};

/// Width of the longest bar in the weekly chart.
const BAR_WIDTH: u64 = 20;

/// Everything the composer needs to render one digest.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub window: ReportWindow,
    pub total_messages: usize,
    pub active_members: usize,
    /// `(display name, count)`, already ranked.
    pub top_users: Vec<(String, usize)>,
    /// Requested size of the user ranking, shown in its heading.
    pub top_users_limit: usize,
    /// `(channel name, count)`, already ranked.
    pub top_channels: Vec<(String, usize)>,
    /// `None` when the quiet-member section is disabled.
    pub quiet_users: Option<Vec<String>>,
    pub quiet_threshold: usize,
    /// `None` when trend tracking is disabled.
    pub trend: Option<TrendDelta>,
    /// Up to four weekly totals, oldest first, including this run.
    pub weekly_totals: Vec<u64>,
    pub closing_line: String,
}

/// Compose the digest as an ordered list of lines.
pub fn compose_report(input: &ReportInput) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!(
        "📅 *Weekly Slack Activity — Week of {}*",
        input.window.label()
    ));

    lines.extend(totals_section(input));
    lines.extend(top_users_section(input));
    lines.extend(top_channels_section(&input.top_channels));

    if let Some(ref quiet) = input.quiet_users {
        lines.extend(quiet_section(quiet, input.quiet_threshold));
    }

    if let Some(ref trend) = input.trend {
        if trend.has_baseline {
            lines.push(String::new());
            lines.push(format!("🌱 Emerging voices: {}", trend.new_active.len()));
        }
    }

    lines.extend(weekly_chart(&input.weekly_totals));

    lines.push(String::new());
    lines.push(input.closing_line.clone());

    lines
}

/// Join composed lines into the message body.
pub fn render_text(lines: &[String]) -> String {
    lines.join("\n")
}

fn totals_section(input: &ReportInput) -> Vec<String> {
    let mut section = vec![
        String::new(),
        format!("💬 Total messages: {}", input.total_messages),
        format!("👥 Active members: {}", input.active_members),
    ];

    if let Some(ref trend) = input.trend {
        section.push(match trend.growth {
            Growth::Percent(pct) => format!("📈 Growth vs last week: {:+.1}%", pct),
            Growth::NoBaseline => "📈 Growth vs last week: n/a (no baseline yet)".to_string(),
        });
    }

    section
}

fn top_users_section(input: &ReportInput) -> Vec<String> {
    let mut section = vec![
        String::new(),
        format!("🏆 *Top {} Active Users*", input.top_users_limit),
    ];

    if input.top_users.is_empty() {
        section.push("—".to_string());
    }
    for (i, (name, count)) in input.top_users.iter().enumerate() {
        section.push(format!("{} {} — {} msgs", rank_marker(i + 1), name, count));
    }

    section
}

fn top_channels_section(channels: &[(String, usize)]) -> Vec<String> {
    let mut section = vec![String::new(), "📣 *Most Active Channels*".to_string()];

    if channels.is_empty() {
        section.push("—".to_string());
    }
    for (name, count) in channels {
        section.push(format!("#{} — {} msgs", name, count));
    }

    section
}

fn quiet_section(quiet: &[String], threshold: usize) -> Vec<String> {
    if quiet.is_empty() {
        return Vec::new();
    }

    vec![
        String::new(),
        format!("🤫 *Quiet Members (<{} msgs)*", threshold),
        quiet.join(", "),
    ]
}

fn weekly_chart(weeks: &[u64]) -> Vec<String> {
    if weeks.is_empty() {
        return Vec::new();
    }

    let max = weeks.iter().copied().max().unwrap_or(0);
    let mut section = vec![String::new(), format!("📊 *Last {} Weeks*", weeks.len())];

    for (i, &count) in weeks.iter().enumerate() {
        let weeks_ago = weeks.len() - 1 - i;
        let label = match weeks_ago {
            0 => "This week".to_string(),
            1 => "1 wk ago".to_string(),
            n => format!("{} wks ago", n),
        };
        let bar = "█".repeat(bar_length(count, max));
        section.push(format!("`{:<9}` {} {}", label, bar, count));
    }

    section
}

/// Bar length proportional to `count / max`, truncated.
pub fn bar_length(count: u64, max: u64) -> usize {
    if max == 0 {
        return 0;
    }
    (count.min(max) * BAR_WIDTH / max) as usize
}

/// Keycap emoji for ranks 1-10, plain numbering after that.
fn rank_marker(rank: usize) -> String {
    match rank {
        1..=9 => format!("{}\u{fe0f}\u{20e3}", rank),
        10 => "🔟".to_string(),
        n => format!("{}.", n),
    }
}
