//! Message filtering and activity aggregation.
//!
//! This module turns raw channel histories into two frequency tables:
//! messages per human user and messages per channel.

use crate::models::{Channel, Message, User};
use crate::slack::pagination::FetchFailure;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Which channels are eligible for history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipPolicy {
    /// Only channels the bot has joined (avoids `not_in_channel` errors).
    #[default]
    MemberOnly,
    /// Every non-archived channel; unreadable ones count as zero.
    All,
}

/// A frequency table that remembers first-insertion order.
///
/// Ranking ties are broken by that order, so results are deterministic
/// for a given input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Tally {
    /// Add `n` to `key`, registering the key even when `n` is zero.
    pub fn add(&mut self, key: &str, n: usize) {
        match self.counts.get_mut(key) {
            Some(count) => *count += n,
            None => {
                self.order.push(key.to_string());
                self.counts.insert(key.to_string(), n);
            }
        }
    }

    pub fn get(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.order
            .iter()
            .map(|key| (key.as_str(), self.counts[key.as_str()]))
    }

    /// The `n` largest entries, count descending, ties in insertion order.
    pub fn most_common(&self, n: usize) -> Vec<(String, usize)> {
        let mut entries: Vec<(String, usize)> =
            self.iter().map(|(k, c)| (k.to_string(), c)).collect();
        entries.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
        entries.truncate(n);
        entries
    }
}

/// Human users keyed by id.
pub type HumanDirectory = HashMap<String, User>;

/// Keep only human users (not bots, not deleted).
pub fn human_directory(users: Vec<User>) -> HumanDirectory {
    users
        .into_iter()
        .filter(User::is_human)
        .map(|u| (u.id.clone(), u))
        .collect()
}

/// Drop archived channels and, under [`MembershipPolicy::MemberOnly`],
/// channels the bot has not joined.
pub fn select_channels(channels: Vec<Channel>, policy: MembershipPolicy) -> Vec<Channel> {
    channels
        .into_iter()
        .filter(|c| !c.is_archived)
        .filter(|c| policy == MembershipPolicy::All || c.is_member)
        .collect()
}

/// Whether a message counts toward activity totals.
pub fn is_countable(message: &Message) -> bool {
    !message.is_bot_origin()
}

/// A channel together with the result of reading its history.
#[derive(Debug, Clone)]
pub struct ChannelHistory {
    pub channel: Channel,
    pub messages: Result<Vec<Message>, FetchFailure>,
}

/// Activity totals for one reporting window.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    /// Messages per known human author id.
    pub by_user: Tally,
    /// Messages per channel name, including channels with none.
    pub by_channel: Tally,
    /// Channels whose history could not be read.
    pub unreadable_channels: Vec<String>,
}

impl Aggregates {
    /// Every countable message, whether or not its author is a known human.
    pub fn total_messages(&self) -> usize {
        self.by_channel.total()
    }

    /// Number of human users with at least one message.
    pub fn active_members(&self) -> usize {
        self.by_user.iter().filter(|(_, c)| *c > 0).count()
    }

    pub fn active_user_ids(&self) -> BTreeSet<String> {
        self.by_user
            .iter()
            .filter(|(_, c)| *c > 0)
            .map(|(id, _)| id.to_string())
            .collect()
    }
}

/// Tally countable messages per channel and per known human author.
///
/// A channel whose history failed contributes zero messages.
pub fn aggregate(histories: &[ChannelHistory], humans: &HumanDirectory) -> Aggregates {
    let mut aggregates = Aggregates::default();

    for history in histories {
        let name = &history.channel.name;

        let messages = match &history.messages {
            Ok(messages) => messages,
            Err(_) => {
                aggregates.by_channel.add(name, 0);
                aggregates.unreadable_channels.push(name.clone());
                continue;
            }
        };

        let mut counted = 0;
        for message in messages.iter().filter(|m| is_countable(m)) {
            counted += 1;
            if let Some(author) = message.user.as_deref() {
                if humans.contains_key(author) {
                    aggregates.by_user.add(author, 1);
                }
            }
        }

        aggregates.by_channel.add(name, counted);
    }

    aggregates
}

/// Top `n` human users as `(display name, count)`.
pub fn top_users(aggregates: &Aggregates, humans: &HumanDirectory, n: usize) -> Vec<(String, usize)> {
    aggregates
        .by_user
        .most_common(n)
        .into_iter()
        .map(|(id, count)| {
            let name = humans
                .get(&id)
                .map(|u| u.display_name().to_string())
                .unwrap_or(id);
            (name, count)
        })
        .collect()
}

/// Display names of human users with fewer than `threshold` messages,
/// including users who posted nothing. Sorted case-insensitively.
pub fn quiet_users(aggregates: &Aggregates, humans: &HumanDirectory, threshold: usize) -> Vec<String> {
    let mut names: Vec<String> = humans
        .values()
        .filter(|u| aggregates.by_user.get(&u.id) < threshold)
        .map(|u| u.display_name().to_string())
        .collect();

    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    names
}
