//! Week-over-week trend tracking.
//!
//! A small JSON record persisted between runs holds the previous total,
//! the previous set of active users and the last few weekly totals. The
//! store performs a single read-modify-write per run; two runs at once
//! against the same file will lose one of the updates.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Current on-disk format version.
pub const TREND_SCHEMA_VERSION: u32 = 1;

/// Number of weekly totals kept for the chart.
pub const MAX_WEEKS: usize = 4;

/// Persisted snapshot of the previous run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Total messages counted by the previous run.
    #[serde(default)]
    pub previous_msgs: u64,
    /// User ids active during the previous run.
    #[serde(default)]
    pub active_users: Vec<String>,
    /// Most recent weekly totals, oldest first.
    #[serde(default)]
    pub weeks: Vec<u64>,
}

fn default_schema_version() -> u32 {
    TREND_SCHEMA_VERSION
}

impl Default for TrendRecord {
    fn default() -> Self {
        Self {
            schema_version: TREND_SCHEMA_VERSION,
            previous_msgs: 0,
            active_users: Vec::new(),
            weeks: Vec::new(),
        }
    }
}

/// Week-over-week growth of the message total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Growth {
    /// Percentage change against a non-zero previous total.
    Percent(f64),
    /// The previous total was zero; there is nothing to compare against.
    NoBaseline,
}

impl Growth {
    pub fn between(previous: u64, current: u64) -> Self {
        if previous == 0 {
            return Growth::NoBaseline;
        }
        let change = current as f64 - previous as f64;
        Growth::Percent(change / previous as f64 * 100.0)
    }
}

/// Comparison of this run against the stored snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendDelta {
    pub growth: Growth,
    /// Users active now who were not active in the previous snapshot.
    pub new_active: BTreeSet<String>,
    /// Whether a previous run left any data to compare against.
    pub has_baseline: bool,
}

impl TrendRecord {
    /// True once a run has recorded either messages or active users.
    pub fn has_baseline(&self) -> bool {
        self.previous_msgs > 0 || !self.active_users.is_empty()
    }

    /// Compare the current run with this record.
    pub fn merge(&self, current_total: u64, current_active: &BTreeSet<String>) -> TrendDelta {
        let previous_active: BTreeSet<&str> =
            self.active_users.iter().map(String::as_str).collect();

        let new_active = current_active
            .iter()
            .filter(|id| !previous_active.contains(id.as_str()))
            .cloned()
            .collect();

        TrendDelta {
            growth: Growth::between(self.previous_msgs, current_total),
            new_active,
            has_baseline: self.has_baseline(),
        }
    }

    /// The record to persist after this run: the total is appended to the
    /// weekly window (oldest dropped beyond [`MAX_WEEKS`]) and the snapshot
    /// fields are replaced.
    pub fn advance(&self, current_total: u64, current_active: &BTreeSet<String>) -> TrendRecord {
        let mut weeks = self.weeks.clone();
        weeks.push(current_total);
        if weeks.len() > MAX_WEEKS {
            weeks.drain(..weeks.len() - MAX_WEEKS);
        }

        TrendRecord {
            schema_version: TREND_SCHEMA_VERSION,
            previous_msgs: current_total,
            active_users: current_active.iter().cloned().collect(),
            weeks,
        }
    }
}

/// Why a stored trend record could not be used.
#[derive(Debug, Error)]
pub enum TrendLoadError {
    #[error("failed to read trend file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trend file {} is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "unsupported trend file schema in {}: expected {}, found {found}",
        path.display(),
        TREND_SCHEMA_VERSION
    )]
    UnsupportedSchema { path: PathBuf, found: u32 },
}

impl TrendLoadError {
    /// A damaged file holds nothing worth keeping and may be replaced.
    /// Anything else may still hold a readable history and is left alone.
    pub fn is_replaceable(&self) -> bool {
        matches!(self, TrendLoadError::Corrupt { .. })
    }
}

#[derive(Deserialize)]
struct SchemaTag {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
}

/// File-backed trend storage.
#[derive(Debug, Clone)]
pub struct TrendStore {
    path: PathBuf,
}

impl TrendStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored record, or a zeroed default if the file does not exist.
    pub fn load(&self) -> Result<TrendRecord, TrendLoadError> {
        if !self.path.exists() {
            debug!("No trend file at {}, starting fresh", self.path.display());
            return Ok(TrendRecord::default());
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|source| TrendLoadError::Read {
            path: self.path.clone(),
            source,
        })?;

        // The version is checked before the body so a newer layout is never
        // mistaken for a damaged file.
        let tag: SchemaTag = serde_json::from_str(&raw).map_err(|source| TrendLoadError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        if tag.schema_version != TREND_SCHEMA_VERSION {
            return Err(TrendLoadError::UnsupportedSchema {
                path: self.path.clone(),
                found: tag.schema_version,
            });
        }

        serde_json::from_str(&raw).map_err(|source| TrendLoadError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the stored record.
    ///
    /// The JSON is written to a temporary file next to the target and then
    /// renamed over it, so a crash never leaves a half-written record.
    pub fn save(&self, record: &TrendRecord) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let payload =
            serde_json::to_string_pretty(record).context("Failed to serialize trend record")?;

        let mut temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
        temp.write_all(payload.as_bytes())
            .context("Failed to write temporary trend file")?;
        temp.flush().context("Failed to flush temporary trend file")?;

        temp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace trend file: {}", self.path.display()))?;

        debug!("Saved trend record to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_growth_without_baseline() {
        assert_eq!(Growth::between(0, 42), Growth::NoBaseline);
        assert_eq!(Growth::between(0, 0), Growth::NoBaseline);
    }

    #[test]
    fn test_growth_percentage() {
        assert_eq!(Growth::between(100, 150), Growth::Percent(50.0));
        assert_eq!(Growth::between(200, 150), Growth::Percent(-25.0));
    }

    #[test]
    fn test_new_active_is_set_difference() {
        let previous = TrendRecord {
            previous_msgs: 10,
            active_users: vec!["A".to_string(), "B".to_string()],
            ..TrendRecord::default()
        };

        let delta = previous.merge(12, &ids(&["B", "C"]));

        assert_eq!(delta.new_active, ids(&["C"]));
        assert!(delta.has_baseline);
    }

    #[test]
    fn test_first_run_has_no_baseline() {
        let delta = TrendRecord::default().merge(5, &ids(&["A"]));
        assert_eq!(delta.growth, Growth::NoBaseline);
        assert!(!delta.has_baseline);
    }

    #[test]
    fn test_weeks_capped_at_four() {
        let mut record = TrendRecord::default();
        for total in [10, 20, 30, 40] {
            record = record.advance(total, &BTreeSet::new());
        }
        assert_eq!(record.weeks, vec![10, 20, 30, 40]);

        let record = record.advance(50, &ids(&["U1"]));
        assert_eq!(record.weeks, vec![20, 30, 40, 50]);
        assert_eq!(record.previous_msgs, 50);
        assert_eq!(record.active_users, vec!["U1".to_string()]);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempdir().unwrap();
        let store = TrendStore::new(dir.path().join("trend.json"));

        let record = store.load().unwrap();
        assert_eq!(record, TrendRecord::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = TrendStore::new(dir.path().join("nested").join("trend.json"));
        let record = TrendRecord::default().advance(120, &ids(&["U2", "U1"]));

        assert_ok!(store.save(&record));
        let loaded = store.load().unwrap();

        assert_eq!(loaded, record);
        assert_eq!(loaded.active_users, vec!["U1".to_string(), "U2".to_string()]);

        let leftovers: Vec<_> = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .flatten()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_load_legacy_file_without_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trend.json");
        std::fs::write(
            &path,
            r#"{"previous_msgs": 80, "active_users": ["U1"], "weeks": [60, 80]}"#,
        )
        .unwrap();

        let record = TrendStore::new(&path).load().unwrap();
        assert_eq!(record.schema_version, TREND_SCHEMA_VERSION);
        assert_eq!(record.previous_msgs, 80);
        assert_eq!(record.weeks, vec![60, 80]);
    }

    #[test]
    fn test_load_rejects_corrupt_and_future_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trend.json");

        std::fs::write(&path, "{not json").unwrap();
        let err = TrendStore::new(&path).load().unwrap_err();
        assert!(err.is_replaceable());

        std::fs::write(&path, r#"{"schema_version": 99}"#).unwrap();
        let err = TrendStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("unsupported trend file schema"));
        assert!(!err.is_replaceable());
    }

    #[test]
    fn test_future_schema_with_unknown_layout_is_not_replaceable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trend.json");
        std::fs::write(&path, r#"{"schema_version": 2, "weeks": {"2026-41": 400}}"#).unwrap();

        let err = TrendStore::new(&path).load().unwrap_err();
        assert!(matches!(
            err,
            TrendLoadError::UnsupportedSchema { found: 2, .. }
        ));
        assert!(!err.is_replaceable());
    }

    #[test]
    fn test_unreadable_path_is_not_replaceable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trend.json");
        std::fs::create_dir(&path).unwrap();

        let err = TrendStore::new(&path).load().unwrap_err();
        assert!(matches!(err, TrendLoadError::Read { .. }));
        assert!(!err.is_replaceable());
    }
}
