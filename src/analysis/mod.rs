//! Activity analysis.
//!
//! Filtering rules and frequency tables built from fetched Slack data.

pub mod aggregator;

pub use aggregator::*;
