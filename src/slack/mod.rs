//! Slack Web API access.
//!
//! Provides the HTTP client, the generic cursor walker and the error type
//! shared by every call site.

pub mod client;
pub mod error;
pub mod pagination;

pub use client::{SlackClient, SlackClientConfig};
pub use pagination::collect_pages;
