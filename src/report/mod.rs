//! Digest report generation.

pub mod composer;

pub use composer::{compose_report, render_text, ReportInput};
