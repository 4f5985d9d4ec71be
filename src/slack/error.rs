//! Errors returned by the Slack Web API client.

use thiserror::Error;

/// Failure of a single Slack Web API call.
#[derive(Debug, Error)]
pub enum SlackError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request to {method} failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Slack answered with a non-success HTTP status (e.g. 429 rate limited).
    #[error("{method} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    /// Slack answered `ok: false` with an error code such as `not_in_channel`.
    #[error("{method} failed: {code}")]
    Api { method: &'static str, code: String },

    /// The response body did not match the expected envelope.
    #[error("failed to decode {method} response: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl SlackError {
    /// The Slack error code, if Slack itself rejected the call.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            SlackError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type SlackResult<T> = std::result::Result<T, SlackError>;
