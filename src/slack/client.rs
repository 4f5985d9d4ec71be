//! Slack Web API client.
//!
//! Thin wrapper over `reqwest` exposing exactly the calls the digest needs.
//! Each listing call returns a single [`Page`]; walking the cursor is left
//! to [`crate::slack::collect_pages`].

use crate::models::{Channel, Message, User};
use crate::slack::error::{SlackError, SlackResult};
use crate::slack::pagination::Page;
use anyhow::{Context, Result};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Largest page size Slack accepts on listing endpoints.
const MAX_PAGE_SIZE: usize = 1000;

/// Longest HTTP error body we keep in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Settings for [`SlackClient`].
#[derive(Debug, Clone)]
pub struct SlackClientConfig {
    pub api_base: String,
    pub token: String,
    pub timeout_seconds: u64,
    pub page_size: usize,
}

/// Response envelope shared by every Web API method.
#[derive(Debug, Deserialize)]
struct Envelope<B> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
    #[serde(flatten)]
    body: B,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelsBody {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryBody {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Default, Deserialize)]
struct MembersBody {
    #[serde(default)]
    members: Vec<User>,
}

#[derive(Debug, Default, Deserialize)]
struct PostBody {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// A message accepted by `chat.postMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

/// Client for the Slack Web API.
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    page_size: usize,
}

impl SlackClient {
    /// Create a new client. The token is sent as a bearer credential as-is.
    pub fn new(config: SlackClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .user_agent(concat!("slackpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.trim().to_string(),
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }

    /// One page of `conversations.list`, archived channels excluded server-side.
    pub async fn list_channels_page(
        &self,
        types: &str,
        cursor: Option<String>,
    ) -> SlackResult<Page<Channel>> {
        let mut query = vec![
            ("types", types.to_string()),
            ("exclude_archived", "true".to_string()),
            ("limit", self.page_size.to_string()),
        ];
        push_cursor(&mut query, cursor);

        let (body, next): (ChannelsBody, _) = self
            .call("conversations.list", self.get("conversations.list").query(&query))
            .await?;
        Ok(Page::new(body.channels, next))
    }

    /// One page of `conversations.history` for `channel` since `oldest`.
    pub async fn history_page(
        &self,
        channel: &str,
        oldest: &str,
        cursor: Option<String>,
    ) -> SlackResult<Page<Message>> {
        let mut query = vec![
            ("channel", channel.to_string()),
            ("oldest", oldest.to_string()),
            ("limit", self.page_size.to_string()),
        ];
        push_cursor(&mut query, cursor);

        let (body, next): (HistoryBody, _) = self
            .call(
                "conversations.history",
                self.get("conversations.history").query(&query),
            )
            .await?;
        Ok(Page::new(body.messages, next))
    }

    /// One page of `users.list`.
    pub async fn users_page(&self, cursor: Option<String>) -> SlackResult<Page<User>> {
        let mut query = vec![("limit", self.page_size.to_string())];
        push_cursor(&mut query, cursor);

        let (body, next): (MembersBody, _) = self
            .call("users.list", self.get("users.list").query(&query))
            .await?;
        Ok(Page::new(body.members, next))
    }

    /// Post `text` to `channel` with `chat.postMessage`.
    pub async fn post_message(&self, channel: &str, text: &str) -> SlackResult<PostedMessage> {
        let request = self
            .http
            .post(self.url("chat.postMessage"))
            .json(&json!({ "channel": channel, "text": text }));

        let (body, _): (PostBody, _) = self.call("chat.postMessage", request).await?;
        Ok(PostedMessage {
            channel: body.channel.unwrap_or_else(|| channel.to_string()),
            ts: body.ts.unwrap_or_default(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    fn get(&self, method: &str) -> RequestBuilder {
        self.http.get(self.url(method))
    }

    /// Send a request and unwrap the Slack envelope.
    async fn call<B: DeserializeOwned>(
        &self,
        method: &'static str,
        request: RequestBuilder,
    ) -> SlackResult<(B, Option<String>)> {
        debug!("Calling {}", method);

        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| SlackError::Transport { method, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SlackError::Status {
                method,
                status,
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let envelope: Envelope<B> = response
            .json()
            .await
            .map_err(|source| SlackError::Decode { method, source })?;

        if !envelope.ok {
            return Err(SlackError::Api {
                method,
                code: envelope
                    .error
                    .unwrap_or_else(|| "unknown_error".to_string()),
            });
        }

        let next_cursor = envelope.response_metadata.and_then(|m| m.next_cursor);
        Ok((envelope.body, next_cursor))
    }
}

fn push_cursor(query: &mut Vec<(&'static str, String)>, cursor: Option<String>) {
    if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
        query.push(("cursor", cursor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> SlackClient {
        SlackClient::new(SlackClientConfig {
            api_base: server.base_url(),
            token: "xoxb-test".to_string(),
            timeout_seconds: 5,
            page_size: 200,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_channels_page_sends_auth_and_returns_cursor() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/conversations.list")
                .header("authorization", "Bearer xoxb-test")
                .query_param("types", "public_channel")
                .query_param("limit", "200");
            then.status(200).json_body(serde_json::json!({
                "ok": true,
                "channels": [
                    {"id": "C1", "name": "general", "is_member": true},
                    {"id": "C2", "name": "random", "is_archived": false}
                ],
                "response_metadata": {"next_cursor": "dXNlcjpVMEc5V0ZYTlo="}
            }));
        });

        let page = client_for(&server)
            .list_channels_page("public_channel", None)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].is_member);
        assert!(!page.items[1].is_member);
        assert_eq!(page.next_cursor.as_deref(), Some("dXNlcjpVMEc5V0ZYTlo="));
    }

    #[tokio::test]
    async fn test_history_page_forwards_cursor_and_oldest() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/conversations.history")
                .query_param("channel", "C1")
                .query_param("oldest", "1700000000.000000")
                .query_param("cursor", "page2");
            then.status(200).json_body(serde_json::json!({
                "ok": true,
                "messages": [{"user": "U1", "ts": "1700000100.000100"}],
                "response_metadata": {"next_cursor": ""}
            }));
        });

        let page = client_for(&server)
            .history_page("C1", "1700000000.000000", Some("page2".to_string()))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn test_api_error_maps_to_code() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/conversations.history");
            then.status(200)
                .json_body(serde_json::json!({"ok": false, "error": "not_in_channel"}));
        });

        let err = client_for(&server)
            .history_page("C9", "0.000000", None)
            .await
            .unwrap_err();

        assert_eq!(err.api_code(), Some("not_in_channel"));
        assert!(err.to_string().contains("conversations.history"));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/users.list");
            then.status(429).body("rate limited");
        });

        let err = client_for(&server).users_page(None).await.unwrap_err();

        match err {
            SlackError::Status { status, body, .. } => {
                assert_eq!(status.as_u16(), 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_post_message_sends_json_body() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat.postMessage")
                .json_body(serde_json::json!({"channel": "C42", "text": "hello"}));
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "channel": "C42", "ts": "1.5"}));
        });

        let posted = client_for(&server)
            .post_message("C42", "hello")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(
            posted,
            PostedMessage {
                channel: "C42".to_string(),
                ts: "1.5".to_string()
            }
        );
    }
}
