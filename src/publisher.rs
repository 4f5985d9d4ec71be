//! Digest delivery.
//!
//! Delivery is at-most-once: a single `chat.postMessage` call, no retry.

use crate::slack::SlackClient;
use tracing::{error, info, warn};

/// Result of trying to deliver the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Slack accepted the message; carries its timestamp.
    Posted { ts: String },
    Failed { reason: String },
}

/// Post `text` to `destination`, logging rather than propagating failures.
pub async fn publish(client: &SlackClient, destination: &str, text: &str) -> PublishOutcome {
    match client.post_message(destination, text).await {
        Ok(posted) => {
            info!("Digest posted to {} (ts {})", posted.channel, posted.ts);
            PublishOutcome::Posted { ts: posted.ts }
        }
        Err(e) => {
            error!("Error sending digest to {}: {}", destination, e);
            if e.api_code() == Some("not_in_channel") {
                warn!("Invite the bot to {} before the next run", destination);
            }
            PublishOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::SlackClientConfig;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> SlackClient {
        SlackClient::new(SlackClientConfig {
            api_base: server.base_url(),
            token: "xoxb-test".to_string(),
            timeout_seconds: 5,
            page_size: 100,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_success() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/chat.postMessage");
            then.status(200)
                .json_body(serde_json::json!({"ok": true, "channel": "C1", "ts": "9.9"}));
        });

        let outcome = publish(&client_for(&server), "C1", "digest").await;
        assert_eq!(outcome, PublishOutcome::Posted { ts: "9.9".to_string() });
    }

    #[tokio::test]
    async fn test_publish_failure_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/chat.postMessage");
            then.status(200)
                .json_body(serde_json::json!({"ok": false, "error": "channel_not_found"}));
        });

        let outcome = publish(&client_for(&server), "CX", "digest").await;

        mock.assert();
        match outcome {
            PublishOutcome::Failed { reason } => assert!(reason.contains("channel_not_found")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
