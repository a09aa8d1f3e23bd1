// src/relay.rs
//
// Chat relay: forwards user text to a webhook and always comes back with
// something printable. Transport problems become canned replies, never errors.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

pub const EMPTY_REPLY: &str = "I've processed your request successfully.";
pub const DEGRADED_REPLY: &str =
    "I'm experiencing some connectivity issues, but I can still help you analyze your dashboard data.";
pub const OFFLINE_REPLY: &str =
    "I'm currently offline, but I can still help you understand your dashboard metrics and data insights.";

#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    message: &'a str,
    /// ISO-8601, millisecond precision, `Z` suffix.
    timestamp: String,
}

impl<'a> ChatPayload<'a> {
    fn new(message: &'a str, at: DateTime<Utc>) -> Self {
        Self {
            message,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// How the webhook call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Replied(String),
    Rejected(u16),
    Unreachable(String),
}

impl RelayOutcome {
    /// Text to put in the transcript.
    pub fn reply_text(&self) -> String {
        match self {
            RelayOutcome::Replied(body) if body.trim().is_empty() => EMPTY_REPLY.to_string(),
            RelayOutcome::Replied(body) => body.clone(),
            RelayOutcome::Rejected(_) => DEGRADED_REPLY.to_string(),
            RelayOutcome::Unreachable(_) => OFFLINE_REPLY.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRelay {
    client: Client,
    webhook: Url,
}

impl ChatRelay {
    pub fn new(webhook: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, webhook })
    }

    /// Relay `message`; `None` for blank input (nothing is sent).
    pub async fn send(&self, message: &str) -> Option<String> {
        if message.trim().is_empty() {
            return None;
        }
        Some(self.deliver(message).await.reply_text())
    }

    /// Relay `message` on its own task; the reply lands in `replies`.
    /// Returns at once, so a slow webhook never holds up the caller.
    pub fn dispatch(&self, message: String, replies: &mut JoinSet<Option<String>>) {
        let relay = self.clone();
        replies.spawn(async move { relay.send(&message).await });
    }

    #[tracing::instrument(level = "debug", skip(self, message), fields(webhook = %self.webhook))]
    pub async fn deliver(&self, message: &str) -> RelayOutcome {
        let payload = ChatPayload::new(message, Utc::now());
        let resp = match self
            .client
            .post(self.webhook.clone())
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "chat webhook unreachable");
                return RelayOutcome::Unreachable(e.to_string());
            }
        };

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, "chat webhook rejected message");
            return RelayOutcome::Rejected(status.as_u16());
        }

        match resp.text().await {
            Ok(body) => {
                debug!(bytes = body.len(), "chat webhook replied");
                RelayOutcome::Replied(body)
            }
            Err(e) => {
                warn!(error = %e, "chat webhook reply unreadable");
                RelayOutcome::Unreachable(e.to_string())
            }
        }
    }
}
