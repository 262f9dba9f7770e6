// 💬 Messaging - Telegram Bot API client
// Only the three calls the bot needs: getUpdates (long polling),
// sendMessage, and the Update payload shared with the webhook server.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Slack added on top of the long-poll timeout for the HTTP request itself
const REQUEST_SLACK: Duration = Duration::from_secs(10);

// ============================================================================
// MESSENGER TRAIT
// ============================================================================

/// Messenger - "send a text message to a chat"
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;
}

// ============================================================================
// BOT API TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<Option<T>> {
        if self.ok {
            Ok(self.result)
        } else {
            Err(Error::Telegram {
                description: self
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

// ============================================================================
// TELEGRAM CLIENT
// ============================================================================

pub struct TelegramClient {
    client: reqwest::Client,
    /// `{api_base}/bot{token}`
    endpoint: String,
}

impl TelegramClient {
    pub fn new(client: reqwest::Client, api_base: &str, token: &str) -> Self {
        TelegramClient {
            client,
            endpoint: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<Option<T>> {
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/{}", self.endpoint, method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        response.into_result()
    }

    /// Long-poll for new updates after `offset`
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });

        let updates: Option<Vec<Update>> = self
            .call(
                "getUpdates",
                body,
                Duration::from_secs(timeout_secs) + REQUEST_SLACK,
            )
            .await?;

        let updates = updates.unwrap_or_default();
        debug!(count = updates.len(), "Received updates");
        Ok(updates)
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let body = json!({ "chat_id": chat_id, "text": text });
        let _: Option<serde_json::Value> = self.call("sendMessage", body, REQUEST_SLACK * 3).await?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
