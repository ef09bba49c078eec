//! Outbound delivery primitive — posts a message to a channel's webhook.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use relay_common::types::ChannelContext;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Body posted to a webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub content: String,
    pub embeds: Vec<serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The remote API rejected the request.
    #[error("webhook API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<u64>,
        message: String,
    },

    #[error("webhook request timed out")]
    Timeout,

    #[error("webhook transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Context handed to the sender has nothing to post to.
    #[error("channel {0} has no webhook configured")]
    MissingWebhook(String),

    /// Failure without any diagnostic text.
    #[error("")]
    Opaque,
}

impl DeliveryError {
    /// Human-readable message, if the failure carried one.
    pub fn message(&self) -> Option<String> {
        match self {
            DeliveryError::Opaque => None,
            other => Some(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Transport(e)
        }
    }
}

/// Sends one message to one channel.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(
        &self,
        context: &ChannelContext,
        message: &WebhookMessage,
    ) -> Result<(), DeliveryError>;
}

/// Error body returned by the webhook API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    code: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ExecuteWebhook<'a> {
    content: &'a str,
    embeds: &'a [serde_json::Value],
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}

/// Discord-compatible webhook executor over `reqwest`.
#[derive(Clone)]
pub struct DiscordWebhookSender {
    client: reqwest::Client,
    api_base: String,
}

impl DiscordWebhookSender {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        Self::with_api_base(DISCORD_API_BASE, timeout)
    }

    /// Point at a different API root (proxies, test servers).
    pub fn with_api_base(api_base: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeliveryError::Transport)?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn execute_url(&self, webhook_id: &str, token: &str) -> String {
        format!("{}/webhooks/{}/{}", self.api_base, webhook_id, token)
    }
}

#[async_trait]
impl WebhookSender for DiscordWebhookSender {
    async fn send(
        &self,
        context: &ChannelContext,
        message: &WebhookMessage,
    ) -> Result<(), DeliveryError> {
        let webhook = context
            .webhook
            .as_ref()
            .ok_or_else(|| DeliveryError::MissingWebhook(context.channel_id.clone()))?;

        let mut query: Vec<(&str, &str)> = vec![("wait", "true")];
        if let Some(thread_id) = context.thread_id.as_deref() {
            query.push(("thread_id", thread_id));
        }

        let body = ExecuteWebhook {
            content: &message.content,
            embeds: &message.embeds,
            username: webhook.name.as_deref(),
            avatar_url: webhook.avatar.as_deref(),
        };

        let response = self
            .client
            .post(self.execute_url(&webhook.id, &webhook.token))
            .query(&query)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error: ApiErrorBody = response.json().await.unwrap_or(ApiErrorBody {
            message: None,
            code: None,
        });

        Err(DeliveryError::Api {
            status: status.as_u16(),
            code: error.code,
            message: error
                .message
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
        })
    }
}
