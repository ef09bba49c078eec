use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Metadata identifying one world-state change and who should care about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// World-state platform (`pc`, `ps4`, `xb1`, `swi`, ...)
    pub platform: String,
    /// Notification type (`cetus`, `alerts`, `fissures.t4`, ...)
    #[serde(rename = "type")]
    pub event_type: String,
    /// Locale the payload was rendered in. Empty means "any locale".
    #[serde(default)]
    pub locale: String,
    /// Items carried by the event (rewards, enemies, ...), used for item
    /// subscriptions and ping lookup.
    #[serde(default)]
    pub items: Vec<String>,
}

impl EventDescriptor {
    pub fn new(
        platform: impl Into<String>,
        event_type: impl Into<String>,
        locale: impl Into<String>,
        items: Vec<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            event_type: event_type.into(),
            locale: locale.into(),
            items,
        }
    }

    /// Worker-cache key under which pre-resolved subscribers are stored.
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.event_type, self.platform, self.locale)
    }
}

/// A queued broadcast: the payload to deliver plus its routing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastJob {
    /// Embed body. Opaque to the relay apart from internal-only fields.
    pub payload: serde_json::Value,
    #[serde(flatten)]
    pub event: EventDescriptor,
}

/// One candidate destination as stored in the cache or returned by the store.
///
/// `channel_id` is optional because cached lists are written by an external
/// process and may contain incomplete entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChannelTarget {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl ChannelTarget {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            thread_id: None,
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}

/// A guild and the channels it is known to own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRegistration {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub channels: HashSet<String>,
}

impl GuildRegistration {
    pub fn owns_channel(&self, channel_id: &str) -> bool {
        self.channels.contains(channel_id)
    }
}

/// Webhook credentials configured for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub id: String,
    pub token: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// Everything needed to deliver to one channel: locale and transport target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelContext {
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub language: String,
    pub webhook: Option<WebhookTarget>,
}

impl ChannelContext {
    pub fn webhook_configured(&self) -> bool {
        self.webhook.is_some()
    }
}

/// Parameters for the settings-store subscriber query used by event types
/// that are not served from the worker cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "type")]
    pub event_type: String,
    pub platform: String,
    pub items: Vec<String>,
    pub locale: String,
}

impl From<&EventDescriptor> for NotificationQuery {
    fn from(event: &EventDescriptor) -> Self {
        Self {
            event_type: event.event_type.clone(),
            platform: event.platform.clone(),
            items: event.items.clone(),
            locale: event.locale.clone(),
        }
    }
}
