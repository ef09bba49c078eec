//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use relay_common::error::AppError;
use relay_common::types::{
    ChannelContext, ChannelTarget, GuildRegistration, NotificationQuery, WebhookTarget,
};

use crate::cache::WorkerCache;
use crate::delivery::{DeliveryError, WebhookMessage, WebhookSender};
use crate::store::SettingsStore;

/// Channel context with a configured webhook.
pub fn context(channel_id: &str, language: &str) -> ChannelContext {
    ChannelContext {
        channel_id: channel_id.to_string(),
        thread_id: None,
        language: language.to_string(),
        webhook: Some(WebhookTarget {
            id: format!("hook-{channel_id}"),
            token: "token".to_string(),
            name: None,
            avatar: None,
        }),
    }
}

/// Ordered guild list from `(guild_id, [channel_id])` pairs.
pub fn guilds(entries: &[(&str, &[&str])]) -> Vec<GuildRegistration> {
    entries
        .iter()
        .map(|(id, channels)| GuildRegistration {
            id: id.to_string(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
        })
        .collect()
}

#[derive(Default)]
pub struct MemoryCache {
    entries: HashMap<String, serde_json::Value>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        self.entries.insert(key.to_string(), value);
        self
    }
}

#[async_trait]
impl WorkerCache for MemoryCache {
    async fn get_key(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        Ok(self.entries.get(key).cloned())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    contexts: HashMap<String, ChannelContext>,
    agnostic: Vec<ChannelTarget>,
    fail_queries: bool,
    fail_cleanup: bool,
    agnostic_queries: AtomicUsize,
    context_lookups: AtomicUsize,
    wiped: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: ChannelContext) -> Self {
        self.contexts.insert(context.channel_id.clone(), context);
        self
    }

    pub fn with_agnostic(mut self, targets: Vec<ChannelTarget>) -> Self {
        self.agnostic = targets;
        self
    }

    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    pub fn failing_cleanup(mut self) -> Self {
        self.fail_cleanup = true;
        self
    }

    pub fn agnostic_query_count(&self) -> usize {
        self.agnostic_queries.load(Ordering::SeqCst)
    }

    pub fn context_lookups(&self) -> usize {
        self.context_lookups.load(Ordering::SeqCst)
    }

    pub fn wiped_channels(&self) -> Vec<String> {
        self.wiped.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_agnostic_notifications(
        &self,
        _query: &NotificationQuery,
    ) -> Result<Vec<ChannelTarget>, AppError> {
        self.agnostic_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        Ok(self.agnostic.clone())
    }

    async fn get_command_context(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelContext>, AppError> {
        self.context_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.contexts.get(channel_id).cloned())
    }

    async fn delete_webhooks_for_channel(&self, channel_id: &str) -> Result<(), AppError> {
        self.wiped.lock().unwrap().push(channel_id.to_string());
        if self.fail_cleanup {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        Ok(())
    }
}

type FailureFactory = Arc<dyn Fn() -> DeliveryError + Send + Sync>;

/// Records successful sends; fails for channels registered via `failing`.
#[derive(Default)]
pub struct RecordingSender {
    failures: HashMap<String, FailureFactory>,
    sent: Mutex<Vec<(String, Option<String>, WebhookMessage)>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(
        mut self,
        channel_id: &str,
        error: impl Fn() -> DeliveryError + Send + Sync + 'static,
    ) -> Self {
        self.failures.insert(channel_id.to_string(), Arc::new(error));
        self
    }

    pub fn sent(&self) -> Vec<(String, WebhookMessage)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, _, message)| (channel.clone(), message.clone()))
            .collect()
    }

    pub fn sent_to(&self, channel_id: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(channel, _, _)| channel == channel_id)
            .count()
    }

    pub fn threads_for(&self, channel_id: &str) -> Vec<Option<String>> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(channel, _, _)| channel == channel_id)
            .map(|(_, thread, _)| thread.clone())
            .collect()
    }
}

#[async_trait]
impl WebhookSender for RecordingSender {
    async fn send(
        &self,
        context: &ChannelContext,
        message: &WebhookMessage,
    ) -> Result<(), DeliveryError> {
        if let Some(failure) = self.failures.get(&context.channel_id) {
            return Err(failure());
        }
        self.sent.lock().unwrap().push((
            context.channel_id.clone(),
            context.thread_id.clone(),
            message.clone(),
        ));
        Ok(())
    }
}
