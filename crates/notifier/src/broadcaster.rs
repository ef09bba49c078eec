//! Broadcaster — fans one world-state event out to every subscribed channel.
//!
//! Pipeline per call:
//! 1. Snapshot the guild mapping and narrow it to this shard
//! 2. Resolve candidate channels (worker cache or settings store)
//! 3. Per candidate, concurrently: admit → ping → deliver
//! 4. Join every per-channel future; individual failures never fail the call

use std::sync::Arc;

use futures::future::join_all;

use relay_common::config::ShardConfig;
use relay_common::types::{ChannelTarget, EventDescriptor, GuildRegistration};

use crate::cache::{self, WorkerCache};
use crate::delivery::{WebhookMessage, WebhookSender};
use crate::dispatcher::{self, DeliveryOutcome, FailureClass};
use crate::filter;
use crate::ping::PingTable;
use crate::resolver::ChannelResolver;
use crate::shard::ShardPartitioner;
use crate::store::SettingsStore;

/// Fields that only exist for in-process bookkeeping and must never be sent.
const INTERNAL_PAYLOAD_FIELDS: &[&str] = &["bot"];

/// Copy of `payload` with internal-only fields removed.
pub fn sanitize_payload(payload: &serde_json::Value) -> serde_json::Value {
    let mut sanitized = payload.clone();
    if let Some(object) = sanitized.as_object_mut() {
        for field in INTERNAL_PAYLOAD_FIELDS {
            object.remove(*field);
        }
    }
    sanitized
}

/// Tally of per-channel outcomes for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub candidates: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub recovered: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl BroadcastSummary {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Skipped(_) => self.skipped += 1,
            DeliveryOutcome::Failed(FailureClass::Recoverable) => self.recovered += 1,
            DeliveryOutcome::Failed(FailureClass::Ignorable) => self.ignored += 1,
            DeliveryOutcome::Failed(FailureClass::Unclassified) => self.failed += 1,
        }
    }
}

/// Broadcast engine bound to one shard identity and its collaborators.
pub struct Broadcaster {
    store: Arc<dyn SettingsStore>,
    cache: Arc<dyn WorkerCache>,
    sender: Arc<dyn WebhookSender>,
    partitioner: ShardPartitioner,
    resolver: ChannelResolver,
}

impl Broadcaster {
    pub fn new<I, S>(
        store: Arc<dyn SettingsStore>,
        cache: Arc<dyn WorkerCache>,
        sender: Arc<dyn WebhookSender>,
        shard: ShardConfig,
        cached_events: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            cache,
            sender,
            partitioner: ShardPartitioner::new(shard),
            resolver: ChannelResolver::new(cached_events),
        }
    }

    /// Deliver `payload` to every channel subscribed to `event`.
    ///
    /// Never fails: "nobody subscribed", filtered channels and delivery errors
    /// are all reported through logs and the returned summary.
    pub async fn broadcast(
        &self,
        payload: &serde_json::Value,
        event: &EventDescriptor,
    ) -> BroadcastSummary {
        tracing::trace!(
            event_type = %event.event_type,
            platform = %event.platform,
            "Broadcasting"
        );

        let embed = sanitize_payload(payload);
        let mut summary = BroadcastSummary::default();

        let guilds = match cache::guild_snapshot(self.cache.as_ref()).await {
            Ok(guilds) => self.partitioner.partition(guilds),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read guild mapping from worker cache");
                Vec::new()
            }
        };

        let channels = match self
            .resolver
            .resolve(event, self.cache.as_ref(), self.store.as_ref())
            .await
        {
            Ok(channels) => channels,
            Err(e) => {
                tracing::error!(
                    event_type = %event.event_type,
                    error = %e,
                    "Failed to resolve subscribed channels"
                );
                Vec::new()
            }
        };

        if channels.is_empty() {
            tracing::error!(
                platform = %event.platform,
                locale = %event.locale,
                event_type = %event.event_type,
                "No channels tracking event... continuing"
            );
            return summary;
        }
        summary.candidates = channels.len();

        let pings = match cache::ping_snapshot(self.cache.as_ref()).await {
            Ok(pings) => PingTable::new(pings),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read ping table, sending without pings");
                PingTable::default()
            }
        };

        let outcomes = join_all(
            channels
                .iter()
                .map(|candidate| self.broadcast_to(candidate, event, &embed, &guilds, &pings)),
        )
        .await;

        for outcome in outcomes {
            summary.record(outcome);
        }

        tracing::debug!(
            event_type = %event.event_type,
            platform = %event.platform,
            candidates = summary.candidates,
            delivered = summary.delivered,
            skipped = summary.skipped,
            "Broadcast complete"
        );

        summary
    }

    async fn broadcast_to(
        &self,
        candidate: &ChannelTarget,
        event: &EventDescriptor,
        embed: &serde_json::Value,
        guilds: &[GuildRegistration],
        pings: &PingTable,
    ) -> DeliveryOutcome {
        let admitted = match filter::admit(candidate, event, self.store.as_ref(), guilds).await {
            Ok(admitted) => admitted,
            Err(reason) => return DeliveryOutcome::Skipped(reason),
        };

        let message = WebhookMessage {
            content: pings.ping_for(&admitted.guild_id, &event.event_type, &event.items),
            embeds: vec![embed.clone()],
        };

        dispatcher::deliver(
            self.sender.as_ref(),
            self.store.as_ref(),
            &admitted.context,
            &message,
        )
        .await
    }
}
