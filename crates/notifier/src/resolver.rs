//! Channel resolver — turns an event into its ordered list of candidate channels.
//!
//! High-frequency event types have their subscriber lists precomputed into the
//! worker cache; everything else depends on per-guild configuration (item
//! filters) and is queried from the settings store.

use std::collections::HashSet;

use relay_common::error::AppError;
use relay_common::types::{ChannelTarget, EventDescriptor, NotificationQuery};

use crate::cache::{self, WorkerCache};
use crate::store::SettingsStore;

/// Where the subscriber list for an event comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelLookup {
    /// Read the precomputed list at this worker-cache key.
    Cached(String),
    /// Ask the settings store.
    Store(NotificationQuery),
}

impl ChannelLookup {
    pub fn classify(event: &EventDescriptor, cached_events: &HashSet<String>) -> Self {
        if cached_events.contains(&event.event_type) {
            ChannelLookup::Cached(event.cache_key())
        } else {
            ChannelLookup::Store(NotificationQuery::from(event))
        }
    }
}

/// Resolves candidate channels for an event.
pub struct ChannelResolver {
    cached_events: HashSet<String>,
}

impl ChannelResolver {
    pub fn new<I, S>(cached_events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cached_events: cached_events.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lookup_for(&self, event: &EventDescriptor) -> ChannelLookup {
        ChannelLookup::classify(event, &self.cached_events)
    }

    /// Candidate channels in subscriber order. A cache miss is an empty list.
    pub async fn resolve(
        &self,
        event: &EventDescriptor,
        cache: &dyn WorkerCache,
        store: &dyn SettingsStore,
    ) -> Result<Vec<ChannelTarget>, AppError> {
        match self.lookup_for(event) {
            ChannelLookup::Cached(key) => {
                let channels: Option<Vec<ChannelTarget>> = cache::get_typed(cache, &key).await?;
                Ok(channels.unwrap_or_default())
            }
            ChannelLookup::Store(query) => store.get_agnostic_notifications(&query).await,
        }
    }
}
