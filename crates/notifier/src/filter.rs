//! Delivery filter — per-candidate admission checks and owning-guild lookup.
//!
//! Each candidate is checked independently: channel id present, context
//! available, locale matches, webhook configured, owning guild on this shard.

use relay_common::types::{ChannelContext, ChannelTarget, EventDescriptor, GuildRegistration};

use crate::store::SettingsStore;

/// Why a candidate channel was not delivered to. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingChannelId,
    ContextUnavailable,
    LocaleMismatch,
    NoWebhook,
    GuildUnresolved,
}

/// A candidate that passed every check, ready for the dispatcher.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub context: ChannelContext,
    pub guild_id: String,
}

/// An explicit event locale must equal the channel language exactly. The
/// channel gets that event's other-locale rendition through a separate call.
pub fn locale_matches(event_locale: &str, language: &str) -> bool {
    event_locale.is_empty() || event_locale == language
}

/// First guild in the (shard-narrowed, cache-ordered) list that owns `channel_id`.
pub fn owning_guild<'a>(
    guilds: &'a [GuildRegistration],
    channel_id: &str,
) -> Option<&'a GuildRegistration> {
    guilds.iter().find(|guild| guild.owns_channel(channel_id))
}

/// Run every admission check for one candidate.
pub async fn admit(
    candidate: &ChannelTarget,
    event: &EventDescriptor,
    store: &dyn SettingsStore,
    guilds: &[GuildRegistration],
) -> Result<Admitted, SkipReason> {
    let channel_id = match candidate.channel_id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(SkipReason::MissingChannelId),
    };

    let mut context = match store.get_command_context(channel_id).await {
        Ok(Some(context)) => context,
        Ok(None) => {
            tracing::warn!(channel_id = %channel_id, "No settings for subscribed channel");
            return Err(SkipReason::ContextUnavailable);
        }
        Err(e) => {
            tracing::warn!(channel_id = %channel_id, error = %e, "Failed to load channel context");
            return Err(SkipReason::ContextUnavailable);
        }
    };
    context.thread_id = candidate.thread_id.clone();

    if !locale_matches(&event.locale, &context.language) {
        return Err(SkipReason::LocaleMismatch);
    }

    if !context.webhook_configured() {
        tracing::debug!(channel_id = %channel_id, "Channel has no webhook configured");
        return Err(SkipReason::NoWebhook);
    }

    let Some(guild) = owning_guild(guilds, channel_id) else {
        tracing::info!(
            channel_id = %channel_id,
            event_type = %event.event_type,
            "Couldn't find guild for channel"
        );
        return Err(SkipReason::GuildUnresolved);
    };

    Ok(Admitted {
        guild_id: guild.id.clone(),
        context,
    })
}
