//! Dispatcher — delivers to one admitted channel and absorbs the failure.
//!
//! Failures are classified and either trigger a corrective side effect or
//! are logged. Nothing escapes to sibling deliveries or the broadcast caller.

use relay_common::types::ChannelContext;

use crate::delivery::{DeliveryError, WebhookMessage, WebhookSender};
use crate::filter::SkipReason;
use crate::store::SettingsStore;

/// API error code for a deleted or invalid webhook.
const UNKNOWN_WEBHOOK_CODE: u64 = 10015;

/// How a failed delivery should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The webhook is gone; clear it so it gets re-provisioned.
    Recoverable,
    /// Timed out under load; nothing to do.
    Ignorable,
    /// Anything else.
    Unclassified,
}

/// Per-channel result of one broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Skipped(SkipReason),
    Failed(FailureClass),
}

pub fn classify(error: &DeliveryError) -> FailureClass {
    match error {
        DeliveryError::Timeout => FailureClass::Ignorable,
        DeliveryError::Api { code, .. } if *code == Some(UNKNOWN_WEBHOOK_CODE) => {
            FailureClass::Recoverable
        }
        other => match other.message() {
            Some(message) if message.contains("Unknown Webhook") => FailureClass::Recoverable,
            _ => FailureClass::Unclassified,
        },
    }
}

/// Send to one channel, classify any failure and apply its side effect.
pub async fn deliver(
    sender: &dyn WebhookSender,
    store: &dyn SettingsStore,
    context: &ChannelContext,
    message: &WebhookMessage,
) -> DeliveryOutcome {
    let error = match sender.send(context, message).await {
        Ok(()) => return DeliveryOutcome::Delivered,
        Err(e) => e,
    };

    let class = classify(&error);
    match class {
        FailureClass::Recoverable => {
            tracing::warn!(channel_id = %context.channel_id, "Wiping webhook context for channel");
            if let Err(e) = store.delete_webhooks_for_channel(&context.channel_id).await {
                tracing::error!(
                    channel_id = %context.channel_id,
                    error = %e,
                    "Failed to wipe webhook context"
                );
            }
        }
        FailureClass::Ignorable => {}
        FailureClass::Unclassified => match error.message() {
            Some(message) => {
                tracing::error!(channel_id = %context.channel_id, error = %message, "Delivery failed")
            }
            None => {
                tracing::error!(channel_id = %context.channel_id, error = ?error, "Delivery failed")
            }
        },
    }

    DeliveryOutcome::Failed(class)
}
