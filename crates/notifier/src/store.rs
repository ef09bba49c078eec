//! Settings store — channel subscriptions, locales and webhook credentials.

use async_trait::async_trait;
use sqlx::PgPool;

use relay_common::error::AppError;
use relay_common::types::{ChannelContext, ChannelTarget, NotificationQuery, WebhookTarget};

/// Persistent store consulted by the broadcaster.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Channels subscribed to an event type that is not served from the worker cache.
    async fn get_agnostic_notifications(
        &self,
        query: &NotificationQuery,
    ) -> Result<Vec<ChannelTarget>, AppError>;

    /// Delivery context for a channel, or `None` if the channel is unknown.
    async fn get_command_context(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelContext>, AppError>;

    /// Forget every webhook registered for a channel. Idempotent.
    async fn delete_webhooks_for_channel(&self, channel_id: &str) -> Result<(), AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct ChannelRow {
    id: String,
    language: String,
    webhook_id: Option<String>,
    webhook_token: Option<String>,
    webhook_name: Option<String>,
    webhook_avatar: Option<String>,
}

impl From<ChannelRow> for ChannelContext {
    fn from(row: ChannelRow) -> Self {
        let webhook = match (row.webhook_id, row.webhook_token) {
            (Some(id), Some(token)) => Some(WebhookTarget {
                id,
                token,
                name: row.webhook_name,
                avatar: row.webhook_avatar,
            }),
            _ => None,
        };

        ChannelContext {
            channel_id: row.id,
            thread_id: None,
            language: row.language,
            webhook,
        }
    }
}

/// PostgreSQL-backed settings store.
#[derive(Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn get_agnostic_notifications(
        &self,
        query: &NotificationQuery,
    ) -> Result<Vec<ChannelTarget>, AppError> {
        // An empty locale means "any language"; an empty item list means the
        // type subscription alone is enough.
        let targets: Vec<ChannelTarget> = sqlx::query_as(
            r#"
            SELECT DISTINCT tn.channel_id, tn.thread_id
            FROM type_notifications tn
            JOIN channels c ON c.id = tn.channel_id
            WHERE tn.type = $1
              AND c.platform = $2
              AND ($3::text = '' OR c.language = $3)
              AND (
                cardinality($4::text[]) = 0
                OR EXISTS (
                    SELECT 1 FROM item_notifications i
                    WHERE i.channel_id = tn.channel_id
                      AND i.item = ANY($4)
                )
              )
            ORDER BY tn.channel_id
            "#,
        )
        .bind(&query.event_type)
        .bind(&query.platform)
        .bind(&query.locale)
        .bind(&query.items)
        .fetch_all(&self.pool)
        .await?;

        Ok(targets)
    }

    async fn get_command_context(
        &self,
        channel_id: &str,
    ) -> Result<Option<ChannelContext>, AppError> {
        let row: Option<ChannelRow> = sqlx::query_as(
            r#"
            SELECT id, language, webhook_id, webhook_token, webhook_name, webhook_avatar
            FROM channels
            WHERE id = $1
            "#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ChannelContext::from))
    }

    async fn delete_webhooks_for_channel(&self, channel_id: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE channels
            SET webhook_id = NULL, webhook_token = NULL, webhook_name = NULL, webhook_avatar = NULL
            WHERE id = $1 AND webhook_id IS NOT NULL
            "#,
        )
        .bind(channel_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(channel_id = %channel_id, "Webhook registration cleared");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(webhook_id: Option<&str>, webhook_token: Option<&str>) -> ChannelRow {
        ChannelRow {
            id: "C1".to_string(),
            language: "de".to_string(),
            webhook_id: webhook_id.map(String::from),
            webhook_token: webhook_token.map(String::from),
            webhook_name: Some("Relay".to_string()),
            webhook_avatar: None,
        }
    }

    #[test]
    fn test_row_with_credentials_has_webhook() {
        let ctx = ChannelContext::from(row(Some("W1"), Some("tok")));
        assert!(ctx.webhook_configured());
        assert_eq!(ctx.language, "de");
        assert_eq!(ctx.thread_id, None);
        let hook = ctx.webhook.unwrap();
        assert_eq!(hook.id, "W1");
        assert_eq!(hook.name.as_deref(), Some("Relay"));
    }

    #[test]
    fn test_partial_credentials_mean_no_webhook() {
        assert!(!ChannelContext::from(row(Some("W1"), None)).webhook_configured());
        assert!(!ChannelContext::from(row(None, Some("tok"))).webhook_configured());
    }
}
