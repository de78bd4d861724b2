use crate::jobs::producers::{Producers, WebhookJobPayload};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// A stored (url, event-type set, secret) tuple, optionally scoped to a
/// client. CRUD lives elsewhere; the trigger path only reads.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub client_id: Option<String>,
    pub url: String,
    pub event_types: Vec<String>,
    pub secret: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SubscriptionsRepo {
    pool: PgPool,
}

impl SubscriptionsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Active subscriptions whose event-type set contains `event`. A client
    /// scope matches subscriptions for that client plus unscoped ones.
    pub async fn find_active_for_event(
        &self,
        event: &str,
        client_id: Option<&str>,
    ) -> anyhow::Result<Vec<WebhookSubscription>> {
        let rows = sqlx::query_as::<_, WebhookSubscription>(
            r#"
            SELECT *
            FROM webhook_subscriptions
            WHERE active
              AND $1 = ANY(event_types)
              AND (client_id IS NULL OR $2::text IS NULL OR client_id = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(event)
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Fan out an event: one delivery job per matching subscription.
    /// Returns the enqueued job ids (empty when the broker is disabled).
    pub async fn trigger_event(
        &self,
        producers: &Producers,
        event: &str,
        data: &Value,
        client_id: Option<&str>,
    ) -> anyhow::Result<Vec<Uuid>> {
        let subs = self.find_active_for_event(event, client_id).await?;
        debug!(event, matches = subs.len(), "webhook fan-out");

        let mut job_ids = Vec::with_capacity(subs.len());
        for sub in subs {
            let payload = WebhookJobPayload {
                subscription_id: sub.id,
                url: sub.url,
                event: event.to_string(),
                data: data.clone(),
                secret: sub.secret,
            };
            if let Some(id) = producers.enqueue_webhook(&payload, None).await? {
                job_ids.push(id);
            }
        }

        Ok(job_ids)
    }
}
