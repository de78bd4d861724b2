use crate::db::Broker;
use crate::jobs::model::NewJob;
use crate::jobs::repo::JobsRepo;
use crate::queues::QueueName;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

pub const JOB_RENDER_EXECUTE: &str = "render.execute";
pub const JOB_EMAIL_SEND: &str = "email.send";
pub const JOB_WEBHOOK_DELIVER: &str = "webhook.deliver";
pub const JOB_FILES_CLEANUP: &str = "files.cleanup";
pub const JOB_ANALYTICS_TRACK: &str = "analytics.track";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJobPayload {
    pub execution_id: Uuid,
    pub template_id: String,
    pub assets: BTreeMap<String, String>,
    pub user_id: String,
    pub client_id: String,
    #[serde(default)]
    pub preview: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJobPayload {
    pub to: String,
    pub subject: String,
    pub template: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookJobPayload {
    pub subscription_id: Uuid,
    pub url: String,
    pub event: String,
    pub data: Value,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCleanupPayload {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsPayload {
    pub event: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub properties: Value,
}

/// Typed enqueue functions, one per queue, each applying that queue's
/// defaults. With a disabled broker every call returns `Ok(None)` and warns;
/// callers treat "job not enqueued" as a non-fatal, observable condition.
#[derive(Clone)]
pub struct Producers {
    broker: Broker,
}

impl Producers {
    pub fn new(broker: Broker) -> Self {
        Self { broker }
    }

    fn repo(&self, queue: QueueName) -> Option<JobsRepo> {
        match self.broker.pool() {
            Some(pool) => Some(JobsRepo::new(pool.clone())),
            None => {
                warn!(queue = queue.as_str(), "broker disabled, job not enqueued");
                None
            }
        }
    }

    fn new_job(
        queue: QueueName,
        job_type: &str,
        payload: Value,
        priority: i32,
        delay_secs: i64,
        max_attempts: Option<i32>,
    ) -> NewJob {
        let spec = queue.spec();
        NewJob {
            queue: queue.as_str().to_string(),
            job_type: job_type.to_string(),
            payload_json: payload,
            run_at: Utc::now() + chrono::Duration::seconds(delay_secs),
            priority,
            max_attempts: max_attempts.unwrap_or(spec.max_attempts),
        }
    }

    pub async fn enqueue_render(
        &self,
        payload: &RenderJobPayload,
        priority: Option<i32>,
    ) -> anyhow::Result<Option<Uuid>> {
        let Some(repo) = self.repo(QueueName::Render) else {
            return Ok(None);
        };
        let job = Self::new_job(
            QueueName::Render,
            JOB_RENDER_EXECUTE,
            serde_json::to_value(payload)?,
            priority.unwrap_or(0),
            0,
            None,
        );
        Ok(Some(repo.enqueue(job).await?))
    }

    /// One batch insert; every row inherits the single-job retry policy.
    pub async fn enqueue_render_batch(
        &self,
        payloads: &[RenderJobPayload],
    ) -> anyhow::Result<Option<Vec<Uuid>>> {
        let Some(repo) = self.repo(QueueName::Render) else {
            return Ok(None);
        };
        let jobs = payloads
            .iter()
            .map(|p| {
                Ok(Self::new_job(
                    QueueName::Render,
                    JOB_RENDER_EXECUTE,
                    serde_json::to_value(p)?,
                    0,
                    0,
                    None,
                ))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Some(repo.enqueue_many(&jobs).await?))
    }

    pub async fn enqueue_email(&self, payload: &EmailJobPayload) -> anyhow::Result<Option<Uuid>> {
        let Some(repo) = self.repo(QueueName::Email) else {
            return Ok(None);
        };
        let job = Self::new_job(
            QueueName::Email,
            JOB_EMAIL_SEND,
            serde_json::to_value(payload)?,
            0,
            0,
            None,
        );
        Ok(Some(repo.enqueue(job).await?))
    }

    pub async fn enqueue_webhook(
        &self,
        payload: &WebhookJobPayload,
        max_attempts: Option<i32>,
    ) -> anyhow::Result<Option<Uuid>> {
        let Some(repo) = self.repo(QueueName::Webhook) else {
            return Ok(None);
        };
        let job = Self::new_job(
            QueueName::Webhook,
            JOB_WEBHOOK_DELIVER,
            serde_json::to_value(payload)?,
            0,
            0,
            max_attempts,
        );
        Ok(Some(repo.enqueue(job).await?))
    }

    pub async fn enqueue_file_cleanup(
        &self,
        payload: &FileCleanupPayload,
        delay_secs: Option<i64>,
    ) -> anyhow::Result<Option<Uuid>> {
        let Some(repo) = self.repo(QueueName::FileCleanup) else {
            return Ok(None);
        };
        let job = Self::new_job(
            QueueName::FileCleanup,
            JOB_FILES_CLEANUP,
            serde_json::to_value(payload)?,
            0,
            delay_secs.unwrap_or(0),
            None,
        );
        Ok(Some(repo.enqueue(job).await?))
    }

    pub async fn enqueue_analytics(
        &self,
        payload: &AnalyticsPayload,
    ) -> anyhow::Result<Option<Uuid>> {
        let Some(repo) = self.repo(QueueName::Analytics) else {
            return Ok(None);
        };
        let job = Self::new_job(
            QueueName::Analytics,
            JOB_ANALYTICS_TRACK,
            serde_json::to_value(payload)?,
            0,
            0,
            None,
        );
        Ok(Some(repo.enqueue(job).await?))
    }
}
