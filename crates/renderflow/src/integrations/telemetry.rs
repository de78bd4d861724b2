use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::jobs::producers::AnalyticsPayload;

/// Receives exceptions with queue/job tags. Best-effort: must never block or
/// fail job settlement, hence synchronous and infallible.
pub trait ErrorTracker: Send + Sync {
    fn report(&self, queue: &str, job_id: Uuid, code: &str, message: &str);
}

pub struct LogErrorTracker;

impl ErrorTracker for LogErrorTracker {
    fn report(&self, queue: &str, job_id: Uuid, code: &str, message: &str) {
        warn!(queue, %job_id, code, message, "job error reported");
    }
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn track(&self, event: &AnalyticsPayload) -> anyhow::Result<()>;
}

pub struct LogAnalyticsSink;

#[async_trait]
impl AnalyticsSink for LogAnalyticsSink {
    async fn track(&self, event: &AnalyticsPayload) -> anyhow::Result<()> {
        info!(event = %event.event, user_id = ?event.user_id, "analytics event");
        Ok(())
    }
}
