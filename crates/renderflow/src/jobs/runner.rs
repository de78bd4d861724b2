use crate::jobs::{
    attempts::AttemptsRepo,
    repo::JobsRepo,
    retry::{classify_error, next_delay_ms, ErrorClass, RetryConfig},
};
use crate::queues::QueueName;
use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use serde_json::{json, Value};
use uuid::Uuid;

/// Settles job outcomes: closes the attempt audit row, then either records
/// success, records a soft permanent failure, or decides retry vs. terminal
/// failure using the owning queue's backoff policy.
#[derive(Clone)]
pub struct JobRunner {
    jobs: JobsRepo,
    attempts: AttemptsRepo,
    retry_cfg: RetryConfig,
}

impl JobRunner {
    pub fn new(jobs: JobsRepo, attempts: AttemptsRepo, retry_cfg: RetryConfig) -> Self {
        Self {
            jobs,
            attempts,
            retry_cfg,
        }
    }

    pub async fn on_success(
        &self,
        job_id: Uuid,
        attempt_id: Uuid,
        worker_id: &str,
        latency_ms: i32,
        result: Value,
    ) -> anyhow::Result<()> {
        self.attempts
            .finish_succeeded(attempt_id, latency_ms)
            .await?;
        self.jobs
            .mark_succeeded(job_id, worker_id, Some(&result))
            .await?;
        Ok(())
    }

    /// Soft failure: the job completes (no retry), the outcome is recorded
    /// for reporting.
    pub async fn on_permanent_failure(
        &self,
        job_id: Uuid,
        attempt_id: Uuid,
        worker_id: &str,
        latency_ms: i32,
        reason: &str,
    ) -> anyhow::Result<()> {
        self.attempts
            .finish_succeeded(attempt_id, latency_ms)
            .await?;

        let result = json!({
            "success": false,
            "permanent_failure": true,
            "reason": reason,
        });
        self.jobs
            .mark_succeeded(job_id, worker_id, Some(&result))
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn on_failure(
        &self,
        queue: QueueName,
        job_id: Uuid,
        attempt_id: Uuid,
        worker_id: &str,
        latency_ms: i32,
        error_code: &str,
        error_message: &str,
        attempt_no: i32,
        max_attempts: i32,
    ) -> anyhow::Result<()> {
        self.attempts
            .finish_failed(attempt_id, latency_ms, error_code, error_message)
            .await?;

        let class = classify_error(error_code);
        let can_retry = class == ErrorClass::Retryable && attempt_no < max_attempts;

        if can_retry {
            let mut rng = StdRng::from_entropy();
            let delay_ms =
                next_delay_ms(attempt_no, &queue.spec().backoff, &self.retry_cfg, &mut rng);
            let next_run_at = Utc::now() + chrono::Duration::milliseconds(delay_ms);

            self.jobs
                .reschedule_for_retry(job_id, next_run_at, Some(error_code), Some(error_message))
                .await?;
        } else {
            let reason_code = match class {
                ErrorClass::NonRetryable => "NON_RETRYABLE",
                ErrorClass::Retryable => "MAX_ATTEMPTS_EXCEEDED",
            };

            self.jobs
                .mark_failed(
                    job_id,
                    worker_id,
                    reason_code,
                    Some(error_code),
                    Some(error_message),
                )
                .await?;
        }

        Ok(())
    }
}
