use crate::integrations::telemetry::ErrorTracker;
use crate::jobs::handler::{HandlerRegistry, JobContext, JobError, Outcome};
use crate::jobs::retry::RetryConfig;
use crate::jobs::{AttemptsRepo, Job, JobRunner, JobsRepo};
use crate::queues::QueueName;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

/// One consumer per queue: reaps expired leases on an interval, leases
/// runnable jobs, and executes handlers with bounded concurrency. Cross-job
/// coordination happens only through the broker row locks; tasks share no
/// mutable state.
pub struct QueueConsumer {
    queue: QueueName,
    jobs: JobsRepo,
    attempts: AttemptsRepo,
    runner: JobRunner,
    registry: Arc<HandlerRegistry>,
    tracker: Arc<dyn ErrorTracker>,
    worker_id: String,
    lease_seconds: i64,
    reap_interval: Duration,
    idle_sleep: Duration,
    concurrency: usize,
}

impl QueueConsumer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: QueueName,
        pool: PgPool,
        registry: Arc<HandlerRegistry>,
        tracker: Arc<dyn ErrorTracker>,
        worker_id: String,
        lease_seconds: i64,
        reap_interval: Duration,
        idle_sleep: Duration,
    ) -> Self {
        let jobs = JobsRepo::new(pool.clone());
        let attempts = AttemptsRepo::new(pool);
        let runner = JobRunner::new(jobs.clone(), attempts.clone(), RetryConfig::default());
        let concurrency = queue.spec().concurrency();

        Self {
            queue,
            jobs,
            attempts,
            runner,
            registry,
            tracker,
            worker_id,
            lease_seconds,
            reap_interval,
            idle_sleep,
            concurrency,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            queue = self.queue.as_str(),
            worker_id = %self.worker_id,
            concurrency = self.concurrency,
            "consumer starting"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut last_reap_at = Instant::now()
            .checked_sub(self.reap_interval)
            .unwrap_or_else(Instant::now);

        loop {
            // Reclaim jobs from dead workers on a fixed interval to avoid
            // hot-loop write load.
            if last_reap_at.elapsed() >= self.reap_interval {
                let reaped = self.jobs.reap_expired_locks().await?;
                last_reap_at = Instant::now();
                if reaped > 0 {
                    info!(queue = self.queue.as_str(), reaped, "reaped expired leases");
                }
            }

            let permit = semaphore.clone().acquire_owned().await?;

            let Some(job) = self
                .jobs
                .lease_one_job(self.queue.as_str(), &self.worker_id, self.lease_seconds)
                .await?
            else {
                drop(permit);
                tokio::time::sleep(self.idle_sleep).await;
                continue;
            };

            let queue = self.queue;
            let attempts = self.attempts.clone();
            let runner = self.runner.clone();
            let registry = self.registry.clone();
            let tracker = self.tracker.clone();
            let worker_id = self.worker_id.clone();

            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) =
                    execute_one(queue, job, attempts, runner, registry, tracker, worker_id).await
                {
                    // Settlement failed (broker write error); the lease will
                    // expire and the reaper returns the job to the queue.
                    error!(queue = queue.as_str(), error = %e, "job settlement error");
                }
            });
        }
    }
}

async fn execute_one(
    queue: QueueName,
    job: Job,
    attempts: AttemptsRepo,
    runner: JobRunner,
    registry: Arc<HandlerRegistry>,
    tracker: Arc<dyn ErrorTracker>,
    worker_id: String,
) -> anyhow::Result<()> {
    let attempt = attempts.start_attempt(job.id, &worker_id).await?;
    let ctx = JobContext {
        worker_id,
        attempt_no: attempt.attempt_no,
    };
    let start = Instant::now();

    debug!(
        queue = queue.as_str(),
        job_id = %job.id,
        job_type = %job.job_type,
        attempt_no = attempt.attempt_no,
        "executing job"
    );

    let result: Result<Outcome, JobError> = match registry.handler_for(&job.job_type) {
        Some(entry) => entry.run(&job, &ctx).await,
        None => Err(JobError::new(
            "UNKNOWN_JOB_TYPE",
            format!("no handler for job_type={}", job.job_type),
        )),
    };

    let latency_ms = start.elapsed().as_millis() as i32;

    match result {
        Ok(Outcome::Success(value)) => {
            runner
                .on_success(job.id, attempt.id, &ctx.worker_id, latency_ms, value)
                .await?;
            debug!(queue = queue.as_str(), job_id = %job.id, latency_ms, "job succeeded");
        }
        Ok(Outcome::PermanentFailure { reason }) => {
            runner
                .on_permanent_failure(job.id, attempt.id, &ctx.worker_id, latency_ms, &reason)
                .await?;
            tracker.report(queue.as_str(), job.id, "PERMANENT_FAILURE", &reason);
            info!(queue = queue.as_str(), job_id = %job.id, reason, "job permanently failed (no retry)");
        }
        Err(err) => {
            runner
                .on_failure(
                    queue,
                    job.id,
                    attempt.id,
                    &ctx.worker_id,
                    latency_ms,
                    err.code,
                    &err.message,
                    attempt.attempt_no,
                    job.max_attempts,
                )
                .await?;
            tracker.report(queue.as_str(), job.id, err.code, &err.message);
            info!(
                queue = queue.as_str(),
                job_id = %job.id,
                attempt_no = attempt.attempt_no,
                code = err.code,
                "job attempt failed"
            );
        }
    }

    Ok(())
}
