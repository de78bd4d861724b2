use crate::jobs::{error_codes, AttemptsRepo, JobsRepo};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct JobTimeline {
    pub job_id: Uuid,
    pub status: String,
    pub queue: String,
    pub job_type: String,
    pub run_at: DateTime<Utc>,

    pub next_run_at: Option<DateTime<Utc>>,
    pub last_worker_id: Option<String>,
    pub last_error: Option<LastError>,
    pub failure_reason_code: Option<String>,

    pub attempts: Vec<TimelineAttempt>,
}

#[derive(Debug, Serialize)]
pub struct TimelineAttempt {
    pub id: Uuid,
    pub attempt_no: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub latency_ms: Option<i32>,
    pub worker_id: String,
    pub suggested_action: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LastError {
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

pub async fn build_timeline(
    jobs: &JobsRepo,
    attempts: &AttemptsRepo,
    job_id: Uuid,
) -> anyhow::Result<Option<JobTimeline>> {
    let job = match jobs.get_job(job_id).await? {
        Some(j) => j,
        None => return Ok(None),
    };

    let raw_attempts = attempts.list_attempts_for_job(job_id).await?;

    let last_worker_id = raw_attempts.last().map(|a| a.worker_id.clone());
    let last_failed = raw_attempts.iter().rev().find(|a| a.status == "failed");

    let last_error = last_failed.map(|a| LastError {
        error_code: a.error_code.clone(),
        error_message: a.error_message.clone(),
    });

    let next_run_at = if job.status == "queued" {
        Some(job.run_at)
    } else {
        None
    };

    let attempts_out: Vec<TimelineAttempt> = raw_attempts
        .into_iter()
        .map(|a| {
            let suggested = a
                .error_code
                .as_deref()
                .map(|code| error_codes::suggested_action(code).to_string());

            TimelineAttempt {
                id: a.id,
                attempt_no: a.attempt_no,
                status: a.status,
                started_at: a.started_at,
                finished_at: a.finished_at,
                error_code: a.error_code,
                error_message: a.error_message,
                latency_ms: a.latency_ms,
                worker_id: a.worker_id,
                suggested_action: suggested,
            }
        })
        .collect();

    Ok(Some(JobTimeline {
        job_id: job.id,
        status: job.status,
        queue: job.queue,
        job_type: job.job_type,
        run_at: job.run_at,
        next_run_at,
        last_worker_id,
        last_error,
        failure_reason_code: job.failure_reason_code,
        attempts: attempts_out,
    }))
}
