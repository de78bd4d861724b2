use crate::api::models::JobListItem;
use crate::jobs::model::{Job, JobStatus, NewJob};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ----------------------------
    // Enqueue
    // ----------------------------

    pub async fn enqueue(&self, job: NewJob) -> anyhow::Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (queue, job_type, payload_json, run_at, status, priority, max_attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&job.queue)
        .bind(&job.job_type)
        .bind(&job.payload_json)
        .bind(job.run_at)
        .bind(JobStatus::Queued.as_str())
        .bind(job.priority)
        .bind(job.max_attempts)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Batch enqueue in one round-trip. Every row inherits the same
    /// retry policy semantics as the single-job path.
    pub async fn enqueue_many(&self, jobs: &[NewJob]) -> anyhow::Result<Vec<Uuid>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let queues: Vec<&str> = jobs.iter().map(|j| j.queue.as_str()).collect();
        let job_types: Vec<&str> = jobs.iter().map(|j| j.job_type.as_str()).collect();
        let payloads: Vec<Value> = jobs.iter().map(|j| j.payload_json.clone()).collect();
        let run_ats: Vec<DateTime<Utc>> = jobs.iter().map(|j| j.run_at).collect();
        let priorities: Vec<i32> = jobs.iter().map(|j| j.priority).collect();
        let max_attempts: Vec<i32> = jobs.iter().map(|j| j.max_attempts).collect();

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (queue, job_type, payload_json, run_at, status, priority, max_attempts)
            SELECT t.queue, t.job_type, t.payload_json, t.run_at, 'queued', t.priority, t.max_attempts
            FROM unnest(
                $1::text[], $2::text[], $3::jsonb[], $4::timestamptz[], $5::int4[], $6::int4[]
            ) AS t(queue, job_type, payload_json, run_at, priority, max_attempts)
            RETURNING id
            "#,
        )
        .bind(&queues)
        .bind(&job_types)
        .bind(&payloads)
        .bind(&run_ats)
        .bind(&priorities)
        .bind(&max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get_job(&self, job_id: Uuid) -> anyhow::Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    /// Cursor-paginated list. Cursor is (created_at, id) ordered DESC;
    /// queue/status filters optional; limit clamped to [1, 500].
    pub async fn list_jobs(
        &self,
        queue: Option<&str>,
        status: Option<&str>,
        limit: i64,
        cursor: Option<(DateTime<Utc>, Uuid)>,
    ) -> anyhow::Result<Vec<JobListItem>> {
        let limit = limit.clamp(1, 500);

        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT
                id, queue, job_type, status,
                run_at, priority, max_attempts,
                last_error_code, last_error_message,
                failure_reason_code,
                created_at, updated_at
            FROM jobs
            WHERE TRUE
            "#,
        );

        if let Some(q) = queue {
            qb.push(" AND queue = ").push_bind(q);
        }
        if let Some(st) = status {
            qb.push(" AND status = ").push_bind(st);
        }
        if let Some((created_at, id)) = cursor {
            qb.push(" AND (created_at, id) < (")
                .push_bind(created_at)
                .push(", ")
                .push_bind(id)
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit);

        let rows = qb.build_query_as::<JobListItem>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    // ----------------------------
    // Leasing
    // ----------------------------

    /// Lease exactly one runnable job for this worker.
    ///
    /// SELECT ... FOR UPDATE SKIP LOCKED guarantees no two workers claim the
    /// same job; the lease expiry lets the reaper reclaim jobs from dead
    /// workers.
    pub async fn lease_one_job(
        &self,
        queue: &str,
        worker_id: &str,
        lease_seconds: i64,
    ) -> anyhow::Result<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let candidate = sqlx::query_as::<_, Job>(
            r#"
            SELECT *
            FROM jobs
            WHERE queue = $1
              AND status = 'queued'
              AND run_at <= now()
            ORDER BY priority DESC, run_at ASC, created_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .bind(queue)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let leased = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'running',
                locked_by = $2,
                locked_at = now(),
                lock_expires_at = now() + ($3::int * interval '1 second'),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(worker_id)
        .bind(lease_seconds)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(leased))
    }

    pub async fn reap_expired_locks(&self) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued',
                locked_at = NULL,
                locked_by = NULL,
                lock_expires_at = NULL,
                updated_at = now()
            WHERE status = 'running'
              AND lock_expires_at IS NOT NULL
              AND lock_expires_at < now()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    // ----------------------------
    // State transitions
    // ----------------------------

    pub async fn mark_succeeded(
        &self,
        job_id: Uuid,
        worker_id: &str,
        result_json: Option<&Value>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                result_json = $3,
                locked_at = NULL,
                locked_by = NULL,
                lock_expires_at = NULL,
                updated_at = now()
            WHERE id = $1
              AND locked_by = $2
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(result_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn reschedule_for_retry(
        &self,
        job_id: Uuid,
        next_run_at: DateTime<Utc>,
        last_error_code: Option<&str>,
        last_error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'queued',
                run_at = $2,
                locked_at = NULL,
                locked_by = NULL,
                lock_expires_at = NULL,
                updated_at = now(),
                last_error_code = $3,
                last_error_message = $4
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(next_run_at)
        .bind(last_error_code)
        .bind(last_error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(
        &self,
        job_id: Uuid,
        worker_id: &str,
        failure_reason_code: &str,
        last_error_code: Option<&str>,
        last_error_message: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                failure_reason_code = $3,
                locked_at = NULL,
                locked_by = NULL,
                lock_expires_at = NULL,
                updated_at = now(),
                last_error_code = $4,
                last_error_message = $5
            WHERE id = $1
              AND locked_by = $2
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(failure_reason_code)
        .bind(last_error_code)
        .bind(last_error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
