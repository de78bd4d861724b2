use crate::queues::QueueName;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

/// Retention sweep: prunes terminal jobs per queue. Succeeded jobs are kept
/// up to a count and a max age; failed jobs up to a count. Attempt history
/// goes with the job rows (FK cascade).
#[derive(Clone)]
pub struct MaintenanceRepo {
    pool: PgPool,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub succeeded_pruned: u64,
    pub failed_pruned: u64,
}

impl MaintenanceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn sweep_all(&self) -> anyhow::Result<SweepReport> {
        let mut report = SweepReport::default();
        for queue in QueueName::all() {
            let r = self.sweep_queue(queue).await?;
            report.succeeded_pruned += r.succeeded_pruned;
            report.failed_pruned += r.failed_pruned;
        }
        Ok(report)
    }

    pub async fn sweep_queue(&self, queue: QueueName) -> anyhow::Result<SweepReport> {
        let spec = queue.spec();
        let age_cutoff = cutoff_hours(spec.succeeded_max_age_hours);

        // Succeeded: drop rows beyond the retention count, plus anything
        // older than the age cutoff.
        let succeeded_pruned = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE id IN (
                SELECT id FROM jobs
                WHERE queue = $1 AND status = 'succeeded'
                  AND updated_at < $2
                ORDER BY updated_at ASC
                LIMIT 500
            )
            OR id IN (
                SELECT id FROM jobs
                WHERE queue = $1 AND status = 'succeeded'
                ORDER BY updated_at DESC
                OFFSET $3
            )
            "#,
        )
        .bind(spec.name.as_str())
        .bind(age_cutoff)
        .bind(spec.keep_succeeded)
        .execute(&self.pool)
        .await?
        .rows_affected();

        // Failed: count-based retention only, so failures stay inspectable
        // until they age out of the window.
        let failed_pruned = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE id IN (
                SELECT id FROM jobs
                WHERE queue = $1 AND status = 'failed'
                ORDER BY updated_at DESC
                OFFSET $2
            )
            "#,
        )
        .bind(spec.name.as_str())
        .bind(spec.keep_failed)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(SweepReport {
            succeeded_pruned,
            failed_pruned,
        })
    }
}

pub fn cutoff_hours(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}
