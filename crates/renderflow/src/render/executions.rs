use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// One render request's persisted lifecycle. Created by the caller before
/// enqueuing; mutated only by the render worker; never deleted here.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RenderExecution {
    pub id: Uuid,
    pub template_id: String,
    pub assets_json: Value,
    pub user_id: String,
    pub client_id: String,
    pub preview: bool,
    pub status: String,
    pub output_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub enum ExecutionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Processing => "processing",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

#[derive(Clone)]
pub struct ExecutionsRepo {
    pool: PgPool,
}

impl ExecutionsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        template_id: &str,
        assets_json: &Value,
        user_id: &str,
        client_id: &str,
        preview: bool,
    ) -> anyhow::Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO render_executions (template_id, assets_json, user_id, client_id, preview, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id
            "#,
        )
        .bind(template_id)
        .bind(assets_json)
        .bind(user_id)
        .bind(client_id)
        .bind(preview)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> anyhow::Result<Option<RenderExecution>> {
        let row = sqlx::query_as::<_, RenderExecution>(
            "SELECT * FROM render_executions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn mark_processing(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE render_executions
            SET status = 'processing',
                error_message = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_completed(&self, id: Uuid, output_url: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE render_executions
            SET status = 'completed',
                output_url = $2,
                error_message = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(output_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: Uuid, error_message: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE render_executions
            SET status = 'failed',
                error_message = $2,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
