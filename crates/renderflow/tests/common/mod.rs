use chrono::Utc;
use renderflow::jobs::model::NewJob;
use serde_json::json;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Connects to TEST_DATABASE_URL, runs migrations, and wipes state.
/// Returns None when no test database is configured so callers can skip.
pub async fn setup_db() -> Option<PgPool> {
    let _ = dotenvy::dotenv();

    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    sqlx::query(
        r#"
        TRUNCATE TABLE
            job_attempts,
            jobs,
            render_executions,
            webhook_subscriptions
        RESTART IDENTITY CASCADE
        "#,
    )
    .execute(&pool)
    .await
    .expect("truncate failed");

    Some(pool)
}

#[allow(dead_code)]
pub fn test_job(queue: &str, job_type: &str, max_attempts: i32) -> NewJob {
    NewJob {
        queue: queue.to_string(),
        job_type: job_type.to_string(),
        payload_json: json!({}),
        run_at: Utc::now(),
        priority: 0,
        max_attempts,
    }
}

/// Leased jobs are invisible until run_at passes; tests fast-forward instead
/// of sleeping through real backoff delays.
#[allow(dead_code)]
pub async fn force_runnable(pool: &PgPool, job_id: uuid::Uuid) {
    sqlx::query("UPDATE jobs SET run_at = now() WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await
        .expect("failed to reset run_at");
}
