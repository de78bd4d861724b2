use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::{error, info, warn};

/// The shared broker connection. All producers and workers in a process reuse
/// one handle; per-job pooling is left to sqlx.
///
/// When no database URL is configured the broker is disabled: `pool()` is
/// `None` and producer calls degrade to logged no-ops instead of erroring.
#[derive(Clone)]
pub struct Broker {
    pool: Option<PgPool>,
}

/// Capped backoff between connect attempts: min(attempt * 50ms, 2000ms).
pub fn reconnect_delay(attempt: u32) -> Duration {
    Duration::from_millis((attempt as u64 * 50).min(2_000))
}

const MAX_CONNECT_ATTEMPTS: u32 = 20;

impl Broker {
    pub fn disabled() -> Self {
        Self { pool: None }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool: Some(pool) }
    }

    /// Connect to the broker, retrying with capped backoff. Passing `None`
    /// yields a disabled broker.
    pub async fn connect(database_url: Option<&str>) -> anyhow::Result<Self> {
        let Some(url) = database_url else {
            warn!("no DATABASE_URL configured, broker disabled: jobs will not be enqueued");
            return Ok(Self::disabled());
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match make_pool(url).await {
                Ok(pool) => {
                    info!(attempt, "broker connected");
                    return Ok(Self { pool: Some(pool) });
                }
                Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                    let delay = reconnect_delay(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "broker connect failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(attempt, error = %e, "broker connect failed, giving up");
                    return Err(e);
                }
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub async fn ping(&self) -> bool {
        match &self.pool {
            Some(pool) => sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(pool)
                .await
                .is_ok(),
            None => false,
        }
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
            info!("broker connection closed");
        }
    }
}

pub async fn make_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let max_connections = std::env::var("RENDERFLOW_DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(8)
        .clamp(1, 32);

    let acquire_timeout_secs = std::env::var("RENDERFLOW_DB_ACQUIRE_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10)
        .clamp(1, 60);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
        .connect(database_url)
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
