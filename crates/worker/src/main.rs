use renderflow::api;
use renderflow::config::Config;
use renderflow::db::{run_migrations, Broker};
use renderflow::integrations::email::LogEmailSender;
use renderflow::integrations::events::LogBroadcaster;
use renderflow::integrations::storage::LocalDiskStore;
use renderflow::integrations::telemetry::{ErrorTracker, LogAnalyticsSink, LogErrorTracker};
use renderflow::jobs::consumer::QueueConsumer;
use renderflow::jobs::metrics::MetricsRepo;
use renderflow::jobs::producers::Producers;
use renderflow::jobs::{AttemptsRepo, JobsRepo, MaintenanceRepo};
use renderflow::render::client::HttpRenderApi;
use renderflow::render::executions::ExecutionsRepo;
use renderflow::render::orchestrator::RenderOrchestrator;
use renderflow::webhooks::delivery::WebhookDeliverer;
use renderflow::QueueName;

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod handlers;
use handlers::{build_registry, WorkerDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;

    info!(
        worker_id = %cfg.worker_id,
        lease_seconds = cfg.lease_seconds,
        reap_interval_ms = cfg.reap_interval_ms,
        admin = cfg.admin_addr.as_deref().unwrap_or("disabled"),
        migrate_on_startup = cfg.migrate_on_startup,
        "renderflow worker starting"
    );

    let broker = Broker::connect(cfg.database_url.as_deref()).await?;
    let Some(pool) = broker.pool().cloned() else {
        anyhow::bail!("DATABASE_URL is required: the worker cannot run against a disabled broker");
    };
    if cfg.migrate_on_startup {
        run_migrations(&pool).await?;
    }

    let jobs = JobsRepo::new(pool.clone());
    let attempts = AttemptsRepo::new(pool.clone());
    let metrics = MetricsRepo::new(pool.clone());
    let maintenance = MaintenanceRepo::new(pool.clone());
    let producers = Producers::new(broker.clone());

    let render_api = Arc::new(HttpRenderApi::new(
        cfg.render_api_url.clone(),
        cfg.render_api_key.clone(),
    )?);
    let store = Arc::new(LocalDiskStore::new(
        cfg.storage_root.clone(),
        cfg.storage_public_url.clone(),
    ));
    let events = Arc::new(LogBroadcaster);
    let tracker: Arc<dyn ErrorTracker> = Arc::new(LogErrorTracker);

    let orchestrator = Arc::new(
        RenderOrchestrator::new(
            render_api,
            store.clone(),
            events,
            ExecutionsRepo::new(pool.clone()),
            producers.clone(),
        )
        .with_polling(
            Duration::from_millis(cfg.render_poll_interval_ms),
            cfg.render_max_polls,
        ),
    );

    let registry = build_registry(WorkerDeps {
        orchestrator,
        email: Arc::new(LogEmailSender),
        webhooks: WebhookDeliverer::new()?,
        store,
        analytics: Arc::new(LogAnalyticsSink),
    });

    // ---- Admin API task ----
    let api_addr = cfg.admin_addr.clone();
    let app = api::router(api::ApiState {
        jobs,
        attempts,
        metrics,
    });
    let api_handle = tokio::spawn(async move {
        if let Some(addr) = api_addr {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(%addr, "admin api listening");
            axum::serve(listener, app).await?;
        } else {
            std::future::pending::<()>().await;
        }
        Ok::<(), anyhow::Error>(())
    });

    // ---- Maintenance task ----
    let maintenance_interval = Duration::from_secs(cfg.maintenance_interval_secs);
    let maintenance_handle = tokio::spawn(async move {
        loop {
            match maintenance.sweep_all().await {
                Ok(r) if r.succeeded_pruned > 0 || r.failed_pruned > 0 => {
                    info!(
                        succeeded_pruned = r.succeeded_pruned,
                        failed_pruned = r.failed_pruned,
                        "retention sweep"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "retention sweep failed"),
            }
            tokio::time::sleep(maintenance_interval).await;
        }
        #[allow(unreachable_code)]
        Ok::<(), anyhow::Error>(())
    });

    // ---- Queue consumers, one per queue ----
    let mut consumers = tokio::task::JoinSet::new();
    for queue in QueueName::all() {
        let consumer = QueueConsumer::new(
            queue,
            pool.clone(),
            registry.clone(),
            tracker.clone(),
            cfg.worker_id.clone(),
            cfg.lease_seconds,
            Duration::from_millis(cfg.reap_interval_ms),
            Duration::from_millis(cfg.idle_sleep_ms),
        );
        consumers.spawn(consumer.run());
    }

    tokio::select! {
        res = api_handle => res??,
        res = maintenance_handle => res??,
        Some(res) = consumers.join_next() => res??,
    }

    Ok(())
}
