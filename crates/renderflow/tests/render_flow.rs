mod common;

use common::setup_db;
use renderflow::integrations::events::LogBroadcaster;
use renderflow::integrations::storage::LocalDiskStore;
use renderflow::jobs::handler::Outcome;
use renderflow::jobs::producers::{Producers, RenderJobPayload, JOB_EMAIL_SEND};
use renderflow::render::client::HttpRenderApi;
use renderflow::render::executions::ExecutionsRepo;
use renderflow::render::orchestrator::RenderOrchestrator;
use renderflow::Broker;
use serde_json::json;
use serial_test::serial;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn orchestrator(pool: &sqlx::PgPool, api_base: &str) -> RenderOrchestrator {
    let store_root = std::env::temp_dir().join(format!("renderflow-test-{}", Uuid::new_v4()));
    RenderOrchestrator::new(
        Arc::new(HttpRenderApi::new(api_base, "test-key").unwrap()),
        Arc::new(LocalDiskStore::new(store_root, "http://localhost:8080/artifacts")),
        Arc::new(LogBroadcaster),
        ExecutionsRepo::new(pool.clone()),
        Producers::new(Broker::from_pool(pool.clone())),
    )
    .with_polling(Duration::from_millis(10), 5)
}

async fn create_execution(pool: &sqlx::PgPool) -> (Uuid, RenderJobPayload) {
    let executions = ExecutionsRepo::new(pool.clone());
    let execution_id = executions
        .create("tmpl-1", &json!({"headline": "Hello"}), "user-1", "client-1", false)
        .await
        .unwrap();

    let payload = RenderJobPayload {
        execution_id,
        template_id: "tmpl-1".to_string(),
        assets: BTreeMap::from([("headline".to_string(), "Hello".to_string())]),
        user_id: "user-1".to_string(),
        client_id: "client-1".to_string(),
        preview: false,
    };
    (execution_id, payload)
}

#[tokio::test]
#[serial]
async fn completed_render_stores_artifact_and_notifies() {
    let Some(pool) = setup_db().await else { return };

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/renders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r-1",
            "status": "processing",
            "url": null,
            "error": null,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/renders/r-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r-1",
            "status": "completed",
            "url": format!("{}/artifacts/r-1.mp4", server.uri()),
            "error": null,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/artifacts/r-1.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake-mp4".to_vec()))
        .mount(&server)
        .await;

    let (execution_id, payload) = create_execution(&pool).await;
    let orchestrator = orchestrator(&pool, &server.uri()).await;

    let outcome = orchestrator.run(&payload).await.unwrap();
    let result = match outcome {
        Outcome::Success(v) => v,
        other => panic!("expected success, got {other:?}"),
    };
    assert_eq!(result["render_id"], "r-1");
    assert!(result["output_url"].as_str().unwrap().contains("/artifacts/"));

    let execution = ExecutionsRepo::new(pool.clone())
        .get(execution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, "completed");
    assert!(execution.output_url.is_some());
    assert!(execution.error_message.is_none());

    // Exactly one completion email was enqueued downstream.
    let email_jobs: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM jobs WHERE queue = 'email' AND job_type = $1 AND status = 'queued'",
    )
    .bind(JOB_EMAIL_SEND)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(email_jobs, 1);
}

#[tokio::test]
#[serial]
async fn provider_failure_marks_execution_and_throws() {
    let Some(pool) = setup_db().await else { return };

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/renders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r-2",
            "status": "failed",
            "url": null,
            "error": "template missing layer",
        })))
        .mount(&server)
        .await;

    let (execution_id, payload) = create_execution(&pool).await;
    let orchestrator = orchestrator(&pool, &server.uri()).await;

    let err = orchestrator.run(&payload).await.unwrap_err();
    assert_eq!(err.code, "RENDER_FAILED");
    assert!(err.message.contains("template missing layer"));

    let execution = ExecutionsRepo::new(pool.clone())
        .get(execution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, "failed");
    assert_eq!(
        execution.error_message.as_deref(),
        Some("template missing layer")
    );

    // A failed render never enqueues the completion email.
    let email_jobs: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = 'email'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(email_jobs, 0);
}

#[tokio::test]
#[serial]
async fn render_stuck_past_poll_budget_times_out() {
    let Some(pool) = setup_db().await else { return };

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/renders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r-3",
            "status": "pending",
            "url": null,
            "error": null,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/renders/r-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r-3",
            "status": "pending",
            "url": null,
            "error": null,
        })))
        .mount(&server)
        .await;

    let (execution_id, payload) = create_execution(&pool).await;
    let orchestrator = orchestrator(&pool, &server.uri()).await;

    let err = orchestrator.run(&payload).await.unwrap_err();
    assert_eq!(err.code, "TIMEOUT");

    let execution = ExecutionsRepo::new(pool.clone())
        .get(execution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(execution.status, "failed");
}
