mod common;

use common::{force_runnable, setup_db};
use renderflow::jobs::handler::Outcome;
use renderflow::jobs::producers::{Producers, WebhookJobPayload};
use renderflow::jobs::retry::RetryConfig;
use renderflow::jobs::{AttemptsRepo, JobRunner, JobsRepo};
use renderflow::queues::QueueName;
use renderflow::webhooks::delivery::{headers, WebhookDeliverer};
use renderflow::webhooks::signature::{Signer, DEFAULT_TOLERANCE_MS};
use renderflow::Broker;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(url: String) -> WebhookJobPayload {
    WebhookJobPayload {
        subscription_id: Uuid::new_v4(),
        url,
        event: "render.completed".to_string(),
        data: json!({"execution_id": "e-1", "output_url": "http://x/y.mp4"}),
        secret: "whsec_test".to_string(),
    }
}

#[tokio::test]
async fn delivery_posts_a_verifiable_signature() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let deliverer = WebhookDeliverer::new().unwrap();
    let payload = payload(format!("{}/hook", server.uri()));

    let outcome = deliverer.deliver(&payload, 1).await.unwrap();
    assert!(matches!(outcome, Outcome::Success(_)));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];

    let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
    assert_eq!(body["event"], "render.completed");

    let header = req.headers.get(headers::SIGNATURE).unwrap().to_str().unwrap();
    assert!(Signer::new("whsec_test").verify(header, &body, DEFAULT_TOLERANCE_MS));
    // The wrong secret must not verify the same header.
    assert!(!Signer::new("other").verify(header, &body, DEFAULT_TOLERANCE_MS));

    assert_eq!(req.headers.get(headers::EVENT).unwrap(), "render.completed");
    assert_eq!(req.headers.get(headers::ATTEMPT).unwrap(), "1");
    assert!(req.headers.get(headers::DELIVERY_ID).is_some());
}

#[tokio::test]
async fn rejecting_endpoint_is_a_permanent_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let deliverer = WebhookDeliverer::new().unwrap();
    let outcome = deliverer
        .deliver(&payload(format!("{}/hook", server.uri())), 1)
        .await
        .unwrap();

    match outcome {
        Outcome::PermanentFailure { reason } => assert!(reason.contains("410")),
        other => panic!("expected permanent failure, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_and_throttles_throw_for_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let deliverer = WebhookDeliverer::new().unwrap();
    let err = deliverer
        .deliver(&payload(format!("{}/hook", server.uri())), 1)
        .await
        .unwrap_err();
    assert_eq!(err.code, "DELIVERY_FAILED");
}

#[tokio::test]
async fn unreachable_endpoint_throws_for_retry() {
    let deliverer = WebhookDeliverer::new().unwrap();
    let err = deliverer
        .deliver(&payload("http://127.0.0.1:1/hook".to_string()), 1)
        .await
        .unwrap_err();
    assert_eq!(err.code, "DELIVERY_FAILED");
}

/// End to end through the broker: a flaky endpoint exhausts the webhook
/// queue's attempt budget, one attempt row per try, then the job terminates.
#[tokio::test]
#[serial]
async fn failing_endpoint_exhausts_queue_attempts() {
    let Some(pool) = setup_db().await else { return };

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let producers = Producers::new(Broker::from_pool(pool.clone()));
    let job_id = producers
        .enqueue_webhook(&payload(format!("{}/hook", server.uri())), None)
        .await
        .unwrap()
        .unwrap();

    let jobs = JobsRepo::new(pool.clone());
    let attempts = AttemptsRepo::new(pool.clone());
    let runner = JobRunner::new(jobs.clone(), attempts.clone(), RetryConfig::default());
    let deliverer = WebhookDeliverer::new().unwrap();

    for _ in 0..3 {
        force_runnable(&pool, job_id).await;
        let job = jobs
            .lease_one_job("webhook", "worker-a", 30)
            .await
            .unwrap()
            .unwrap();
        let attempt = attempts.start_attempt(job.id, "worker-a").await.unwrap();

        let wh: WebhookJobPayload = serde_json::from_value(job.payload_json.clone()).unwrap();
        let err = deliverer.deliver(&wh, attempt.attempt_no).await.unwrap_err();

        runner
            .on_failure(
                QueueName::Webhook,
                job.id,
                attempt.id,
                "worker-a",
                10,
                err.code,
                &err.message,
                attempt.attempt_no,
                job.max_attempts,
            )
            .await
            .unwrap();
    }

    let updated = jobs.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(updated.status, "failed");
    assert_eq!(
        updated.failure_reason_code.as_deref(),
        Some("MAX_ATTEMPTS_EXCEEDED")
    );
    assert_eq!(attempts.count_for_job(job_id).await.unwrap(), 3);

    // The attempt header tracked the broker's counter.
    let received = server.received_requests().await.unwrap();
    let attempt_headers: Vec<_> = received
        .iter()
        .map(|r| r.headers.get(headers::ATTEMPT).unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(attempt_headers, vec!["1", "2", "3"]);
}
