mod common;

use common::setup_db;
use renderflow::jobs::producers::{Producers, WebhookJobPayload};
use renderflow::jobs::JobsRepo;
use renderflow::webhooks::subscriptions::SubscriptionsRepo;
use renderflow::Broker;
use serde_json::json;
use serial_test::serial;
use sqlx::PgPool;
use uuid::Uuid;

async fn insert_subscription(
    pool: &PgPool,
    client_id: Option<&str>,
    url: &str,
    event_types: &[&str],
    active: bool,
) -> Uuid {
    let events: Vec<String> = event_types.iter().map(|s| s.to_string()).collect();
    sqlx::query_scalar(
        r#"
        INSERT INTO webhook_subscriptions (client_id, url, event_types, secret, active)
        VALUES ($1, $2, $3, 'whsec_test', $4)
        RETURNING id
        "#,
    )
    .bind(client_id)
    .bind(url)
    .bind(&events)
    .bind(active)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[serial]
async fn trigger_fans_out_to_matching_active_subscriptions() {
    let Some(pool) = setup_db().await else { return };
    let subs = SubscriptionsRepo::new(pool.clone());
    let producers = Producers::new(Broker::from_pool(pool.clone()));
    let jobs = JobsRepo::new(pool.clone());

    let matching = insert_subscription(
        &pool,
        None,
        "https://a.example.com/hook",
        &["render.completed", "render.failed"],
        true,
    )
    .await;
    // Wrong event type.
    insert_subscription(&pool, None, "https://b.example.com/hook", &["user.created"], true).await;
    // Right event type but deactivated.
    insert_subscription(&pool, None, "https://c.example.com/hook", &["render.completed"], false)
        .await;

    let job_ids = subs
        .trigger_event(
            &producers,
            "render.completed",
            &json!({"execution_id": "e-1"}),
            None,
        )
        .await
        .unwrap();
    assert_eq!(job_ids.len(), 1);

    let job = jobs.get_job(job_ids[0]).await.unwrap().unwrap();
    assert_eq!(job.queue, "webhook");
    let payload: WebhookJobPayload = serde_json::from_value(job.payload_json).unwrap();
    assert_eq!(payload.subscription_id, matching);
    assert_eq!(payload.url, "https://a.example.com/hook");
    assert_eq!(payload.event, "render.completed");
    assert_eq!(payload.secret, "whsec_test");
}

#[tokio::test]
#[serial]
async fn client_scope_matches_own_and_unscoped_subscriptions() {
    let Some(pool) = setup_db().await else { return };
    let subs = SubscriptionsRepo::new(pool.clone());

    insert_subscription(&pool, Some("client-1"), "https://one.example.com", &["render.completed"], true)
        .await;
    insert_subscription(&pool, Some("client-2"), "https://two.example.com", &["render.completed"], true)
        .await;
    insert_subscription(&pool, None, "https://global.example.com", &["render.completed"], true)
        .await;

    let for_client_1 = subs
        .find_active_for_event("render.completed", Some("client-1"))
        .await
        .unwrap();
    let urls: Vec<&str> = for_client_1.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(urls, vec!["https://one.example.com", "https://global.example.com"]);

    // No scope matches everything active.
    let unscoped = subs
        .find_active_for_event("render.completed", None)
        .await
        .unwrap();
    assert_eq!(unscoped.len(), 3);
}

#[tokio::test]
#[serial]
async fn trigger_with_no_matches_enqueues_nothing() {
    let Some(pool) = setup_db().await else { return };
    let subs = SubscriptionsRepo::new(pool.clone());
    let producers = Producers::new(Broker::from_pool(pool.clone()));

    let job_ids = subs
        .trigger_event(&producers, "render.completed", &json!({}), None)
        .await
        .unwrap();
    assert!(job_ids.is_empty());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
