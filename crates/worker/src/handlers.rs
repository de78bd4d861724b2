use renderflow::integrations::email::{EmailError, EmailMessage, EmailSender};
use renderflow::integrations::storage::ObjectStore;
use renderflow::integrations::telemetry::AnalyticsSink;
use renderflow::jobs::handler::{boxed, parse_payload, HandlerRegistry, JobError, Outcome};
use renderflow::jobs::producers::{
    AnalyticsPayload, EmailJobPayload, FileCleanupPayload, RenderJobPayload, WebhookJobPayload,
    JOB_ANALYTICS_TRACK, JOB_EMAIL_SEND, JOB_FILES_CLEANUP, JOB_RENDER_EXECUTE,
    JOB_WEBHOOK_DELIVER,
};
use renderflow::render::orchestrator::RenderOrchestrator;
use renderflow::webhooks::delivery::WebhookDeliverer;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Everything the handlers need, shared across all queue consumers.
pub struct WorkerDeps {
    pub orchestrator: Arc<RenderOrchestrator>,
    pub email: Arc<dyn EmailSender>,
    pub webhooks: WebhookDeliverer,
    pub store: Arc<dyn ObjectStore>,
    pub analytics: Arc<dyn AnalyticsSink>,
}

/// A provider rejection of the address itself is a soft failure: the job
/// settles without retry and the reason lands in its result. Anything
/// transient throws so the email queue's backoff reschedules.
pub async fn dispatch_email(
    sender: &dyn EmailSender,
    payload: &EmailJobPayload,
) -> Result<Outcome, JobError> {
    let msg = EmailMessage {
        to: payload.to.clone(),
        subject: payload.subject.clone(),
        template: payload.template.clone(),
        data: payload.data.clone(),
    };

    match sender.send(&msg).await {
        Ok(receipt) => Ok(Outcome::Success(json!({
            "sent": true,
            "provider_id": receipt.id,
            "to": payload.to,
        }))),
        Err(EmailError::Permanent(reason)) => Ok(Outcome::PermanentFailure { reason }),
        Err(EmailError::Transient(reason)) => Err(JobError::new("EMAIL_TRANSIENT", reason)),
    }
}

pub fn build_registry(deps: WorkerDeps) -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    // Render budget: submit + 60 polls at 5s, plus download and upload.
    let orchestrator = deps.orchestrator;
    registry.register_with_timeout(
        JOB_RENDER_EXECUTE,
        move |job, _ctx| {
            let orchestrator = orchestrator.clone();
            boxed(async move {
                let payload: RenderJobPayload = parse_payload(job)?;
                orchestrator.run(&payload).await
            })
        },
        Duration::from_secs(600),
    );

    let email = deps.email;
    registry.register_with_timeout(
        JOB_EMAIL_SEND,
        move |job, _ctx| {
            let email = email.clone();
            boxed(async move {
                let payload: EmailJobPayload = parse_payload(job)?;
                dispatch_email(email.as_ref(), &payload).await
            })
        },
        Duration::from_secs(30),
    );

    let webhooks = deps.webhooks;
    registry.register_with_timeout(
        JOB_WEBHOOK_DELIVER,
        move |job, ctx| {
            let webhooks = webhooks.clone();
            let attempt_no = ctx.attempt_no;
            boxed(async move {
                let payload: WebhookJobPayload = parse_payload(job)?;
                webhooks.deliver(&payload, attempt_no).await
            })
        },
        Duration::from_secs(45),
    );

    let store = deps.store;
    registry.register_with_timeout(
        JOB_FILES_CLEANUP,
        move |job, _ctx| {
            let store = store.clone();
            boxed(async move {
                let payload: FileCleanupPayload = parse_payload(job)?;
                let mut deleted = 0usize;
                for key in &payload.keys {
                    store
                        .delete(key)
                        .await
                        .map_err(|e| JobError::new("DEPENDENCY_DOWN", format!("{key}: {e}")))?;
                    deleted += 1;
                }
                Ok(Outcome::Success(json!({ "deleted": deleted })))
            })
        },
        Duration::from_secs(60),
    );

    let analytics = deps.analytics;
    registry.register_with_timeout(
        JOB_ANALYTICS_TRACK,
        move |job, _ctx| {
            let analytics = analytics.clone();
            boxed(async move {
                let payload: AnalyticsPayload = parse_payload(job)?;
                analytics
                    .track(&payload)
                    .await
                    .map_err(|e| JobError::new("DEPENDENCY_DOWN", e.to_string()))?;
                Ok(Outcome::Success(json!({ "tracked": true })))
            })
        },
        Duration::from_secs(15),
    );

    Arc::new(registry)
}
