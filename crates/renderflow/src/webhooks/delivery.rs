use crate::jobs::handler::{JobError, Outcome};
use crate::jobs::producers::WebhookJobPayload;
use crate::webhooks::signature::Signer;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

pub mod headers {
    pub const SIGNATURE: &str = "X-Webhook-Signature";
    pub const EVENT: &str = "X-Webhook-Event";
    pub const DELIVERY_ID: &str = "X-Webhook-Id";
    pub const ATTEMPT: &str = "X-Webhook-Attempt";
}

/// POSTs signed webhook payloads. Retry is queue-native: transient failures
/// (5xx, 408/429, network errors) throw so the webhook queue's backoff
/// reschedules; a rejecting endpoint (other 4xx) is a permanent failure.
#[derive(Clone)]
pub struct WebhookDeliverer {
    http: reqwest::Client,
}

impl WebhookDeliverer {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .user_agent("renderflow-webhooks/0.1")
            .build()?;
        Ok(Self { http })
    }

    pub async fn deliver(
        &self,
        payload: &WebhookJobPayload,
        attempt_no: i32,
    ) -> Result<Outcome, JobError> {
        let delivery_id = Uuid::new_v4();
        let body = json!({
            "event": payload.event,
            "data": payload.data,
        });

        let signature = Signer::new(&payload.secret).sign(&body);

        debug!(
            %delivery_id,
            url = %payload.url,
            event = %payload.event,
            attempt_no,
            "delivering webhook"
        );

        let response = self
            .http
            .post(&payload.url)
            .header("Content-Type", "application/json")
            .header(headers::SIGNATURE, signature)
            .header(headers::EVENT, &payload.event)
            .header(headers::DELIVERY_ID, delivery_id.to_string())
            .header(headers::ATTEMPT, attempt_no.to_string())
            .json(&body)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    Ok(Outcome::Success(json!({
                        "delivered": true,
                        "status": status.as_u16(),
                        "delivery_id": delivery_id,
                    })))
                } else if is_permanent_status(status) {
                    Ok(Outcome::PermanentFailure {
                        reason: format!(
                            "endpoint {} rejected event {}: HTTP {}",
                            payload.url, payload.event, status
                        ),
                    })
                } else {
                    Err(JobError::new(
                        "DELIVERY_FAILED",
                        format!("endpoint {} returned HTTP {}", payload.url, status),
                    ))
                }
            }
            Err(e) => Err(JobError::new(
                "DELIVERY_FAILED",
                format!("request to {} failed: {e}", payload.url),
            )),
        }
    }
}

/// 4xx means the endpoint understood and rejected the request; retrying
/// won't change that, except for timeouts and throttles.
fn is_permanent_status(status: StatusCode) -> bool {
    status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(is_permanent_status(StatusCode::NOT_FOUND));
        assert!(is_permanent_status(StatusCode::GONE));
        assert!(is_permanent_status(StatusCode::UNAUTHORIZED));
        assert!(!is_permanent_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_permanent_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_permanent_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_permanent_status(StatusCode::BAD_GATEWAY));
        assert!(!is_permanent_status(StatusCode::OK));
    }
}
