use crate::integrations::events::ProgressBroadcaster;
use crate::integrations::storage::ObjectStore;
use crate::jobs::handler::{JobError, Outcome};
use crate::jobs::producers::{EmailJobPayload, Producers, RenderJobPayload};
use crate::render::client::{RenderApi, RenderRequest, RenderStatus};
use crate::render::executions::ExecutionsRepo;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_POLLS: u32 = 60;

/// Progress percent while polling: linear ramp from 30 to 70 across the
/// configured poll budget.
pub fn poll_progress_percent(poll_no: u32, max_polls: u32) -> u8 {
    let max_polls = max_polls.max(1);
    let pct = 30 + (poll_no.min(max_polls) * 40) / max_polls;
    pct.min(70) as u8
}

/// The render worker's job body.
///
/// pending -> processing (submit) -> poll until terminal -> completed
/// (download, store, record, notify) or failed (record error, throw so the
/// queue's retry policy applies).
pub struct RenderOrchestrator {
    api: Arc<dyn RenderApi>,
    store: Arc<dyn ObjectStore>,
    events: Arc<dyn ProgressBroadcaster>,
    executions: ExecutionsRepo,
    producers: Producers,
    poll_interval: Duration,
    max_polls: u32,
}

impl RenderOrchestrator {
    pub fn new(
        api: Arc<dyn RenderApi>,
        store: Arc<dyn ObjectStore>,
        events: Arc<dyn ProgressBroadcaster>,
        executions: ExecutionsRepo,
        producers: Producers,
    ) -> Self {
        Self {
            api,
            store,
            events,
            executions,
            producers,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls.max(1);
        self
    }

    pub async fn run(&self, payload: &RenderJobPayload) -> Result<Outcome, JobError> {
        let execution_id = payload.execution_id;
        let user_id = payload.user_id.as_str();

        self.executions
            .mark_processing(execution_id)
            .await
            .map_err(|e| JobError::new("DEPENDENCY_DOWN", e.to_string()))?;
        self.progress(payload, 10).await;

        let request = RenderRequest {
            template_id: payload.template_id.clone(),
            modifications: payload.assets.clone(),
            options: Default::default(),
        };

        let submitted = match self.api.submit(&request).await {
            Ok(state) => state,
            Err(e) => {
                return self
                    .fail_execution(execution_id, "RENDER_FAILED", &format!("submit failed: {e}"))
                    .await;
            }
        };
        self.progress(payload, 20).await;

        info!(%execution_id, render_id = %submitted.id, "render submitted");
        self.progress(payload, 30).await;

        // Poll to a terminal state, bounded by the attempt cap.
        let mut state = submitted;
        let mut polls: u32 = 0;
        loop {
            match state.status {
                RenderStatus::Completed => break,
                RenderStatus::Failed => {
                    let detail = state
                        .error
                        .unwrap_or_else(|| "render provider reported failure".to_string());
                    return self
                        .fail_execution(execution_id, "RENDER_FAILED", &detail)
                        .await;
                }
                RenderStatus::Pending | RenderStatus::Processing => {
                    if polls >= self.max_polls {
                        let detail = format!(
                            "render {} still {:?} after {} polls",
                            state.id, state.status, polls
                        );
                        return self.fail_execution(execution_id, "TIMEOUT", &detail).await;
                    }
                    tokio::time::sleep(self.poll_interval).await;
                    polls += 1;
                    self.progress(payload, poll_progress_percent(polls, self.max_polls))
                        .await;
                    state = self
                        .api
                        .status(&state.id)
                        .await
                        .map_err(|e| JobError::new("DEPENDENCY_DOWN", e.to_string()))?;
                }
            }
        }

        self.progress(payload, 70).await;

        let Some(remote_url) = state.url.clone() else {
            return self
                .fail_execution(
                    execution_id,
                    "RENDER_FAILED",
                    "render completed without an output url",
                )
                .await;
        };

        let bytes = match self.api.download(&remote_url).await {
            Ok(b) => b,
            Err(e) => {
                return self
                    .fail_execution(
                        execution_id,
                        "RENDER_FAILED",
                        &format!("artifact download failed: {e}"),
                    )
                    .await;
            }
        };
        self.progress(payload, 85).await;

        let filename = format!("render-{execution_id}.{}", request.options.format);
        let metadata = BTreeMap::from([
            ("execution_id".to_string(), execution_id.to_string()),
            ("client_id".to_string(), payload.client_id.clone()),
        ]);

        // Download succeeded but storage failed: distinct terminal error on
        // the execution, and the thrown error lets the queue retry the whole
        // render keyed by the same execution id.
        let stored = match self.store.upload(&bytes, &filename, &metadata).await {
            Ok(s) => s,
            Err(e) => {
                return self
                    .fail_execution(
                        execution_id,
                        "UPLOAD_FAILED",
                        &format!("artifact upload failed: {e}"),
                    )
                    .await;
            }
        };
        self.progress(payload, 95).await;

        self.executions
            .mark_completed(execution_id, &stored.url)
            .await
            .map_err(|e| JobError::new("DEPENDENCY_DOWN", e.to_string()))?;

        // Downstream notification; "not enqueued" (disabled broker) is
        // non-fatal by contract.
        let email = EmailJobPayload {
            to: payload.user_id.clone(),
            subject: "Your render is ready".to_string(),
            template: "render-complete".to_string(),
            data: json!({
                "execution_id": execution_id,
                "output_url": stored.url,
                "client_id": payload.client_id,
            }),
        };
        if let Err(e) = self.producers.enqueue_email(&email).await {
            warn!(%execution_id, error = %e, "completion email enqueue failed");
        }

        self.events
            .broadcast_render_complete(execution_id, &state.id, &stored.url, user_id)
            .await;
        self.progress(payload, 100).await;

        Ok(Outcome::Success(json!({
            "execution_id": execution_id,
            "render_id": state.id,
            "output_url": stored.url,
            "output_key": stored.key,
            "polls": polls,
        })))
    }

    /// Broadcast failures never affect the job outcome.
    async fn progress(&self, payload: &RenderJobPayload, percent: u8) {
        self.events
            .broadcast_render_progress(payload.execution_id, percent, &payload.user_id)
            .await;
    }

    async fn fail_execution(
        &self,
        execution_id: uuid::Uuid,
        code: &'static str,
        detail: &str,
    ) -> Result<Outcome, JobError> {
        if let Err(e) = self.executions.mark_failed(execution_id, detail).await {
            warn!(%execution_id, error = %e, "failed to record execution failure");
        }
        Err(JobError::new(code, detail.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_progress_ramps_linearly_from_30_to_70() {
        assert_eq!(poll_progress_percent(0, 60), 30);
        assert_eq!(poll_progress_percent(30, 60), 50);
        assert_eq!(poll_progress_percent(60, 60), 70);
        // Never exceeds the polling band.
        assert_eq!(poll_progress_percent(120, 60), 70);
    }

    #[test]
    fn poll_progress_handles_tiny_budgets() {
        assert_eq!(poll_progress_percent(0, 1), 30);
        assert_eq!(poll_progress_percent(1, 1), 70);
    }
}
