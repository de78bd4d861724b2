use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

/// Push notifications to connected clients. Fire-and-forget: implementations
/// must not fail the calling job, so the methods are infallible.
#[async_trait]
pub trait ProgressBroadcaster: Send + Sync {
    async fn broadcast_render_progress(&self, execution_id: Uuid, percent: u8, user_id: &str);

    async fn broadcast_render_complete(
        &self,
        execution_id: Uuid,
        render_id: &str,
        url: &str,
        user_id: &str,
    );
}

pub struct LogBroadcaster;

#[async_trait]
impl ProgressBroadcaster for LogBroadcaster {
    async fn broadcast_render_progress(&self, execution_id: Uuid, percent: u8, user_id: &str) {
        info!(%execution_id, percent, user_id, "render progress");
    }

    async fn broadcast_render_complete(
        &self,
        execution_id: Uuid,
        render_id: &str,
        url: &str,
        user_id: &str,
    ) {
        info!(%execution_id, render_id, url, user_id, "render complete");
    }
}
