use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct RenderOptions {
    pub quality: String,
    pub format: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            quality: "high".to_string(),
            format: "mp4".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest {
    pub template_id: String,
    pub modifications: BTreeMap<String, String>,
    pub options: RenderOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderJobState {
    pub id: String,
    pub status: RenderStatus,
    pub url: Option<String>,
    pub error: Option<String>,
}

/// The external rendering provider: submit, poll, and artifact download.
#[async_trait]
pub trait RenderApi: Send + Sync {
    async fn submit(&self, request: &RenderRequest) -> anyhow::Result<RenderJobState>;
    async fn status(&self, render_id: &str) -> anyhow::Result<RenderJobState>;
    async fn download(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

pub struct HttpRenderApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRenderApi {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl RenderApi for HttpRenderApi {
    async fn submit(&self, request: &RenderRequest) -> anyhow::Result<RenderJobState> {
        let url = format!("{}/renders", self.base_url.trim_end_matches('/'));
        let state = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<RenderJobState>()
            .await?;
        Ok(state)
    }

    async fn status(&self, render_id: &str) -> anyhow::Result<RenderJobState> {
        let url = format!(
            "{}/renders/{}",
            self.base_url.trim_end_matches('/'),
            render_id
        );
        let state = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json::<RenderJobState>()
            .await?;
        Ok(state)
    }

    async fn download(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let bytes = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
