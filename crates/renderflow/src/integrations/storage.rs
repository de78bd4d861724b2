use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub cdn_url: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        metadata: &BTreeMap<String, String>,
    ) -> anyhow::Result<StoredObject>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Filesystem-backed store for local and single-node deployments.
pub struct LocalDiskStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStore {
    pub fn new(root: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self {
            root,
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalDiskStore {
    async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        _metadata: &BTreeMap<String, String>,
    ) -> anyhow::Result<StoredObject> {
        let key = format!("{}/{}", uuid::Uuid::new_v4(), filename);
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        info!(key = %key, bytes = bytes.len(), "artifact stored");
        Ok(StoredObject {
            url: format!("{}/{}", self.public_base_url.trim_end_matches('/'), key),
            cdn_url: None,
            key,
        })
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let path = self.root.join(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone is fine; cleanup jobs may be retried.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
