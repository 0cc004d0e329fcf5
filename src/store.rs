use crate::models::TrackedItem;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Persistence seam for the tracked-item collection. Loaded once at startup;
/// every save rewrites the full collection. Callers serialize writes.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn load(&self) -> Result<Vec<TrackedItem>>;
    async fn save(&self, items: &[TrackedItem]) -> Result<()>;
}

/// Stores the collection as one pretty-printed JSON array on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ItemStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<TrackedItem>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            // Missing file means nothing tracked yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        // A file that exists but does not parse is an error: the next save
        // would overwrite whatever it held
        let items = serde_json::from_str(&raw)?;
        Ok(items)
    }

    async fn save(&self, items: &[TrackedItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_string_pretty(items)?;
        fs::write(&self.path, raw).await?;
        Ok(())
    }
}
