use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{QuotaStore, decode, encode};
use crate::error::StoreError;
use crate::models::QuotaMap;

/// JSON file on local disk.
///
/// Each write goes to its own temp file in the same directory and is renamed
/// into place, so neither a crash nor a concurrent writer can leave a torn
/// document behind. An unparsable file is moved aside to
/// `<path>.corrupt-<unix millis>` and the store starts over empty.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    async fn quarantine(&self) {
        let target = self.sibling(&format!(".corrupt-{}", chrono::Utc::now().timestamp_millis()));
        match fs::rename(&self.path, &target).await {
            Ok(()) => tracing::warn!(path = %target.display(), "moved corrupt rate limit store aside"),
            Err(e) => tracing::error!(error = %e, "could not move corrupt rate limit store aside"),
        }
    }
}

#[async_trait]
impl QuotaStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<QuotaMap, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no rate limit store on disk yet");
                return Ok(QuotaMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        match decode(&bytes) {
            Ok(quotas) => Ok(quotas),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "rate limit store is unreadable");
                self.quarantine().await;
                Ok(QuotaMap::new())
            }
        }
    }

    async fn save(&self, quotas: &QuotaMap) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await?;

        let bytes = encode(quotas)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".rate-limit-")
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(())
    }
}
