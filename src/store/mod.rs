//! Durable persistence of the whole quota document.
//!
//! Every backend stores one named record holding the serialized [`QuotaMap`].
//! The rate limiter reads the full document, mutates it and writes it back;
//! there is no compare-and-swap, so concurrent writers can lose increments.

mod blob;
mod file;
mod memory;

pub use blob::BlobStore;
pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::metrics::STORE_FAILURES;
use crate::models::QuotaMap;

/// Key of the single record holding the serialized mapping.
pub const RECORD_KEY: &str = "rate-limits";

#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Reads the whole mapping. A store that has never been written yields an empty map.
    async fn load(&self) -> Result<QuotaMap, StoreError>;

    /// Overwrites the whole mapping.
    async fn save(&self, quotas: &QuotaMap) -> Result<(), StoreError>;

    /// Permissive read: any failure is logged and an empty mapping returned.
    async fn load_or_empty(&self) -> QuotaMap {
        match self.load().await {
            Ok(quotas) => quotas,
            Err(e) => {
                STORE_FAILURES.inc();
                tracing::error!(store = self.name(), error = %e, "failed to load rate limit store");
                QuotaMap::new()
            }
        }
    }

    /// Permissive write: failures are logged and swallowed.
    async fn save_logged(&self, quotas: &QuotaMap) {
        match self.save(quotas).await {
            Ok(()) => tracing::debug!(store = self.name(), entries = quotas.len(), "rate limit data saved"),
            Err(e) => {
                STORE_FAILURES.inc();
                tracing::error!(store = self.name(), error = %e, "failed to save rate limit store");
            }
        }
    }
}

pub(crate) fn decode(bytes: &[u8]) -> Result<QuotaMap, StoreError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(QuotaMap::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}

pub(crate) fn encode(quotas: &QuotaMap) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(quotas)?)
}
