use async_trait::async_trait;
use reqwest::StatusCode;

use super::{QuotaStore, RECORD_KEY, decode, encode};
use crate::error::StoreError;
use crate::models::QuotaMap;

// Object store over HTTP: GET/PUT {base}/{store}/rate-limits
#[derive(Debug, Clone)]
pub struct BlobStore {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl BlobStore {
    pub fn new(client: reqwest::Client, base_url: &str, store_name: &str, token: Option<String>) -> Self {
        let url = format!("{}/{}/{}", base_url.trim_end_matches('/'), store_name, RECORD_KEY);
        Self { client, url, token }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    // Copy the unreadable payload to a timestamped key before the next save overwrites it
    async fn quarantine(&self, bytes: axum::body::Bytes) {
        let target = format!("{}.corrupt-{}", self.url, chrono::Utc::now().timestamp_millis());
        let result = self.authorize(self.client.put(&target)).body(bytes).send().await;
        match result {
            Ok(res) if res.status().is_success() => {
                tracing::warn!(key = %target, "copied corrupt rate limit blob aside")
            }
            Ok(res) => tracing::error!(status = %res.status(), "could not copy corrupt rate limit blob aside"),
            Err(e) => tracing::error!(error = %e, "could not copy corrupt rate limit blob aside"),
        }
    }
}

#[async_trait]
impl QuotaStore for BlobStore {
    fn name(&self) -> &'static str {
        "blob"
    }

    async fn load(&self) -> Result<QuotaMap, StoreError> {
        let res = self.authorize(self.client.get(&self.url)).send().await?;

        if res.status() == StatusCode::NOT_FOUND {
            tracing::info!("no rate limit data found in blob store");
            return Ok(QuotaMap::new());
        }
        if !res.status().is_success() {
            return Err(StoreError::Status(res.status().as_u16()));
        }

        let bytes = res.bytes().await?;
        tracing::debug!(payload = %String::from_utf8_lossy(&bytes), "loaded rate limit data");
        match decode(&bytes) {
            Ok(quotas) => Ok(quotas),
            Err(e) => {
                tracing::error!(error = %e, "rate limit blob is unreadable");
                self.quarantine(bytes).await;
                Ok(QuotaMap::new())
            }
        }
    }

    async fn save(&self, quotas: &QuotaMap) -> Result<(), StoreError> {
        let res = self
            .authorize(self.client.put(&self.url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(encode(quotas)?)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(StoreError::Status(res.status().as_u16()));
        }
        Ok(())
    }
}
