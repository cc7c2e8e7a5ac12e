use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, StoreKind};
use crate::error::ConfigError;
use crate::identity::IdentityScheme;
use crate::rate_limit::RateLimiter;
use crate::store::{BlobStore, FileStore, MemoryStore, QuotaStore};
use crate::upstream::Upstream;
use crate::verify::Verifier;

// app's shared state
pub struct AppState {
    pub limiter: RateLimiter,
    pub upstream: Option<Upstream>, // None when no API key is configured
    pub verifier: Option<Verifier>,
    pub identity: IdentityScheme,
    pub local_dev_bypass: bool,
    pub client_count_mode: bool, // counts come from the caller, see rate_limit::untrusted_client_count
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.store_timeout)
            .build()?;
        let store = build_store(config, client.clone())?;
        Self::with_store(config, store, clock)
    }

    /// Same as [`AppState::with_clock`] but with a caller-provided quota store.
    pub fn with_store(
        config: &Config,
        store: Arc<dyn QuotaStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let upstream_client = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()?;

        let upstream = config
            .api_key
            .clone()
            .map(|key| Upstream::new(upstream_client.clone(), &config.upstream_url, key));
        if upstream.is_none() {
            tracing::warn!("no upstream API key configured, completion requests will fail");
        }

        let verifier = config.recaptcha_secret.clone().map(|secret| {
            Verifier::new(
                upstream_client.clone(),
                config.recaptcha_url.clone(),
                secret,
                config.recaptcha_threshold,
            )
        });

        Ok(Self {
            limiter: RateLimiter::new(store, config.rate_limit, config.rate_window, config.store_timeout),
            upstream,
            verifier,
            identity: config.identity,
            local_dev_bypass: config.local_dev_bypass,
            client_count_mode: config.store == StoreKind::ClientHeader,
            clock,
        })
    }
}

fn build_store(config: &Config, client: reqwest::Client) -> Result<Arc<dyn QuotaStore>, ConfigError> {
    let store: Arc<dyn QuotaStore> = match config.store {
        StoreKind::File => Arc::new(FileStore::new(config.store_path.clone())),
        StoreKind::Blob => {
            let url = config.blob_url.as_deref().ok_or(ConfigError::MissingBlobUrl)?;
            Arc::new(BlobStore::new(client, url, &config.store_name, config.blob_token.clone()))
        }
        // the client-header mode never touches the store
        StoreKind::Memory | StoreKind::ClientHeader => Arc::new(MemoryStore::new()),
    };
    tracing::info!(store = store.name(), "rate limit store selected");
    Ok(store)
}
