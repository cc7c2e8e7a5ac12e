use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::identity::IdentityScheme;

pub const DEFAULT_RECAPTCHA_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

// Where quota counters live
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Memory,
    File,
    Blob,
    // trust the X-Client-Call-Count header, no server-side state
    ClientHeader,
}

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "openai-proxy-gateway")]
#[command(about = "Rate limited proxy for chat completion APIs")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8888)]
    pub port: u16,

    // Upstream API base url
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com")]
    pub upstream_url: String,

    // Upstream API key, never sent back to callers
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    // Max requests per window per client
    #[arg(long, env = "RATE_LIMIT", default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..))]
    pub rate_limit: u32,

    // Window length in seconds (default one day)
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 86_400, value_parser = clap::value_parser!(u64).range(1..=31_536_000))]
    pub rate_window: u64,

    #[arg(long, env = "RATE_LIMIT_STORE", value_enum, default_value_t = StoreKind::File)]
    pub store: StoreKind,

    // File store location, defaults to <tmp>/rate-limit-store.json
    #[arg(long, env = "RATE_LIMIT_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    // Blob store base url, required for --store blob
    #[arg(long, env = "BLOB_STORE_URL")]
    pub blob_url: Option<String>,

    #[arg(long, env = "BLOB_STORE_TOKEN", hide_env_values = true)]
    pub blob_token: Option<String>,

    #[arg(long, env = "BLOB_STORE_NAME", default_value = "rate-limits")]
    pub store_name: String,

    #[arg(long, env = "RATE_LIMIT_IDENTITY", value_enum, default_value_t = IdentityScheme::Ip)]
    pub identity: IdentityScheme,

    // Let loopback / 192.168.* callers skip the limiter
    #[arg(long, env = "LOCAL_DEV_BYPASS")]
    pub local_dev_bypass: bool,

    #[arg(long, env = "RECAPTCHA_SECRET_KEY", hide_env_values = true)]
    pub recaptcha_secret: Option<String>,

    #[arg(long, env = "RECAPTCHA_THRESHOLD", default_value_t = 0.5)]
    pub recaptcha_threshold: f64,

    #[arg(long, env = "RECAPTCHA_VERIFY_URL", default_value = DEFAULT_RECAPTCHA_URL)]
    pub recaptcha_url: String,

    // Timeout for each store load/save
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 2_000)]
    pub store_timeout_ms: u64,

    // Timeout for the upstream completion call
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 60)]
    pub upstream_timeout_secs: u64,
}

/// Runtime settings consumed by the router.
#[derive(Debug, Clone)]
pub struct Config {
    pub upstream_url: String,
    pub api_key: Option<String>,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub store: StoreKind,
    pub store_path: PathBuf,
    pub blob_url: Option<String>,
    pub blob_token: Option<String>,
    pub store_name: String,
    pub identity: IdentityScheme,
    pub local_dev_bypass: bool,
    pub recaptcha_secret: Option<String>,
    pub recaptcha_threshold: f64,
    pub recaptcha_url: String,
    pub store_timeout: Duration,
    pub upstream_timeout: Duration,
}

pub fn default_store_path() -> PathBuf {
    std::env::temp_dir().join("rate-limit-store.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: "https://api.openai.com".to_string(),
            api_key: None,
            rate_limit: 20,
            rate_window: Duration::from_secs(24 * 60 * 60),
            store: StoreKind::File,
            store_path: default_store_path(),
            blob_url: None,
            blob_token: None,
            store_name: "rate-limits".to_string(),
            identity: IdentityScheme::Ip,
            local_dev_bypass: false,
            recaptcha_secret: None,
            recaptcha_threshold: 0.5,
            recaptcha_url: DEFAULT_RECAPTCHA_URL.to_string(),
            store_timeout: Duration::from_millis(2_000),
            upstream_timeout: Duration::from_secs(60),
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            upstream_url: args.upstream_url,
            // an empty variable counts as unset
            api_key: args.api_key.filter(|k| !k.trim().is_empty()),
            rate_limit: args.rate_limit,
            rate_window: Duration::from_secs(args.rate_window),
            store: args.store,
            store_path: args.store_path.unwrap_or_else(default_store_path),
            blob_url: args.blob_url,
            blob_token: args.blob_token,
            store_name: args.store_name,
            identity: args.identity,
            local_dev_bypass: args.local_dev_bypass,
            recaptcha_secret: args.recaptcha_secret.filter(|s| !s.trim().is_empty()),
            recaptcha_threshold: args.recaptcha_threshold,
            recaptcha_url: args.recaptcha_url,
            store_timeout: Duration::from_millis(args.store_timeout_ms),
            upstream_timeout: Duration::from_secs(args.upstream_timeout_secs),
        }
    }
}
