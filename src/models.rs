use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Usage counter for one client identity, persisted as {"count": n, "resetTime": millis}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub count: u32,
    #[serde(rename = "resetTime", with = "chrono::serde::ts_milliseconds")]
    pub window_reset_at: DateTime<Utc>,
}

impl QuotaRecord {
    pub fn fresh(now: DateTime<Utc>, window: chrono::Duration) -> Self {
        Self {
            count: 1,
            window_reset_at: now + window,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.window_reset_at < now
    }
}

// The whole persisted document: client id -> record.
// Ordered so that serializing the same mapping always yields the same bytes.
pub type QuotaMap = BTreeMap<String, QuotaRecord>;

/// Outcome of one admission decision. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
    pub total: u32,
}

impl RateLimitResult {
    pub fn used(&self) -> u32 {
        self.total.saturating_sub(self.remaining)
    }
}

// Status endpoint body, mirrors the X-RateLimit-* headers
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset: String,
    pub used: u32,
}

impl From<&RateLimitResult> for RateLimitStatus {
    fn from(result: &RateLimitResult) -> Self {
        Self {
            limit: result.total,
            remaining: result.remaining,
            reset: crate::rate_limit::format_reset(result.reset_time),
            used: result.used(),
        }
    }
}

// Error body returned on every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
