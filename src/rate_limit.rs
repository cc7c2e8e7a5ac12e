//! Fixed-window admission over a whole-document quota store.
//!
//! Every decision re-reads the store, prunes expired windows, evaluates the
//! caller's record and writes the document back when it changed. Nothing is
//! kept in process memory between calls.

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::metrics::STORE_FAILURES;
use crate::models::{QuotaMap, QuotaRecord, RateLimitResult};
use crate::store::QuotaStore;

pub struct RateLimiter {
    store: Arc<dyn QuotaStore>,
    limit: u32,
    window: chrono::Duration,
    store_timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn QuotaStore>, limit: u32, window: Duration, store_timeout: Duration) -> Self {
        Self {
            store,
            limit,
            window: chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(365)),
            store_timeout,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Result handed out when the store cannot be consulted, and for bypassed callers.
    pub fn fresh_result(&self, now: DateTime<Utc>) -> RateLimitResult {
        RateLimitResult {
            allowed: true,
            remaining: self.limit.saturating_sub(1),
            reset_time: now + self.window,
            total: self.limit,
        }
    }

    /// Consume one unit for `client_id` if its window has room.
    ///
    /// Never fails: if the store cannot be read the request is admitted and
    /// nothing is written, so a transient outage cannot wipe other clients' counters.
    pub async fn check(&self, client_id: &str, now: DateTime<Utc>) -> RateLimitResult {
        let mut quotas = match self.load().await {
            Ok(quotas) => quotas,
            Err(e) => {
                STORE_FAILURES.inc();
                tracing::warn!(client = client_id, error = %e, "rate limit store unavailable, failing open");
                return self.fresh_result(now);
            }
        };

        let pruned = prune_expired(&mut quotas, now);
        if pruned > 0 {
            tracing::debug!(pruned, "removed expired rate limit entries");
            self.save(&quotas).await;
        }

        let (result, changed) = admit(&mut quotas, client_id, now, self.limit, self.window);
        if changed {
            self.save(&quotas).await;
        }
        if !result.allowed {
            tracing::info!(client = client_id, reset = %format_reset(result.reset_time), "rate limit exceeded");
        }
        result
    }

    /// Current usage for `client_id` without consuming a unit or writing anything.
    pub async fn peek(&self, client_id: &str, now: DateTime<Utc>) -> RateLimitResult {
        let quotas = tokio::time::timeout(self.store_timeout, self.store.load_or_empty())
            .await
            .unwrap_or_else(|_| {
                STORE_FAILURES.inc();
                tracing::warn!(client = client_id, "rate limit store timed out for status");
                QuotaMap::new()
            });

        match quotas.get(client_id) {
            Some(record) if !record.is_expired(now) => RateLimitResult {
                allowed: record.count < self.limit,
                remaining: self.limit.saturating_sub(record.count),
                reset_time: record.window_reset_at,
                total: self.limit,
            },
            _ => RateLimitResult {
                allowed: true,
                remaining: self.limit,
                reset_time: now + self.window,
                total: self.limit,
            },
        }
    }

    async fn load(&self) -> Result<QuotaMap, StoreError> {
        tokio::time::timeout(self.store_timeout, self.store.load())
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))?
    }

    async fn save(&self, quotas: &QuotaMap) {
        let saved = tokio::time::timeout(self.store_timeout, self.store.save_logged(quotas)).await;
        if saved.is_err() {
            STORE_FAILURES.inc();
            tracing::error!(store = self.store.name(), timeout = ?self.store_timeout, "timed out saving rate limit store");
        }
    }
}

/// Drop every record whose window has already ended. Returns how many were removed.
pub fn prune_expired(quotas: &mut QuotaMap, now: DateTime<Utc>) -> usize {
    let before = quotas.len();
    quotas.retain(|_, record| !record.is_expired(now));
    before - quotas.len()
}

/// Admission decision for one client. The flag reports whether `quotas` was modified.
pub fn admit(
    quotas: &mut QuotaMap,
    client_id: &str,
    now: DateTime<Utc>,
    limit: u32,
    window: chrono::Duration,
) -> (RateLimitResult, bool) {
    match quotas.get_mut(client_id) {
        Some(record) if !record.is_expired(now) => {
            if record.count >= limit {
                let result = RateLimitResult {
                    allowed: false,
                    remaining: 0,
                    reset_time: record.window_reset_at,
                    total: limit,
                };
                return (result, false);
            }

            record.count += 1;
            let result = RateLimitResult {
                allowed: true,
                remaining: limit - record.count,
                reset_time: record.window_reset_at,
                total: limit,
            };
            (result, true)
        }
        // absent or expired: first touch of a new window is always admitted
        _ => {
            let record = QuotaRecord::fresh(now, window);
            let result = RateLimitResult {
                allowed: true,
                remaining: limit.saturating_sub(1),
                reset_time: record.window_reset_at,
                total: limit,
            };
            quotas.insert(client_id.to_string(), record);
            (result, true)
        }
    }
}

/// Advisory result computed from a count the caller reports about itself.
///
/// Untrusted: a client resets its own quota by omitting the header. Only used
/// when the deployment explicitly opts into header-reported counts.
pub fn untrusted_client_count(
    reported: Option<u32>,
    limit: u32,
    window: chrono::Duration,
    now: DateTime<Utc>,
) -> RateLimitResult {
    let previous = reported.unwrap_or(0);
    if previous >= limit {
        return RateLimitResult {
            allowed: false,
            remaining: 0,
            reset_time: now + window,
            total: limit,
        };
    }
    RateLimitResult {
        allowed: true,
        remaining: limit - previous - 1,
        reset_time: now + window,
        total: limit,
    }
}

// Status view of a caller-reported count, nothing consumed
pub fn untrusted_client_status(
    reported: Option<u32>,
    limit: u32,
    window: chrono::Duration,
    now: DateTime<Utc>,
) -> RateLimitResult {
    let used = reported.unwrap_or(0).min(limit);
    RateLimitResult {
        allowed: used < limit,
        remaining: limit - used,
        reset_time: now + window,
        total: limit,
    }
}

// ISO-8601 with millisecond precision and a trailing Z
pub fn format_reset(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// "day" for 24h windows, used in the 429 message
pub fn describe_window(window: chrono::Duration) -> String {
    let secs = window.num_seconds();
    match secs {
        86_400 => "day".to_string(),
        3_600 => "hour".to_string(),
        60 => "minute".to_string(),
        s if s > 0 && s % 86_400 == 0 => format!("{} days", s / 86_400),
        s if s > 0 && s % 3_600 == 0 => format!("{} hours", s / 3_600),
        s => format!("{} seconds", s),
    }
}
