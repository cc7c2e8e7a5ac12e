mod health;
mod metrics;
mod proxy;
mod status;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use proxy::proxy_handler;
pub use status::status_handler;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::models::RateLimitResult;
use crate::rate_limit::format_reset;

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");
pub const USED_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-used");

// Caller-reported running count, only read in client-header mode
pub const CLIENT_COUNT_HEADER: &str = "x-client-call-count";

pub fn rate_limit_headers(result: &RateLimitResult) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(LIMIT_HEADER, HeaderValue::from(result.total));
    headers.insert(REMAINING_HEADER, HeaderValue::from(result.remaining));
    if let Ok(reset) = HeaderValue::from_str(&format_reset(result.reset_time)) {
        headers.insert(RESET_HEADER, reset);
    }
    headers.insert(USED_HEADER, HeaderValue::from(result.used()));
    headers
}

fn reported_count(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(CLIENT_COUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
