use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{rate_limit_headers, reported_count};
use crate::identity::{client_id, client_ip, is_local_dev};
use crate::models::{RateLimitResult, RateLimitStatus};
use crate::rate_limit::untrusted_client_status;
use crate::state::AppState;

// Read-only quota report, never consumes a unit
pub async fn status_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let now = state.clock.now();
    let limiter = &state.limiter;

    let quota = if state.local_dev_bypass && is_local_dev(&client_ip(&headers)) {
        RateLimitResult {
            allowed: true,
            remaining: limiter.limit(),
            reset_time: now + limiter.window(),
            total: limiter.limit(),
        }
    } else if state.client_count_mode {
        untrusted_client_status(reported_count(&headers), limiter.limit(), limiter.window(), now)
    } else {
        limiter.peek(&client_id(state.identity, &headers), now).await
    };

    (
        rate_limit_headers(&quota),
        [(header::CACHE_CONTROL, "no-store")],
        Json(RateLimitStatus::from(&quota)),
    )
        .into_response()
}
