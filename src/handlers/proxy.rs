use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;

use super::{rate_limit_headers, reported_count};
use crate::error::ProxyError;
use crate::identity::{client_id, client_ip, is_local_dev};
use crate::metrics::{RATE_LIMITED, REQUEST_LATENCY, REQUEST_TOTAL, UPSTREAM_FAILURES};
use crate::models::{ErrorBody, RateLimitResult};
use crate::rate_limit::{describe_window, format_reset, untrusted_client_count};
use crate::state::AppState;
use crate::verify::{SCORE_HEADER, TOKEN_HEADER, VERIFIED_HEADER, Verification};

// Completion endpoint: admit, validate, forward once, relay
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    REQUEST_TOTAL.inc();
    let timer = REQUEST_LATENCY.start_timer();

    let now = state.clock.now();
    let ip = client_ip(&headers);
    let local_dev = is_local_dev(&ip);

    let quota = if state.local_dev_bypass && local_dev {
        tracing::info!(ip = %ip, "local development detected, bypassing rate limit");
        state.limiter.fresh_result(now)
    } else if state.client_count_mode {
        untrusted_client_count(
            reported_count(&headers),
            state.limiter.limit(),
            state.limiter.window(),
            now,
        )
    } else {
        let client = client_id(state.identity, &headers);
        state.limiter.check(&client, now).await
    };

    if !quota.allowed {
        RATE_LIMITED.inc();
        return rate_limited(&quota, state.limiter.window());
    }

    let response = forward(&state, &method, &headers, &body, &ip, local_dev)
        .await
        .unwrap_or_else(IntoResponse::into_response);
    timer.observe_duration();

    (rate_limit_headers(&quota), response).into_response()
}

fn rate_limited(quota: &RateLimitResult, window: chrono::Duration) -> Response {
    let reset = format_reset(quota.reset_time);
    let body = ErrorBody {
        error: "Rate limit exceeded".to_string(),
        message: Some(format!(
            "You have exceeded the rate limit of {} requests per {}. Please try again after {}.",
            quota.total,
            describe_window(window),
            reset
        )),
    };
    (StatusCode::TOO_MANY_REQUESTS, rate_limit_headers(quota), Json(body)).into_response()
}

async fn forward(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
    ip: &str,
    local_dev: bool,
) -> Result<Response, ProxyError> {
    if *method != Method::POST {
        return Err(ProxyError::MethodNotAllowed);
    }
    let upstream = state.upstream.as_ref().ok_or(ProxyError::CredentialMissing)?;
    let payload = parse_payload(body)?;

    let verification = verify(state, headers, ip, local_dev).await;
    let verification_headers = verification_headers(&verification);

    match upstream.chat_completion(&payload).await {
        Ok(completion) => Ok((
            verification_headers,
            [(header::CONTENT_TYPE, "application/json")],
            completion,
        )
            .into_response()),
        Err(e) => {
            UPSTREAM_FAILURES.inc();
            tracing::error!(error = %e, "error proxying request upstream");
            Ok((verification_headers, ProxyError::from(e)).into_response())
        }
    }
}

/// Parse the inbound body and check it carries `model` and a `messages` array.
/// The whole object is forwarded, so any extra parameters pass through.
pub fn parse_payload(body: &[u8]) -> Result<Value, ProxyError> {
    let payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body)
            .map_err(|e| ProxyError::MalformedRequest(format!("Invalid JSON body: {}", e)))?
    };

    if !payload.get("model").is_some_and(is_truthy) || payload.get("messages").is_none() {
        return Err(ProxyError::MalformedRequest(
            "Invalid request. 'model' and 'messages' are required.".to_string(),
        ));
    }
    if !payload["messages"].is_array() {
        return Err(ProxyError::MalformedRequest(
            "Invalid request. 'messages' must be an array.".to_string(),
        ));
    }
    Ok(payload)
}

// Presence check on `model`: null, false, 0 and "" count as missing, anything else is forwarded
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

async fn verify(state: &AppState, headers: &HeaderMap, ip: &str, local_dev: bool) -> Verification {
    let Some(verifier) = &state.verifier else {
        return Verification::Skipped;
    };
    if local_dev {
        return Verification::Skipped;
    }
    let token = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.is_empty());
    match token {
        Some(token) => verifier.verify(token, ip).await,
        None => {
            tracing::debug!("no verification token supplied");
            Verification::Skipped
        }
    }
}

fn verification_headers(verification: &Verification) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&verification.to_string()) {
        headers.insert(VERIFIED_HEADER, value);
    }
    if let Some(score) = verification.score() {
        if let Ok(value) = HeaderValue::from_str(&score.to_string()) {
            headers.insert(SCORE_HEADER, value);
        }
    }
    headers
}
