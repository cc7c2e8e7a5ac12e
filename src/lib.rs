//! Rate limited proxy in front of a chat completion API.
//!
//! Each client identity gets a fixed number of requests per window. Counters
//! live in a pluggable [`store::QuotaStore`] that is re-read on every request,
//! so any number of independent processes can share one quota.

pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod upstream;
pub mod verify;

use axum::{
    Router,
    routing::{any, get},
};
use std::sync::Arc;

use crate::handlers::{health_handler, metrics_handler, proxy_handler, status_handler};
use crate::state::AppState;

pub const PROXY_PATH: &str = "/api/openai-proxy";
pub const STATUS_PATH: &str = "/api/openai-proxy/rate-limit-status";

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // every method reaches the handler so the limiter runs before the 405
        .route(PROXY_PATH, any(proxy_handler))
        .route(STATUS_PATH, get(status_handler))
        .with_state(state)
}
