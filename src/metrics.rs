use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, register_counter, register_histogram};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("proxy_requests_total", "Total number of completion requests").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("proxy_rate_limited_total", "Requests rejected with 429").unwrap();
    pub static ref UPSTREAM_FAILURES: Counter =
        register_counter!("proxy_upstream_failures_total", "Failed upstream completion calls").unwrap();
    pub static ref STORE_FAILURES: Counter =
        register_counter!("proxy_store_failures_total", "Quota store load/save failures").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "proxy_request_latency_seconds",
        "Completion request latency in seconds"
    )
    .unwrap();
}
