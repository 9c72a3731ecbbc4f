use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref ANALYZE_REQUESTS: Counter =
        register_counter!("namewise_analyze_requests_total", "Total number of analyze requests").unwrap();
    pub static ref TTS_REQUESTS: Counter =
        register_counter!("namewise_tts_requests_total", "Total number of tts requests").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("namewise_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref UPSTREAM_FAILURES: Counter =
        register_counter!("namewise_upstream_failures_total", "Failed inference or speech calls").unwrap();
    pub static ref ANALYTICS_FAILURES: Counter =
        register_counter!("namewise_analytics_failures_total", "Analytics events that were dropped").unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "namewise_upstream_latency_seconds",
        "Inference and speech call latency in seconds"
    )
    .unwrap();
    pub static ref RATE_LIMIT_ENTRIES: Gauge =
        register_gauge!("namewise_rate_limit_entries", "Live entries in the rate limit map").unwrap();
}
