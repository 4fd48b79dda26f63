use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

// Prometheus metrics (default registry)
pub static FALLBACK_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "cluster_maintenance_fallback_total",
        "Gate operations answered by the local fallback because shared storage failed",
        &["operation"]
    )
    .expect("register fallback_total")
});

pub static BLOCKED_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "cluster_maintenance_blocked_requests_total",
        "Requests rejected because maintenance mode is on"
    )
    .expect("register blocked_requests_total")
});
