//! Prometheus metrics for the delivery core.
//!
//! Exposed via the `/metrics` endpoint for scraping. These are process-level
//! gauges; the historical `MetricSample` rows the collector persists are a
//! separate concern.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Number of active playback streams (direct + remux + HLS).
pub static STREAMS_ACTIVE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "streams_active",
        "Number of currently active playback streams",
        REGISTRY.clone()
    )
    .expect("Failed to register STREAMS_ACTIVE")
});

/// Number of live encoder sessions.
pub static TRANSCODES_ACTIVE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "transcodes_active",
        "Number of currently running encoder sessions",
        REGISTRY.clone()
    )
    .expect("Failed to register TRANSCODES_ACTIVE")
});

/// Encoder children that exited non-zero.
pub static TRANSCODE_FAILURES_TOTAL: std::sync::LazyLock<IntCounter> =
    std::sync::LazyLock::new(|| {
        register_int_counter_with_registry!(
            "transcode_failures_total",
            "Total number of encoder sessions that exited with an error",
            REGISTRY.clone()
        )
        .expect("Failed to register TRANSCODE_FAILURES_TOTAL")
    });

/// Expose metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Failed to encode metrics\n");
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Metrics buffer contains invalid UTF-8: {}", e);
        String::from("# Invalid UTF-8 in metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        TRANSCODES_ACTIVE.set(2);
        TRANSCODE_FAILURES_TOTAL.inc();

        let output = gather_metrics();
        assert!(output.contains("transcodes_active"));
        assert!(output.contains("transcode_failures_total"));
    }
}
