use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One host-resource sample taken by the metrics collector.
///
/// Append-only; rows older than the retention window are pruned by the
/// collector on each tick. GPU fields are absent when `nvidia-smi` is not
/// installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub taken_at: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_mb: f64,
    pub gpu_encoder_percent: Option<f64>,
    pub gpu_memory_percent: Option<f64>,
    pub gpu_temp_c: Option<f64>,
    pub disk_total_gb: f64,
    pub disk_used_gb: f64,
    pub disk_free_gb: f64,
    pub active_streams: i64,
    pub active_transcodes: i64,
}

impl MetricSample {
    /// A zeroed sample for the given instant. Probe failures leave the
    /// affected fields at these values rather than aborting the tick.
    #[must_use]
    pub fn empty(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            cpu_percent: 0.0,
            memory_percent: 0.0,
            memory_used_mb: 0.0,
            gpu_encoder_percent: None,
            gpu_memory_percent: None,
            gpu_temp_c: None,
            disk_total_gb: 0.0,
            disk_used_gb: 0.0,
            disk_free_gb: 0.0,
            active_streams: 0,
            active_transcodes: 0,
        }
    }
}
