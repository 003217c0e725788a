//! Periodic host metrics collection.
//!
//! One loop, one tick: every interval the collector reads CPU, memory,
//! disk and (when present) GPU figures, adds the active stream and
//! transcode counts, persists a single [`MetricSample`] and prunes rows
//! past the retention window. A failed probe zeroes its fields; a failed
//! tick is logged and the loop continues.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::LoopHandle;
use crate::config::MonitorConfig;
use crate::models::MetricSample;
use crate::probe::{gpu, host};
use crate::repository::{MetricsRepository, SessionRepository};

/// Live view of the encoder fleet, implemented by the session manager.
pub trait TranscodeMonitor: Send + Sync {
    fn active_transcodes(&self) -> usize;
}

pub struct MetricsCollector {
    session_repo: Arc<dyn SessionRepository>,
    metrics_repo: Arc<dyn MetricsRepository>,
    transcodes: Arc<dyn TranscodeMonitor>,
    /// Volume whose free space is sampled; first media path, else `/`.
    sample_path: PathBuf,
    interval: Duration,
    retention: chrono::Duration,
}

impl MetricsCollector {
    pub fn new(
        session_repo: Arc<dyn SessionRepository>,
        metrics_repo: Arc<dyn MetricsRepository>,
        transcodes: Arc<dyn TranscodeMonitor>,
        media_paths: &[PathBuf],
        config: &MonitorConfig,
    ) -> Self {
        let sample_path = media_paths
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("/"));

        Self {
            session_repo,
            metrics_repo,
            transcodes,
            sample_path,
            interval: Duration::from_secs(config.collect_interval_seconds),
            retention: chrono::Duration::days(config.retention_days),
        }
    }

    /// Spawn the collection loop.
    pub fn start(self: Arc<Self>) -> LoopHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.tick().await {
                            warn!("metrics collection tick failed: {}", e);
                        }
                    }
                    _ = stop_rx.changed() => {
                        debug!("metrics collector stopping");
                        return;
                    }
                }
            }
        });
        LoopHandle::new(stop_tx, handle)
    }

    async fn tick(&self) -> crate::Result<()> {
        let sample = self.collect_sample().await;
        self.metrics_repo.record(&sample).await?;

        let cutoff = Utc::now() - self.retention;
        match self.metrics_repo.cleanup_older_than(cutoff).await {
            Ok(0) => {}
            Ok(n) => debug!("pruned {} expired metric samples", n),
            Err(e) => warn!("metric sample cleanup failed: {}", e),
        }
        Ok(())
    }

    /// Gather one sample. Individual probe failures are logged and leave
    /// the affected fields zeroed or absent.
    pub async fn collect_sample(&self) -> MetricSample {
        let mut sample = MetricSample::empty(Utc::now());

        match host::read_cpu_percent() {
            Ok(Some(pct)) => sample.cpu_percent = pct,
            Ok(None) => warn!("cpu stat file had no aggregate line"),
            Err(e) => warn!("cpu probe failed: {}", e),
        }

        match host::read_memory() {
            Ok(Some(mem)) => {
                sample.memory_percent = mem.percent;
                sample.memory_used_mb = mem.used_mb;
            }
            Ok(None) => warn!("meminfo file was missing expected fields"),
            Err(e) => warn!("memory probe failed: {}", e),
        }

        match host::disk_usage(&self.sample_path) {
            Ok(disk) => {
                sample.disk_total_gb = disk.total_gb;
                sample.disk_used_gb = disk.used_gb;
                sample.disk_free_gb = disk.free_gb;
            }
            Err(e) => warn!(path = %self.sample_path.display(), "disk probe failed: {}", e),
        }

        if let Some(gpu) = gpu::nvidia_smi_snapshot().await {
            sample.gpu_encoder_percent = Some(gpu.encoder_percent);
            sample.gpu_memory_percent = Some(gpu.memory_percent);
            sample.gpu_temp_c = Some(gpu.temperature_c);
        }

        match self.session_repo.count_active_streams().await {
            Ok(n) => sample.active_streams = n,
            Err(e) => warn!("active stream count failed: {}", e),
        }
        sample.active_transcodes = self.transcodes.active_transcodes() as i64;

        crate::metrics::STREAMS_ACTIVE.set(sample.active_streams);
        crate::metrics::TRANSCODES_ACTIVE.set(sample.active_transcodes);

        sample
    }
}
