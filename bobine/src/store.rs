//! In-memory collaborator store for standalone operation.
//!
//! The delivery core talks to persistence through the repository traits;
//! this store backs them with process memory so the server runs without a
//! database. A deployment with the full relational layer swaps this out
//! at construction time.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use bobine_core::models::{
    AlertLogEntry, AlertRule, AssetId, ChannelId, DailyStat, LibraryItem, MediaAsset, MediaLibrary,
    MetricSample, NotificationChannel, RuleId,
};
use bobine_core::repository::{
    AlertRepository, AssetCatalog, ChannelRepository, MediaDirectory, MetricsRepository,
    SessionRepository, StatsRepository,
};
use bobine_core::Result;

const LIBRARY_ID: &str = "library-main";

#[derive(Default)]
pub struct MemoryStore {
    assets: Mutex<HashMap<AssetId, MediaAsset>>,
    samples: Mutex<Vec<MetricSample>>,
    rules: Mutex<Vec<AlertRule>>,
    channels: Mutex<HashMap<ChannelId, NotificationChannel>>,
    alert_log: Mutex<Vec<AlertLogEntry>>,
    daily: Mutex<HashMap<NaiveDate, DailyStat>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_asset(&self, asset: MediaAsset) {
        self.assets.lock().insert(asset.id.clone(), asset);
    }

    pub fn insert_rule(&self, rule: AlertRule) {
        self.rules.lock().push(rule);
    }

    pub fn insert_channel(&self, channel: NotificationChannel) {
        self.channels.lock().insert(channel.id.clone(), channel);
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn count_active_streams(&self) -> Result<i64> {
        Ok(0)
    }

    async fn count_recent_transcode_failures(&self, _window: Duration) -> Result<i64> {
        Ok(0)
    }

    async fn count_recent_stream_errors(&self, _window: Duration) -> Result<i64> {
        Ok(0)
    }
}

#[async_trait]
impl MetricsRepository for MemoryStore {
    async fn record(&self, sample: &MetricSample) -> Result<()> {
        self.samples.lock().push(sample.clone());
        Ok(())
    }

    async fn latest(&self) -> Result<Option<MetricSample>> {
        Ok(self.samples.lock().last().cloned())
    }

    async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut samples = self.samples.lock();
        let before = samples.len();
        samples.retain(|s| s.taken_at >= cutoff);
        Ok((before - samples.len()) as u64)
    }
}

#[async_trait]
impl AlertRepository for MemoryStore {
    async fn list_enabled_rules(&self) -> Result<Vec<AlertRule>> {
        Ok(self.rules.lock().iter().filter(|r| r.enabled).cloned().collect())
    }

    async fn update_last_triggered(&self, rule_id: &RuleId, at: DateTime<Utc>) -> Result<()> {
        let mut rules = self.rules.lock();
        for rule in rules.iter_mut() {
            if &rule.id == rule_id {
                rule.last_triggered = Some(at);
            }
        }
        Ok(())
    }

    async fn log_alert(&self, entry: &AlertLogEntry) -> Result<()> {
        self.alert_log.lock().push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl ChannelRepository for MemoryStore {
    async fn get_channel(&self, id: &ChannelId) -> Result<Option<NotificationChannel>> {
        Ok(self.channels.lock().get(id).cloned())
    }
}

#[async_trait]
impl StatsRepository for MemoryStore {
    async fn compute_daily_rollup(&self, day: NaiveDate) -> Result<DailyStat> {
        // No session history in memory; the rollup is an empty row.
        Ok(DailyStat {
            day,
            total_play_secs: 0,
            session_count: 0,
            transcode_count: 0,
            transcode_failures: 0,
            unique_users: 0,
        })
    }

    async fn upsert_daily_stat(&self, row: &DailyStat) -> Result<()> {
        self.daily.lock().insert(row.day, row.clone());
        Ok(())
    }
}

#[async_trait]
impl AssetCatalog for MemoryStore {
    async fn get_asset(&self, id: &AssetId) -> Result<Option<MediaAsset>> {
        Ok(self.assets.lock().get(id).cloned())
    }
}

#[async_trait]
impl MediaDirectory for MemoryStore {
    async fn get_libraries(&self) -> Result<Vec<MediaLibrary>> {
        let count = self.assets.lock().len() as i64;
        Ok(vec![MediaLibrary {
            id: LIBRARY_ID.to_string(),
            title: "Library".to_string(),
            item_count: count,
        }])
    }

    async fn get_library_items(&self, library_id: &str) -> Result<Vec<LibraryItem>> {
        if library_id != LIBRARY_ID {
            return Ok(Vec::new());
        }

        let assets = self.assets.lock();
        Ok(assets
            .values()
            .map(|asset| {
                let size_bytes = std::fs::metadata(&asset.path).map(|m| m.len()).unwrap_or(0);
                let title = asset
                    .path
                    .file_stem()
                    .map_or_else(|| asset.id.to_string(), |s| s.to_string_lossy().into_owned());
                LibraryItem {
                    asset_id: asset.id.clone(),
                    library_id: library_id.to_string(),
                    title,
                    mime_type: mime_for(asset),
                    duration_secs: asset.duration_secs,
                    width: asset.width,
                    height: asset.height,
                    size_bytes,
                }
            })
            .collect())
    }
}

fn mime_for(asset: &MediaAsset) -> String {
    mime_guess::from_path(&asset.path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}
