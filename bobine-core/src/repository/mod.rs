//! Collaborator traits for the persistence layer.
//!
//! The relational store (schema, queries, pooling) lives outside the
//! delivery core; these traits are the seam it plugs into. Implementations
//! must be cheap to clone behind an `Arc` and safe to call concurrently.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

use crate::models::{
    AlertLogEntry, AlertRule, AssetId, ChannelId, DailyStat, LibraryItem, MediaAsset, MediaLibrary,
    MetricSample, NotificationChannel, RuleId,
};
use crate::Result;

/// Playback-session bookkeeping used by the monitoring loops.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Sessions currently marked active.
    async fn count_active_streams(&self) -> Result<i64>;

    /// Encoder sessions that ended in error within the window.
    async fn count_recent_transcode_failures(&self, window: Duration) -> Result<i64>;

    /// Sessions started within the window that went inactive in under 10 s.
    async fn count_recent_stream_errors(&self, window: Duration) -> Result<i64>;
}

/// Historical host metric storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsRepository: Send + Sync {
    async fn record(&self, sample: &MetricSample) -> Result<()>;

    async fn latest(&self) -> Result<Option<MetricSample>>;

    /// Delete samples older than the cutoff; returns rows removed.
    async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Alert rule storage and delivery audit log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn list_enabled_rules(&self) -> Result<Vec<AlertRule>>;

    async fn update_last_triggered(&self, rule_id: &RuleId, at: DateTime<Utc>) -> Result<()>;

    async fn log_alert(&self, entry: &AlertLogEntry) -> Result<()>;
}

/// Notification channel lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn get_channel(&self, id: &ChannelId) -> Result<Option<NotificationChannel>>;
}

/// Daily aggregate computation and storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Aggregate session/transcode tables for one calendar day.
    async fn compute_daily_rollup(&self, day: NaiveDate) -> Result<DailyStat>;

    async fn upsert_daily_stat(&self, row: &DailyStat) -> Result<()>;
}

/// Asset lookup for the streaming handlers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    async fn get_asset(&self, id: &AssetId) -> Result<Option<MediaAsset>>;
}

/// Media-provider capability backing the DLNA ContentDirectory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDirectory: Send + Sync {
    async fn get_libraries(&self) -> Result<Vec<MediaLibrary>>;

    async fn get_library_items(&self, library_id: &str) -> Result<Vec<LibraryItem>>;
}
