use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ChannelId, RuleId};

/// What an alert rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertCondition {
    /// Free disk space on the media volume dropped below the threshold (GB).
    DiskLow,
    /// GPU temperature exceeded the threshold (°C).
    GpuTempHigh,
    /// Encoder sessions that exited non-zero in the last hour exceeded the
    /// threshold (count).
    TranscodeFailureRate,
    /// Playback sessions that died within 10 seconds in the last hour
    /// exceeded the threshold (count).
    StreamErrorRate,
}

impl AlertCondition {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DiskLow => "disk-low",
            Self::GpuTempHigh => "gpu-temp-high",
            Self::TranscodeFailureRate => "transcode-failure-rate",
            Self::StreamErrorRate => "stream-error-rate",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: RuleId,
    pub name: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub cooldown_minutes: i64,
    pub last_triggered: Option<DateTime<Utc>>,
    pub channel_id: ChannelId,
    pub enabled: bool,
}

impl AlertRule {
    /// True while the rule sits inside its cooldown window.
    #[must_use]
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered {
            Some(last) => now - last < chrono::Duration::minutes(self.cooldown_minutes),
            None => false,
        }
    }
}

/// How a notification reaches the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelKind {
    Webhook { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub enabled: bool,
}

/// Record of one delivery attempt, persisted for the admin UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertLogEntry {
    pub rule_id: RuleId,
    pub channel_id: ChannelId,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

/// One row per calendar day, produced by the nightly rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub day: NaiveDate,
    pub total_play_secs: i64,
    pub session_count: i64,
    pub transcode_count: i64,
    pub transcode_failures: i64,
    pub unique_users: i64,
}
