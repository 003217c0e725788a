pub mod alert;
pub mod id;
pub mod library;
pub mod media;
pub mod metric;

pub use alert::{AlertCondition, AlertLogEntry, AlertRule, ChannelKind, DailyStat, NotificationChannel};
pub use id::{AssetId, ChannelId, RuleId, UserId};
pub use library::{LibraryItem, MediaLibrary};
pub use media::{
    AudioCodec, AudioTrack, MediaAsset, SubtitleFormat, SubtitleSource, SubtitleTrack, VideoCodec,
};
pub use metric::MetricSample;
