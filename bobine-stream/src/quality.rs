use serde::{Deserialize, Serialize};

/// Fixed quality ladder for adaptive streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Q360,
    Q480,
    Q720,
    Q1080,
    Q2160,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub width: u32,
    pub height: u32,
    /// Target video bit-rate in bits per second.
    pub video_bitrate: u32,
    /// Target audio bit-rate in bits per second.
    pub audio_bitrate: u32,
}

impl QualityLevel {
    pub const ALL: [QualityLevel; 5] = [
        Self::Q360,
        Self::Q480,
        Self::Q720,
        Self::Q1080,
        Self::Q2160,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Q360 => "360p",
            Self::Q480 => "480p",
            Self::Q720 => "720p",
            Self::Q1080 => "1080p",
            Self::Q2160 => "4k",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "360p" => Some(Self::Q360),
            "480p" => Some(Self::Q480),
            "720p" => Some(Self::Q720),
            "1080p" => Some(Self::Q1080),
            "4k" | "2160p" => Some(Self::Q2160),
            _ => None,
        }
    }

    /// Map a native frame height onto the nearest ladder rung.
    #[must_use]
    pub fn from_height(height: u32) -> Self {
        Self::ALL
            .into_iter()
            .min_by_key(|level| level.profile().height.abs_diff(height))
            .unwrap_or(Self::Q720)
    }

    #[must_use]
    pub fn profile(self) -> QualityProfile {
        match self {
            Self::Q360 => QualityProfile {
                width: 640,
                height: 360,
                video_bitrate: 800_000,
                audio_bitrate: 96_000,
            },
            Self::Q480 => QualityProfile {
                width: 854,
                height: 480,
                video_bitrate: 1_500_000,
                audio_bitrate: 128_000,
            },
            Self::Q720 => QualityProfile {
                width: 1280,
                height: 720,
                video_bitrate: 4_000_000,
                audio_bitrate: 128_000,
            },
            Self::Q1080 => QualityProfile {
                width: 1920,
                height: 1080,
                video_bitrate: 8_000_000,
                audio_bitrate: 192_000,
            },
            Self::Q2160 => QualityProfile {
                width: 3840,
                height: 2160,
                video_bitrate: 25_000_000,
                audio_bitrate: 192_000,
            },
        }
    }

    /// Peak bandwidth advertised in the master playlist.
    #[must_use]
    pub fn bandwidth(self) -> u32 {
        let profile = self.profile();
        profile.video_bitrate + profile.audio_bitrate
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for level in QualityLevel::ALL {
            assert_eq!(QualityLevel::from_name(level.name()), Some(level));
        }
        assert_eq!(QualityLevel::from_name("2160p"), Some(QualityLevel::Q2160));
        assert_eq!(QualityLevel::from_name("144p"), None);
    }

    #[test]
    fn nearest_profile_for_native_height() {
        assert_eq!(QualityLevel::from_height(360), QualityLevel::Q360);
        assert_eq!(QualityLevel::from_height(576), QualityLevel::Q480);
        assert_eq!(QualityLevel::from_height(800), QualityLevel::Q720);
        assert_eq!(QualityLevel::from_height(1080), QualityLevel::Q1080);
        assert_eq!(QualityLevel::from_height(1440), QualityLevel::Q1080);
        assert_eq!(QualityLevel::from_height(4320), QualityLevel::Q2160);
    }
}
