use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::id::AssetId;

/// Video codec as reported by the probe tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Hevc,
    Vp8,
    Vp9,
    Av1,
    Mpeg2,
    Mpeg4,
    Other(String),
}

impl VideoCodec {
    #[must_use]
    pub fn from_tag(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "h264" | "avc" | "avc1" => Self::H264,
            "hevc" | "h265" | "hev1" | "hvc1" => Self::Hevc,
            "vp8" => Self::Vp8,
            "vp9" => Self::Vp9,
            "av1" | "av01" => Self::Av1,
            "mpeg2video" => Self::Mpeg2,
            "mpeg4" => Self::Mpeg4,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
            Self::Mpeg2 => "mpeg2video",
            Self::Mpeg4 => "mpeg4",
            Self::Other(s) => s,
        }
    }
}

/// Audio codec as reported by the probe tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Mp3,
    Opus,
    Vorbis,
    Flac,
    Ac3,
    Eac3,
    Dts,
    TrueHd,
    Other(String),
}

impl AudioCodec {
    #[must_use]
    pub fn from_tag(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "aac" => Self::Aac,
            "mp3" => Self::Mp3,
            "opus" => Self::Opus,
            "vorbis" => Self::Vorbis,
            "flac" => Self::Flac,
            "ac3" => Self::Ac3,
            "eac3" => Self::Eac3,
            "dts" | "dca" => Self::Dts,
            "truehd" => Self::TrueHd,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            Self::Aac => "aac",
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Dts => "dts",
            Self::TrueHd => "truehd",
            Self::Other(s) => s,
        }
    }
}

/// An on-disk media file as catalogued by the library scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: AssetId,
    pub path: PathBuf,
    /// Container format name from the probe (e.g. "matroska", "mov,mp4").
    pub container: String,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub audio_channels: u32,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    /// Loudness-normalization gain in dB, when the scanner computed one.
    pub loudness_gain_db: Option<f64>,
}

/// Subtitle format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Subrip,
    Ass,
    Ssa,
    WebVtt,
    /// Blu-ray presentation graphics
    Pgs,
    /// DVD bitmap subtitles
    VobSub,
    Dvb,
}

impl SubtitleFormat {
    #[must_use]
    pub fn from_codec_tag(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "subrip" | "srt" => Some(Self::Subrip),
            "ass" => Some(Self::Ass),
            "ssa" => Some(Self::Ssa),
            "webvtt" | "vtt" => Some(Self::WebVtt),
            "hdmv_pgs_subtitle" | "pgssub" => Some(Self::Pgs),
            "dvd_subtitle" | "dvdsub" => Some(Self::VobSub),
            "dvb_subtitle" | "dvbsub" => Some(Self::Dvb),
            _ => None,
        }
    }

    /// Text-based formats convert to WebVTT and burn in with the
    /// `subtitles` filter; image-based formats need an overlay.
    #[must_use]
    pub fn is_text_based(self) -> bool {
        matches!(self, Self::Subrip | Self::Ass | Self::Ssa | Self::WebVtt)
    }
}

/// Where the subtitle bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtitleSource {
    /// Sidecar file next to the asset
    Sidecar(PathBuf),
    /// Absolute stream index inside the asset's container
    Embedded(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub asset_id: AssetId,
    pub language: String,
    pub title: Option<String>,
    pub format: SubtitleFormat,
    pub source: SubtitleSource,
    pub default: bool,
    pub forced: bool,
    pub sdh: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTrack {
    pub asset_id: AssetId,
    /// Absolute stream index inside the container
    pub stream_index: u32,
    pub codec: AudioCodec,
    pub channels: u32,
    pub title: Option<String>,
    pub language: Option<String>,
    pub default: bool,
    pub commentary: bool,
}
