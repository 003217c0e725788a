//! Playback decision: given an asset and what the client can do, choose
//! between serving the file untouched, repackaging it into a transport
//! stream, or re-encoding it.
//!
//! Remux targets MPEG-TS rather than fragmented MP4: fMP4 fragment
//! timestamps (`tfdt`/`trun`) can drift by seconds when video packets are
//! copied out of a container with different edit lists, while MPEG-TS
//! carries per-packet PTS/DTS and PCR and keeps A/V aligned under
//! `-c:v copy`.

use serde::{Deserialize, Serialize};

use bobine_core::models::{MediaAsset, SubtitleTrack, VideoCodec};

use crate::compat::{audio_needs_transcode, container_needs_remux, video_is_browser_compatible};
use crate::quality::QualityLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackMode {
    Direct,
    RemuxTransportStream,
    FullTranscode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputContainer {
    /// Source container, untouched
    Source,
    MpegTs,
    Hls,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoDisposition {
    Copy,
    Encode {
        codec: VideoCodec,
        width: u32,
        height: u32,
        bitrate: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDisposition {
    Copy,
    /// AAC, downmixed to stereo
    AacStereo,
    /// AC3 5.1 for surround sources
    Ac3Surround,
}

/// What the client asked for, beyond the asset itself.
#[derive(Debug, Clone, Default)]
pub struct PlaybackRequest {
    /// Target quality; `None` maps the native resolution onto the ladder.
    pub quality: Option<QualityLevel>,
    /// Subtitle track to burn into the video.
    pub burn_in: Option<SubtitleTrack>,
    /// Convert HDR content down to SDR.
    pub tone_map_sdr: bool,
    /// Start offset in seconds.
    pub start_secs: f64,
    /// Client advertised HEVC decode support.
    pub hevc_supported: bool,
    /// Explicit gain override; falls back to the asset's scanned gain.
    pub gain_db: Option<f64>,
}

/// The transient plan a streaming response executes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPlan {
    pub mode: PlaybackMode,
    pub container: OutputContainer,
    pub video: VideoDisposition,
    pub audio: AudioDisposition,
    pub quality: QualityLevel,
    pub burn_in: Option<SubtitleTrack>,
    pub tone_map_sdr: bool,
    pub start_secs: f64,
    pub gain_db: Option<f64>,
}

/// Decide how to serve `asset` for `request`.
#[must_use]
pub fn decide_playback(asset: &MediaAsset, request: &PlaybackRequest) -> PlaybackPlan {
    let quality = request
        .quality
        .unwrap_or_else(|| QualityLevel::from_height(asset.height));

    let gain_db = request
        .gain_db
        .or(asset.loudness_gain_db)
        .filter(|g| g.abs() > f64::EPSILON);

    let needs_remux = container_needs_remux(&asset.path);
    // A pending gain means the audio stream must pass through an encoder.
    let needs_audio = audio_needs_transcode(&asset.audio_codec) || gain_db.is_some();
    let video_forces_encode = request.burn_in.is_some() || request.tone_map_sdr;

    if !needs_remux && !needs_audio && !video_forces_encode && request.start_secs == 0.0 {
        return PlaybackPlan {
            mode: PlaybackMode::Direct,
            container: OutputContainer::Source,
            video: VideoDisposition::Copy,
            audio: AudioDisposition::Copy,
            quality,
            burn_in: None,
            tone_map_sdr: false,
            start_secs: 0.0,
            gain_db: None,
        };
    }

    if video_is_browser_compatible(&asset.video_codec) && !video_forces_encode {
        return PlaybackPlan {
            mode: PlaybackMode::RemuxTransportStream,
            container: OutputContainer::MpegTs,
            video: VideoDisposition::Copy,
            audio: if needs_audio {
                AudioDisposition::AacStereo
            } else {
                AudioDisposition::Copy
            },
            quality,
            burn_in: None,
            tone_map_sdr: false,
            start_secs: request.start_secs,
            gain_db,
        };
    }

    let profile = quality.profile();
    let target_codec = if request.hevc_supported && asset.video_codec == VideoCodec::Hevc {
        VideoCodec::Hevc
    } else {
        VideoCodec::H264
    };

    PlaybackPlan {
        mode: PlaybackMode::FullTranscode,
        container: OutputContainer::Hls,
        video: VideoDisposition::Encode {
            codec: target_codec,
            width: profile.width,
            height: profile.height,
            bitrate: profile.video_bitrate,
        },
        audio: if asset.audio_channels <= 2 {
            AudioDisposition::AacStereo
        } else {
            AudioDisposition::Ac3Surround
        },
        quality,
        burn_in: request.burn_in.clone(),
        tone_map_sdr: request.tone_map_sdr,
        start_secs: request.start_secs,
        gain_db,
    }
}

/// Plan a forced full transcode at a specific rung of the ladder; the HLS
/// path always re-encodes regardless of source compatibility.
#[must_use]
pub fn transcode_plan(
    asset: &MediaAsset,
    quality: QualityLevel,
    start_secs: f64,
    hevc_supported: bool,
) -> PlaybackPlan {
    let profile = quality.profile();
    let target_codec = if hevc_supported && asset.video_codec == VideoCodec::Hevc {
        VideoCodec::Hevc
    } else {
        VideoCodec::H264
    };

    PlaybackPlan {
        mode: PlaybackMode::FullTranscode,
        container: OutputContainer::Hls,
        video: VideoDisposition::Encode {
            codec: target_codec,
            width: profile.width,
            height: profile.height,
            bitrate: profile.video_bitrate,
        },
        audio: if asset.audio_channels <= 2 {
            AudioDisposition::AacStereo
        } else {
            AudioDisposition::Ac3Surround
        },
        quality,
        burn_in: None,
        tone_map_sdr: false,
        start_secs,
        gain_db: asset.loudness_gain_db.filter(|g| g.abs() > f64::EPSILON),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bobine_core::models::{AssetId, AudioCodec};
    use std::path::PathBuf;

    fn asset(path: &str, video: VideoCodec, audio: AudioCodec, channels: u32) -> MediaAsset {
        MediaAsset {
            id: AssetId::from("asset-000001"),
            path: PathBuf::from(path),
            container: String::new(),
            video_codec: video,
            audio_codec: audio,
            audio_channels: channels,
            duration_secs: 7200.0,
            width: 1920,
            height: 1080,
            loudness_gain_db: None,
        }
    }

    #[test]
    fn compatible_mp4_plays_direct() {
        let plan = decide_playback(
            &asset("/m/movie.mp4", VideoCodec::H264, AudioCodec::Aac, 2),
            &PlaybackRequest::default(),
        );
        assert_eq!(plan.mode, PlaybackMode::Direct);
        assert_eq!(plan.video, VideoDisposition::Copy);
        assert_eq!(plan.audio, AudioDisposition::Copy);
    }

    #[test]
    fn mkv_with_compatible_streams_remuxes_with_copy() {
        let plan = decide_playback(
            &asset("/m/movie.mkv", VideoCodec::H264, AudioCodec::Aac, 2),
            &PlaybackRequest::default(),
        );
        assert_eq!(plan.mode, PlaybackMode::RemuxTransportStream);
        assert_eq!(plan.container, OutputContainer::MpegTs);
        assert_eq!(plan.video, VideoDisposition::Copy);
        assert_eq!(plan.audio, AudioDisposition::Copy);
    }

    #[test]
    fn surround_ac3_in_mkv_remuxes_with_audio_transcode() {
        let plan = decide_playback(
            &asset("/m/movie.mkv", VideoCodec::H264, AudioCodec::Ac3, 6),
            &PlaybackRequest::default(),
        );
        assert_eq!(plan.mode, PlaybackMode::RemuxTransportStream);
        assert_eq!(plan.audio, AudioDisposition::AacStereo);
    }

    #[test]
    fn seek_prevents_direct_but_not_remux() {
        let plan = decide_playback(
            &asset("/m/movie.mp4", VideoCodec::H264, AudioCodec::Aac, 2),
            &PlaybackRequest {
                start_secs: 300.0,
                ..Default::default()
            },
        );
        assert_eq!(plan.mode, PlaybackMode::RemuxTransportStream);
        assert_eq!(plan.video, VideoDisposition::Copy);
        assert_eq!(plan.start_secs, 300.0);
    }

    #[test]
    fn hevc_source_forces_full_transcode_to_h264() {
        let plan = decide_playback(
            &asset("/m/movie.mkv", VideoCodec::Hevc, AudioCodec::Dts, 6),
            &PlaybackRequest::default(),
        );
        assert_eq!(plan.mode, PlaybackMode::FullTranscode);
        assert!(matches!(
            plan.video,
            VideoDisposition::Encode {
                codec: VideoCodec::H264,
                ..
            }
        ));
        assert_eq!(plan.audio, AudioDisposition::Ac3Surround);
    }

    #[test]
    fn hevc_capable_client_keeps_hevc() {
        let plan = decide_playback(
            &asset("/m/movie.mkv", VideoCodec::Hevc, AudioCodec::Aac, 2),
            &PlaybackRequest {
                tone_map_sdr: true,
                hevc_supported: true,
                ..Default::default()
            },
        );
        assert_eq!(plan.mode, PlaybackMode::FullTranscode);
        assert!(matches!(
            plan.video,
            VideoDisposition::Encode {
                codec: VideoCodec::Hevc,
                ..
            }
        ));
    }

    #[test]
    fn burn_in_forces_video_encode_even_for_h264() {
        let track = SubtitleTrack {
            asset_id: AssetId::from("asset-000001"),
            language: "en".to_string(),
            title: None,
            format: bobine_core::models::SubtitleFormat::Subrip,
            source: bobine_core::models::SubtitleSource::Embedded(2),
            default: false,
            forced: false,
            sdh: false,
        };
        let plan = decide_playback(
            &asset("/m/movie.mp4", VideoCodec::H264, AudioCodec::Aac, 2),
            &PlaybackRequest {
                burn_in: Some(track),
                ..Default::default()
            },
        );
        assert_eq!(plan.mode, PlaybackMode::FullTranscode);
        assert!(plan.burn_in.is_some());
    }

    #[test]
    fn loudness_gain_blocks_direct_and_reencodes_audio() {
        let mut asset = asset("/m/movie.mp4", VideoCodec::H264, AudioCodec::Aac, 2);
        asset.loudness_gain_db = Some(-3.5);
        let plan = decide_playback(&asset, &PlaybackRequest::default());
        assert_eq!(plan.mode, PlaybackMode::RemuxTransportStream);
        assert_eq!(plan.audio, AudioDisposition::AacStereo);
        assert_eq!(plan.gain_db, Some(-3.5));
    }

    #[test]
    fn native_height_maps_to_ladder_when_no_quality_given() {
        let plan = decide_playback(
            &asset("/m/movie.mkv", VideoCodec::Hevc, AudioCodec::Aac, 2),
            &PlaybackRequest::default(),
        );
        assert_eq!(plan.quality, QualityLevel::Q1080);
    }
}
