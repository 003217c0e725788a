//! HLS playlist assembly.
//!
//! The encoder writes each session's media playlist itself; the server
//! only renders the master playlist enumerating the renditions available
//! for an asset.

use bobine_core::models::MediaAsset;

use crate::quality::QualityLevel;

/// Renditions offered for an asset: every ladder rung at or below the
/// native height, and always at least the lowest rung.
#[must_use]
pub fn available_levels(asset: &MediaAsset) -> Vec<QualityLevel> {
    let levels: Vec<QualityLevel> = QualityLevel::ALL
        .into_iter()
        .filter(|level| level.profile().height <= asset.height)
        .collect();

    if levels.is_empty() {
        vec![QualityLevel::Q360]
    } else {
        levels
    }
}

/// Master playlist for an asset. `base_path` is the URL prefix under which
/// the per-quality playlists live, e.g. `/api/stream/<asset-id>`.
#[must_use]
pub fn master_playlist(asset: &MediaAsset, base_path: &str) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");

    for level in available_levels(asset) {
        let profile = level.profile();
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n{}/{}/stream.m3u8\n",
            level.bandwidth(),
            profile.width,
            profile.height,
            base_path.trim_end_matches('/'),
            level,
        ));
    }

    out
}

/// MIME type for an HLS artifact by file name.
#[must_use]
pub fn artifact_content_type(name: &str) -> &'static str {
    if name.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if name.ends_with(".ts") {
        "video/mp2t"
    } else if name.ends_with(".mp4") || name.ends_with(".m4s") {
        "video/mp4"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bobine_core::models::{AssetId, AudioCodec, VideoCodec};
    use std::path::PathBuf;

    fn asset(height: u32) -> MediaAsset {
        MediaAsset {
            id: AssetId::from("asset-000001"),
            path: PathBuf::from("/media/movie.mkv"),
            container: "matroska".to_string(),
            video_codec: VideoCodec::H264,
            audio_codec: AudioCodec::Aac,
            audio_channels: 2,
            duration_secs: 600.0,
            width: height * 16 / 9,
            height,
            loudness_gain_db: None,
        }
    }

    #[test]
    fn levels_capped_at_native_height() {
        assert_eq!(
            available_levels(&asset(1080)),
            vec![QualityLevel::Q360, QualityLevel::Q480, QualityLevel::Q720, QualityLevel::Q1080]
        );
        assert_eq!(available_levels(&asset(240)), vec![QualityLevel::Q360]);
    }

    #[test]
    fn master_playlist_lists_each_rendition() {
        let playlist = master_playlist(&asset(720), "/api/stream/asset-000001");

        assert!(playlist.starts_with("#EXTM3U\n"));
        assert!(playlist.contains("RESOLUTION=1280x720"));
        assert!(playlist.contains("/api/stream/asset-000001/720p/stream.m3u8"));
        assert!(!playlist.contains("1080p"));

        let variant_count = playlist
            .lines()
            .filter(|l| l.starts_with("#EXT-X-STREAM-INF"))
            .count();
        assert_eq!(variant_count, 3);
    }

    #[test]
    fn artifact_content_types() {
        assert_eq!(artifact_content_type("stream.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(artifact_content_type("seg00004.ts"), "video/mp2t");
        assert_eq!(artifact_content_type("seg00004.mp4"), "video/mp4");
    }
}
