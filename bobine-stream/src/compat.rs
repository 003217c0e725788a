//! Codec and container compatibility policy.
//!
//! These three classifiers are the entire matrix behind every playback
//! decision: browsers accept MP4/WebM containers natively, a handful of
//! audio codecs, and the four mainstream video codecs. Everything else is
//! remuxed or transcoded.

use std::path::Path;

use bobine_core::models::{AudioCodec, VideoCodec};

/// True unless the file extension is one of mp4 / m4v / webm.
#[must_use]
pub fn container_needs_remux(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    !matches!(ext.as_deref(), Some("mp4" | "m4v" | "webm"))
}

/// False for the browser-decodable audio codecs; true otherwise (notably
/// DTS, AC3, EAC3, TrueHD).
#[must_use]
pub fn audio_needs_transcode(codec: &AudioCodec) -> bool {
    !matches!(
        codec,
        AudioCodec::Aac | AudioCodec::Mp3 | AudioCodec::Opus | AudioCodec::Vorbis | AudioCodec::Flac
    )
}

/// H.264 / VP8 / VP9 / AV1 decode everywhere that matters.
#[must_use]
pub fn video_is_browser_compatible(codec: &VideoCodec) -> bool {
    matches!(
        codec,
        VideoCodec::H264 | VideoCodec::Vp8 | VideoCodec::Vp9 | VideoCodec::Av1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_remux_matrix() {
        assert!(!container_needs_remux(Path::new("/media/movie.mp4")));
        assert!(!container_needs_remux(Path::new("/media/movie.M4V")));
        assert!(!container_needs_remux(Path::new("/media/movie.webm")));
        assert!(container_needs_remux(Path::new("/media/movie.mkv")));
        assert!(container_needs_remux(Path::new("/media/movie.avi")));
        assert!(container_needs_remux(Path::new("/media/movie.ts")));
        assert!(container_needs_remux(Path::new("/media/noextension")));
    }

    #[test]
    fn audio_transcode_matrix() {
        assert!(!audio_needs_transcode(&AudioCodec::Aac));
        assert!(!audio_needs_transcode(&AudioCodec::Mp3));
        assert!(!audio_needs_transcode(&AudioCodec::Opus));
        assert!(!audio_needs_transcode(&AudioCodec::Vorbis));
        assert!(!audio_needs_transcode(&AudioCodec::Flac));
        assert!(audio_needs_transcode(&AudioCodec::Dts));
        assert!(audio_needs_transcode(&AudioCodec::Ac3));
        assert!(audio_needs_transcode(&AudioCodec::Eac3));
        assert!(audio_needs_transcode(&AudioCodec::TrueHd));
    }

    #[test]
    fn video_compat_matrix() {
        assert!(video_is_browser_compatible(&VideoCodec::H264));
        assert!(video_is_browser_compatible(&VideoCodec::Vp9));
        assert!(video_is_browser_compatible(&VideoCodec::Av1));
        assert!(!video_is_browser_compatible(&VideoCodec::Hevc));
        assert!(!video_is_browser_compatible(&VideoCodec::Mpeg2));
    }
}
