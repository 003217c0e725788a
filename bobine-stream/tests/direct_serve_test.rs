//! End-to-end checks for the direct file path through the axum router.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use bobine_core::config::TranscodeConfig;
use bobine_core::models::{AssetId, AudioCodec, MediaAsset, VideoCodec};
use bobine_core::repository::AssetCatalog;
use bobine_stream::http::{router, StreamState};
use bobine_stream::probe::MediaProbe;
use bobine_stream::session::{EncoderProbe, FfmpegEncoderProbe, HardwareEncoderCache, SessionManager};

struct SingleAsset(MediaAsset);

#[async_trait]
impl AssetCatalog for SingleAsset {
    async fn get_asset(&self, id: &AssetId) -> bobine_core::Result<Option<MediaAsset>> {
        Ok((id == &self.0.id).then(|| self.0.clone()))
    }
}

fn fixture(dir: &std::path::Path, bytes: usize) -> MediaAsset {
    let path = dir.join("movie.mp4");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&vec![0x2a; bytes]).unwrap();

    MediaAsset {
        id: AssetId::from("asset-000001"),
        path,
        container: "mp4".to_string(),
        video_codec: VideoCodec::H264,
        audio_codec: AudioCodec::Aac,
        audio_channels: 2,
        duration_secs: 600.0,
        width: 1920,
        height: 1080,
        loudness_gain_db: None,
    }
}

fn app(asset: MediaAsset, root: &std::path::Path) -> axum::Router {
    let transcode = TranscodeConfig {
        output_dir: root.join("transcode"),
        ..TranscodeConfig::default()
    };
    let probe: Box<dyn EncoderProbe> = Box::new(FfmpegEncoderProbe::new("ffmpeg"));
    let state = StreamState {
        catalog: Arc::new(SingleAsset(asset)),
        sessions: Arc::new(SessionManager::new(
            &transcode,
            Arc::new(HardwareEncoderCache::new(probe)),
        )),
        probe: Arc::new(MediaProbe::new("ffprobe")),
        ffmpeg_path: "ffmpeg".into(),
        api_prefix: "/api".to_string(),
    };
    router(state)
}

#[tokio::test]
async fn range_request_yields_exact_partial_content() {
    let dir = tempfile::tempdir().unwrap();
    let asset = fixture(dir.path(), 10_000);
    let app = app(asset, dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/asset-000001/direct")
                .header(header::RANGE, "bytes=0-1023")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 0-1023/10000"
    );
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 1024);
}

#[tokio::test]
async fn suffix_range_serves_the_tail() {
    let dir = tempfile::tempdir().unwrap();
    let asset = fixture(dir.path(), 10_000);
    let app = app(asset, dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/asset-000001/direct")
                .header(header::RANGE, "bytes=-500")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 9500-9999/10000"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 500);
}

#[tokio::test]
async fn full_file_without_range_is_200() {
    let dir = tempfile::tempdir().unwrap();
    let asset = fixture(dir.path(), 4_096);
    let app = app(asset, dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/asset-000001/direct")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 4_096);
}

#[tokio::test]
async fn out_of_bounds_range_is_416() {
    let dir = tempfile::tempdir().unwrap();
    let asset = fixture(dir.path(), 1_000);
    let app = app(asset, dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/asset-000001/direct")
                .header(header::RANGE, "bytes=5000-6000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn unknown_asset_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let asset = fixture(dir.path(), 1_000);
    let app = app(asset, dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/asset-999999/direct")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn master_playlist_enumerates_renditions() {
    let dir = tempfile::tempdir().unwrap();
    let asset = fixture(dir.path(), 1_000);
    let app = app(asset, dir.path());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/asset-000001/master.m3u8")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.apple.mpegurl"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("#EXTM3U"));
    assert!(text.contains("RESOLUTION=1920x1080"));
    // Rendition URIs are absolute paths, so they must include the prefix
    // the server nests this router under.
    assert!(text.contains("/api/stream/asset-000001/1080p/stream.m3u8"));
}
