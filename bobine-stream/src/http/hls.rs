//! HLS playlist and segment service backed by the session manager.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::io::ReaderStream;

use bobine_core::models::UserId;

use crate::hls as playlist;
use crate::playback::transcode_plan;
use crate::quality::QualityLevel;
use crate::session::SessionKey;

use super::{error::AppError, lookup_asset, AppResult, StreamState};

/// How long the playlist handler waits for the encoder to produce its
/// first playlist write before giving up.
const PLAYLIST_WAIT: Duration = Duration::from_secs(10);
const PLAYLIST_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
pub struct HlsQuery {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub hevc: bool,
}

fn parse_quality(quality: &str) -> AppResult<QualityLevel> {
    QualityLevel::from_name(quality)
        .ok_or_else(|| AppError::bad_request(format!("unknown quality {quality}")))
}

fn request_user(headers: &HeaderMap) -> UserId {
    headers
        .get("x-user-id")
        .and_then(|h| h.to_str().ok())
        .map_or_else(|| UserId::from("anonymous"), UserId::from)
}

/// Master playlist enumerating each available rendition for the asset.
pub async fn master_playlist(
    State(state): State<StreamState>,
    Path(asset_id): Path<String>,
) -> AppResult<Response> {
    let asset = lookup_asset(&state, &asset_id).await?;
    let base = format!(
        "{}/stream/{asset_id}",
        state.api_prefix.trim_end_matches('/')
    );
    let body = playlist::master_playlist(&asset, &base);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(body))
        .map_err(|e| AppError::internal(e.to_string()))
}

/// Media playlist for one rendition; resolves (and if necessary starts)
/// the session producing it.
pub async fn media_playlist(
    State(state): State<StreamState>,
    Path((asset_id, quality)): Path<(String, String)>,
    Query(query): Query<HlsQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let asset = lookup_asset(&state, &asset_id).await?;
    let quality = parse_quality(&quality)?;
    if query.start < 0.0 || !query.start.is_finite() {
        return Err(AppError::bad_request("start must be a non-negative number"));
    }

    let plan = transcode_plan(&asset, quality, query.start, query.hevc);
    let subtitles = state
        .probe
        .subtitle_tracks(&asset.id, &asset.path)
        .await
        .unwrap_or_default();
    let user = request_user(&headers);

    let session = state
        .sessions
        .get_or_create(&asset, &plan, &subtitles, &user)
        .await?;

    let playlist_path = session.playlist_path();
    let deadline = tokio::time::Instant::now() + PLAYLIST_WAIT;
    while !playlist_path.exists() {
        if tokio::time::Instant::now() >= deadline {
            return Err(AppError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "encoder has not produced a playlist yet",
            ));
        }
        tokio::time::sleep(PLAYLIST_POLL).await;
    }

    let body = tokio::fs::read(&playlist_path)
        .await
        .map_err(|e| AppError::internal(format!("playlist read: {e}")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(body))
        .map_err(|e| AppError::internal(e.to_string()))
}

/// One media segment out of the session's output directory.
pub async fn segment(
    State(state): State<StreamState>,
    Path((asset_id, quality, segment)): Path<(String, String, String)>,
) -> AppResult<Response> {
    let quality = parse_quality(&quality)?;
    let key = SessionKey {
        asset_id: bobine_core::models::AssetId::from(asset_id.as_str()),
        quality,
    };

    let session = state
        .sessions
        .get(&key)
        .ok_or_else(|| AppError::not_found(format!("session {key}")))?;

    let path = session
        .segment_path(&segment)
        .ok_or_else(|| AppError::bad_request(format!("invalid segment name {segment}")))?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| AppError::not_found(format!("segment {segment}")))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, playlist::artifact_content_type(&segment))
        .header(header::CONTENT_LENGTH, len)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::internal(e.to_string()))
}

/// Explicit client stop: kill the encoder, drop the directory.
pub async fn stop_session(
    State(state): State<StreamState>,
    Path((asset_id, quality)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let quality = parse_quality(&quality)?;
    let key = SessionKey {
        asset_id: bobine_core::models::AssetId::from(asset_id.as_str()),
        quality,
    };
    state.sessions.stop(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}
