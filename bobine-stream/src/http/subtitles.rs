//! Subtitle delivery as WebVTT.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};

use bobine_core::models::SubtitleSource;

use crate::subtitle::convert::{extract_embedded_webvtt, sidecar_to_webvtt};

use super::{error::AppError, lookup_asset, AppResult, StreamState};

/// Serve one subtitle track converted to WebVTT, addressed by its
/// absolute stream index from the probe.
pub async fn serve_webvtt(
    State(state): State<StreamState>,
    Path((asset_id, stream_index)): Path<(String, u32)>,
) -> AppResult<Response> {
    let asset = lookup_asset(&state, &asset_id).await?;

    let tracks = state.probe.subtitle_tracks(&asset.id, &asset.path).await?;
    let track = tracks
        .iter()
        .find(|t| matches!(t.source, SubtitleSource::Embedded(idx) if idx == stream_index))
        .ok_or_else(|| {
            AppError::not_found(format!("subtitle stream {stream_index} on asset {asset_id}"))
        })?;

    let bytes = match &track.source {
        SubtitleSource::Sidecar(path) => sidecar_to_webvtt(track.format, path).await?.into_bytes(),
        SubtitleSource::Embedded(idx) => {
            extract_embedded_webvtt(&state.ffmpeg_path, &asset.path, *idx).await?
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/vtt; charset=utf-8")
        .body(Body::from(bytes))
        .map_err(|e| AppError::internal(e.to_string()))
}
