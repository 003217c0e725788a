// Module: http
// Streaming response paths the HTTP layer mounts.

pub mod direct;
pub mod error;
pub mod hls;
pub mod remux;
pub mod subtitles;

use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;

use bobine_core::repository::AssetCatalog;

use crate::probe::MediaProbe;
use crate::session::SessionManager;

pub use error::{AppError, AppResult};

/// Shared state for the streaming handlers.
#[derive(Clone)]
pub struct StreamState {
    pub catalog: Arc<dyn AssetCatalog>,
    pub sessions: Arc<SessionManager>,
    pub probe: Arc<MediaProbe>,
    pub ffmpeg_path: PathBuf,
    /// Prefix the server nests this router under (e.g. `/api`). Playlist
    /// URIs are absolute paths, so they must carry the external prefix.
    pub api_prefix: String,
}

/// Streaming routes, mounted by the server under its API prefix.
pub fn router(state: StreamState) -> Router {
    Router::new()
        .route("/stream/{asset_id}/direct", get(direct::serve_direct))
        .route("/stream/{asset_id}/remux", get(remux::serve_remux_ts))
        .route("/stream/{asset_id}/master.m3u8", get(hls::master_playlist))
        .route(
            "/stream/{asset_id}/{quality}/stream.m3u8",
            get(hls::media_playlist),
        )
        .route("/stream/{asset_id}/{quality}/stop", post(hls::stop_session))
        .route("/stream/{asset_id}/{quality}/{segment}", get(hls::segment))
        .route(
            "/subtitles/{asset_id}/{stream_index}",
            get(subtitles::serve_webvtt),
        )
        .with_state(state)
}

pub(crate) async fn lookup_asset(
    state: &StreamState,
    asset_id: &str,
) -> AppResult<bobine_core::models::MediaAsset> {
    state
        .catalog
        .get_asset(&bobine_core::models::AssetId::from(asset_id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("asset {asset_id}")))
}
