//! Live container remux to a transport-stream response.
//!
//! The encoder's stdout is the response body; nothing is buffered beyond
//! OS pipe semantics and `Content-Length` is never known. When the client
//! disconnects, axum drops the body stream, which drops the child guard
//! and kills the encoder.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures_util::Stream;
use serde::Deserialize;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::process::{ChildStdout, Command};
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::compat::audio_needs_transcode;
use crate::playback::AudioDisposition;
use crate::session::args::remux_ts_args;
use crate::session::process::{spawn_stderr_drain, ScopedChild};

use super::{error::AppError, lookup_asset, AppResult, StreamState};

#[derive(Debug, Deserialize)]
pub struct RemuxQuery {
    /// Start position in seconds (input-side seek, keyframe aligned).
    #[serde(default)]
    pub start: f64,
}

/// Body stream that owns the encoder child; dropping it kills the process.
struct RemuxStream {
    stream: ReaderStream<ChildStdout>,
    _child: ScopedChild,
}

impl Stream for RemuxStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

pub async fn serve_remux_ts(
    State(state): State<StreamState>,
    Path(asset_id): Path<String>,
    Query(query): Query<RemuxQuery>,
) -> AppResult<Response> {
    let asset = lookup_asset(&state, &asset_id).await?;

    if !asset.path.exists() {
        return Err(AppError::not_found(format!(
            "asset file {}",
            asset.path.display()
        )));
    }
    if query.start < 0.0 || !query.start.is_finite() {
        return Err(AppError::bad_request("start must be a non-negative number"));
    }

    let gain_db = asset.loudness_gain_db.filter(|g| g.abs() > f64::EPSILON);
    let audio = if audio_needs_transcode(&asset.audio_codec) || gain_db.is_some() {
        AudioDisposition::AacStereo
    } else {
        AudioDisposition::Copy
    };

    let args = remux_ts_args(&asset.path, audio, query.start, gain_db);
    info!(asset = %asset.id, start = query.start, audio = ?audio, "starting live remux");

    let mut child = Command::new(&state.ffmpeg_path)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            AppError::from(crate::StreamError::SpawnFailed(format!(
                "remux encoder: {e}"
            )))
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::internal("encoder stdout was not piped"))?;
    if let Some(stderr) = child.stderr.take() {
        // Drained concurrently; mid-stream failures land in the server log
        // only, the response has already begun.
        spawn_stderr_drain(stderr);
    }

    let body = Body::from_stream(RemuxStream {
        stream: ReaderStream::new(stdout),
        _child: ScopedChild::new(child),
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp2t")
        .header(header::CACHE_CONTROL, "no-store")
        .body(body)
        .map_err(|e| AppError::internal(e.to_string()))
}
