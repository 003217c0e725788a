//! Direct file service with byte-range support.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::{error::AppError, lookup_asset, AppResult, StreamState};

/// A parsed `Range: bytes=...` header. Either side of the dash may be
/// empty: `bytes=a-b`, `bytes=a-`, or the suffix form `bytes=-n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    FromTo(u64, u64),
    From(u64),
    Suffix(u64),
}

/// Parse a Range header value. Multi-range requests are not supported and
/// parse as `None`, which the handler treats as "serve the whole file".
#[must_use]
pub fn parse_range_header(value: &str) -> Option<ByteRange> {
    let ranges = value.strip_prefix("bytes=")?;
    if ranges.contains(',') {
        return None;
    }
    let (start, end) = ranges.split_once('-')?;

    match (start.trim(), end.trim()) {
        ("", "") => None,
        ("", suffix) => suffix.parse().ok().map(ByteRange::Suffix),
        (start, "") => start.parse().ok().map(ByteRange::From),
        (start, end) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            (start <= end).then_some(ByteRange::FromTo(start, end))
        }
    }
}

/// Resolve a parsed range against the file size, clamping the end and
/// rejecting ranges that start past it. Returns inclusive `(start, end)`.
#[must_use]
pub fn resolve_range(range: ByteRange, size: u64) -> Option<(u64, u64)> {
    if size == 0 {
        return None;
    }
    match range {
        ByteRange::FromTo(start, end) => {
            (start < size).then(|| (start, end.min(size - 1)))
        }
        ByteRange::From(start) => (start < size).then(|| (start, size - 1)),
        ByteRange::Suffix(len) => {
            if len == 0 {
                return None;
            }
            Some((size.saturating_sub(len), size - 1))
        }
    }
}

/// Serve the asset's bytes unchanged, honoring a single byte range.
pub async fn serve_direct(
    State(state): State<StreamState>,
    Path(asset_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let asset = lookup_asset(&state, &asset_id).await?;

    let mut file = tokio::fs::File::open(&asset.path).await.map_err(|e| {
        AppError::not_found(format!("asset file {}: {e}", asset.path.display()))
    })?;
    let size = file
        .metadata()
        .await
        .map_err(|e| AppError::internal(format!("stat failed: {e}")))?
        .len();

    let mime = mime_guess::from_path(&asset.path)
        .first_or_octet_stream()
        .to_string();

    let requested = headers
        .get(header::RANGE)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_range_header);

    let Some(range) = requested else {
        let stream = ReaderStream::new(file);
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime)
            .header(header::CONTENT_LENGTH, size)
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(stream))
            .map_err(|e| AppError::internal(e.to_string()));
    };

    let Some((start, end)) = resolve_range(range, size) else {
        return Err(AppError::range_not_satisfiable(format!(
            "range unsatisfiable for size {size}"
        )));
    };

    file.seek(std::io::SeekFrom::Start(start))
        .await
        .map_err(|e| AppError::internal(format!("seek failed: {e}")))?;
    let length = end - start + 1;
    let stream = ReaderStream::new(file.take(length));

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, mime)
        .header(header::CONTENT_LENGTH, length)
        .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{size}"))
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::internal(e.to_string()))
}
