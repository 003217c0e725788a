//! Burn-in filter construction.
//!
//! Text subtitles render through the `subtitles` video filter; image-based
//! tracks (PGS, VobSub, DVB) carry pre-rendered bitmaps and need a
//! `filter_complex` overlay instead.

use std::path::Path;

use bobine_core::models::{SubtitleSource, SubtitleTrack};

use crate::{Result, StreamError};

/// Escape a path for use inside a filter argument. Single quotes, colons
/// and square brackets are all meaningful to the filter graph parser.
#[must_use]
pub fn escape_filter_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '\'' | ':' | '[' | ']' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Index of `track` among the asset's subtitle streams, which is what the
/// `subtitles` filter's `si=` option expects (not the absolute container
/// stream index).
#[must_use]
pub fn subtitle_relative_index(tracks: &[SubtitleTrack], absolute_index: u32) -> Option<usize> {
    tracks
        .iter()
        .filter_map(|t| match t.source {
            SubtitleSource::Embedded(idx) => Some(idx),
            SubtitleSource::Sidecar(_) => None,
        })
        .position(|idx| idx == absolute_index)
}

/// Build the burn-in filter for a track.
///
/// Returns `(filter_expression, is_complex)`: a plain `-vf` argument for
/// text formats, a `-filter_complex` graph for image formats.
pub fn build_burn_in_filter(
    track: &SubtitleTrack,
    all_tracks: &[SubtitleTrack],
    media_path: &Path,
) -> Result<(String, bool)> {
    if track.format.is_text_based() {
        let filter = match &track.source {
            SubtitleSource::Sidecar(path) => {
                format!("subtitles='{}'", escape_filter_path(&path.to_string_lossy()))
            }
            SubtitleSource::Embedded(absolute) => {
                let si = subtitle_relative_index(all_tracks, *absolute).ok_or_else(|| {
                    StreamError::InvalidRequest(format!(
                        "subtitle stream {absolute} not present in asset"
                    ))
                })?;
                format!(
                    "subtitles='{}':si={si}",
                    escape_filter_path(&media_path.to_string_lossy())
                )
            }
        };
        return Ok((filter, false));
    }

    match &track.source {
        SubtitleSource::Embedded(absolute) => {
            Ok((format!("[0:v][0:{absolute}]overlay[v]"), true))
        }
        SubtitleSource::Sidecar(path) => Err(StreamError::UnsupportedSubtitle(format!(
            "image subtitle sidecar {}",
            path.display()
        ))),
    }
}
