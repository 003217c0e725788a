//! Subtitle conversion to WebVTT.
//!
//! Text formats convert in-process; anything else falls back to the
//! external tool, which knows every format the container can carry.

use std::path::Path;
use tokio::process::Command;

use bobine_core::models::SubtitleFormat;

use crate::{Result, StreamError};

/// Convert text-based subtitle content to WebVTT.
pub fn convert_to_webvtt(format: SubtitleFormat, content: &str) -> Result<String> {
    match format {
        SubtitleFormat::WebVtt => Ok(content.to_string()),
        SubtitleFormat::Subrip => Ok(subrip_to_webvtt(content)),
        SubtitleFormat::Ass | SubtitleFormat::Ssa => Ok(ass_to_webvtt(content)),
        other => Err(StreamError::UnsupportedSubtitle(format!("{other:?}"))),
    }
}

/// SubRip to WebVTT: prepend the header and swap the decimal comma for a
/// period on timestamp lines. Everything else passes through.
#[must_use]
pub fn subrip_to_webvtt(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    out.push_str("WEBVTT\n\n");

    for line in input.lines() {
        if line.contains("-->") {
            out.push_str(&line.replace(',', "."));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }

    out
}

/// ASS/SSA to WebVTT: walk the `[Events]` section, locate the Start/End/
/// Text columns from the `Format:` header, normalize times and strip
/// styling overrides. Cues with no remaining text are dropped.
#[must_use]
pub fn ass_to_webvtt(input: &str) -> String {
    let mut out = String::from("WEBVTT\n\n");

    let mut in_events = false;
    let mut columns: Option<(usize, usize, usize, usize)> = None; // (start, end, text, count)

    for line in input.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('[') {
            in_events = trimmed.eq_ignore_ascii_case("[Events]");
            continue;
        }
        if !in_events {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("Format:") {
            let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
            let start = fields.iter().position(|f| f.eq_ignore_ascii_case("Start"));
            let end = fields.iter().position(|f| f.eq_ignore_ascii_case("End"));
            let text = fields.iter().position(|f| f.eq_ignore_ascii_case("Text"));
            if let (Some(s), Some(e), Some(t)) = (start, end, text) {
                columns = Some((s, e, t, fields.len()));
            }
            continue;
        }

        let Some(rest) = trimmed.strip_prefix("Dialogue:") else {
            continue;
        };
        let Some((start_col, end_col, text_col, count)) = columns else {
            continue;
        };

        // The Text column is last and may itself contain commas.
        let fields: Vec<&str> = rest.splitn(count, ',').collect();
        if fields.len() <= text_col.max(start_col).max(end_col) {
            continue;
        }

        let (Some(start), Some(end)) = (
            normalize_ass_time(fields[start_col].trim()),
            normalize_ass_time(fields[end_col].trim()),
        ) else {
            continue;
        };

        let text = clean_ass_text(fields[text_col]);
        if text.is_empty() {
            continue;
        }

        out.push_str(&format!("{start} --> {end}\n{text}\n\n"));
    }

    out
}

/// `H:MM:SS.cc` (centiseconds) to `HH:MM:SS.mmm`.
fn normalize_ass_time(time: &str) -> Option<String> {
    let (hms, centis) = time.rsplit_once('.')?;
    let mut parts = hms.split(':');

    let hours: u32 = parts.next()?.parse().ok()?;
    let minutes: u32 = parts.next()?.parse().ok()?;
    let seconds: u32 = parts.next()?.parse().ok()?;
    let centis: u32 = centis.parse().ok()?;

    Some(format!(
        "{hours:02}:{minutes:02}:{seconds:02}.{:03}",
        centis * 10
    ))
}

/// Strip `{...}` override tags and convert ASS line breaks.
fn clean_ass_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_override = false;

    for c in raw.chars() {
        match c {
            '{' => in_override = true,
            '}' => in_override = false,
            c if !in_override => out.push(c),
            _ => {}
        }
    }

    out.replace("\\N", "\n").replace("\\n", "\n").trim().to_string()
}

/// Extract an embedded subtitle stream as WebVTT via the external tool.
pub async fn extract_embedded_webvtt(
    ffmpeg_path: &Path,
    media_path: &Path,
    stream_index: u32,
) -> Result<Vec<u8>> {
    let output = Command::new(ffmpeg_path)
        .arg("-v")
        .arg("error")
        .arg("-i")
        .arg(media_path)
        .args(["-map", &format!("0:{stream_index}"), "-f", "webvtt", "pipe:1"])
        .output()
        .await
        .map_err(|e| StreamError::SpawnFailed(format!("subtitle extraction: {e}")))?;

    if !output.status.success() {
        return Err(StreamError::EncoderFailed(format!(
            "subtitle extraction exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(output.stdout)
}

/// Read a sidecar file and convert it, keyed by its format tag.
pub async fn sidecar_to_webvtt(format: SubtitleFormat, path: &Path) -> Result<String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StreamError::AssetUnavailable(format!("{}: {e}", path.display())))?;
    convert_to_webvtt(format, &content)
}
