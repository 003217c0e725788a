//! Stream enumeration via ffprobe.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use bobine_core::models::{
    AssetId, AudioCodec, AudioTrack, SubtitleFormat, SubtitleSource, SubtitleTrack,
};

use crate::{Result, StreamError};

pub struct MediaProbe {
    ffprobe_path: PathBuf,
}

impl MediaProbe {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Enumerate embedded subtitle streams.
    pub async fn subtitle_tracks(&self, asset_id: &AssetId, path: &Path) -> Result<Vec<SubtitleTrack>> {
        let json = self.show_streams(path, "s").await?;
        Ok(parse_subtitle_streams(asset_id, &json))
    }

    /// Enumerate audio streams.
    pub async fn audio_tracks(&self, asset_id: &AssetId, path: &Path) -> Result<Vec<AudioTrack>> {
        let json = self.show_streams(path, "a").await?;
        Ok(parse_audio_streams(asset_id, &json))
    }

    async fn show_streams(&self, path: &Path, selector: &str) -> Result<Value> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                selector,
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| StreamError::AssetUnavailable(format!("ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(StreamError::AssetUnavailable(format!(
                "ffprobe exited with {} for {}",
                output.status,
                path.display()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| StreamError::ProbeParse(e.to_string()))
    }
}

fn disposition_flag(stream: &Value, name: &str) -> bool {
    stream["disposition"][name].as_i64().unwrap_or(0) != 0
}

/// Map ffprobe `-select_streams s` JSON to subtitle tracks. Streams whose
/// codec has no known format tag are skipped.
#[must_use]
pub fn parse_subtitle_streams(asset_id: &AssetId, json: &Value) -> Vec<SubtitleTrack> {
    let Some(streams) = json["streams"].as_array() else {
        return Vec::new();
    };

    streams
        .iter()
        .filter_map(|stream| {
            let index = stream["index"].as_u64()? as u32;
            let format = SubtitleFormat::from_codec_tag(stream["codec_name"].as_str()?)?;
            let tags = &stream["tags"];

            Some(SubtitleTrack {
                asset_id: asset_id.clone(),
                language: tags["language"].as_str().unwrap_or("und").to_string(),
                title: tags["title"].as_str().map(str::to_string),
                format,
                source: SubtitleSource::Embedded(index),
                default: disposition_flag(stream, "default"),
                forced: disposition_flag(stream, "forced"),
                sdh: disposition_flag(stream, "hearing_impaired"),
            })
        })
        .collect()
}

/// Map ffprobe `-select_streams a` JSON to audio tracks.
#[must_use]
pub fn parse_audio_streams(asset_id: &AssetId, json: &Value) -> Vec<AudioTrack> {
    let Some(streams) = json["streams"].as_array() else {
        return Vec::new();
    };

    streams
        .iter()
        .filter_map(|stream| {
            let index = stream["index"].as_u64()? as u32;
            let codec = AudioCodec::from_tag(stream["codec_name"].as_str()?);
            let tags = &stream["tags"];

            Some(AudioTrack {
                asset_id: asset_id.clone(),
                stream_index: index,
                codec,
                channels: stream["channels"].as_u64().unwrap_or(2) as u32,
                title: tags["title"].as_str().map(str::to_string),
                language: tags["language"].as_str().map(str::to_string),
                default: disposition_flag(stream, "default"),
                commentary: disposition_flag(stream, "comment"),
            })
        })
        .collect()
}
