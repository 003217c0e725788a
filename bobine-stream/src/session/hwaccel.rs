//! Hardware encoder probing and caching.
//!
//! On the first request per codec the cache walks the preference order
//! (NVENC, QSV, VAAPI), keeps the first candidate that both appears in the
//! tool's encoder listing and survives a synthetic one-frame test encode,
//! and otherwise falls back to the software encoder. The probe runs at
//! most once per codec per process; failures are silent by design of the
//! fallback.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

use crate::Result;

/// Hardware acceleration families, in probe preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwAccelKind {
    Nvenc,
    Qsv,
    Vaapi,
}

/// Codecs the server will encode to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCodec {
    H264,
    Hevc,
}

/// A chosen encoder: its ffmpeg name plus the acceleration family, or
/// `kind: None` for the software fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareEncoder {
    pub name: String,
    pub kind: Option<HwAccelKind>,
}

impl HardwareEncoder {
    fn software(codec: TargetCodec) -> Self {
        Self {
            name: match codec {
                TargetCodec::H264 => "libx264".to_string(),
                TargetCodec::Hevc => "libx265".to_string(),
            },
            kind: None,
        }
    }
}

fn candidates(codec: TargetCodec) -> [(&'static str, HwAccelKind); 3] {
    match codec {
        TargetCodec::H264 => [
            ("h264_nvenc", HwAccelKind::Nvenc),
            ("h264_qsv", HwAccelKind::Qsv),
            ("h264_vaapi", HwAccelKind::Vaapi),
        ],
        TargetCodec::Hevc => [
            ("hevc_nvenc", HwAccelKind::Nvenc),
            ("hevc_qsv", HwAccelKind::Qsv),
            ("hevc_vaapi", HwAccelKind::Vaapi),
        ],
    }
}

/// Strategy seam over the external tool so tests can fake the probe.
#[async_trait]
pub trait EncoderProbe: Send + Sync {
    /// The raw `-encoders` listing.
    async fn list_encoders(&self) -> Result<String>;

    /// Encode one synthetic frame with the named encoder; true on success.
    async fn test_encode(&self, encoder: &str) -> bool;
}

pub struct FfmpegEncoderProbe {
    ffmpeg_path: PathBuf,
}

impl FfmpegEncoderProbe {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl EncoderProbe for FfmpegEncoderProbe {
    async fn list_encoders(&self) -> Result<String> {
        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .output()
            .await
            .map_err(|e| crate::StreamError::SpawnFailed(format!("encoder listing: {e}")))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn test_encode(&self, encoder: &str) -> bool {
        // 64x64 solid color, one frame, output discarded.
        let result = Command::new(&self.ffmpeg_path)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                "lavfi",
                "-i",
                "color=c=black:s=64x64:d=0.1",
                "-frames:v",
                "1",
                "-c:v",
                encoder,
                "-f",
                "null",
                "-",
            ])
            .output()
            .await;

        matches!(result, Ok(output) if output.status.success())
    }
}

#[derive(Default)]
struct CacheSlots {
    h264: Option<HardwareEncoder>,
    hevc: Option<HardwareEncoder>,
}

/// Process-wide encoder choice, one probe per codec.
pub struct HardwareEncoderCache {
    probe: Box<dyn EncoderProbe>,
    // tokio mutex: held across the probe's awaits so concurrent callers
    // serialize on the single probe run.
    slots: tokio::sync::Mutex<CacheSlots>,
}

impl HardwareEncoderCache {
    pub fn new(probe: Box<dyn EncoderProbe>) -> Self {
        Self {
            probe,
            slots: tokio::sync::Mutex::new(CacheSlots::default()),
        }
    }

    /// The encoder to use for `codec`, probing on first call.
    pub async fn encoder_for(&self, codec: TargetCodec) -> HardwareEncoder {
        let mut slots = self.slots.lock().await;

        let slot = match codec {
            TargetCodec::H264 => &mut slots.h264,
            TargetCodec::Hevc => &mut slots.hevc,
        };
        if let Some(cached) = slot {
            return cached.clone();
        }

        let chosen = self.run_probe(codec).await;
        info!(codec = ?codec, encoder = %chosen.name, "encoder selected");
        *slot = Some(chosen.clone());
        chosen
    }

    async fn run_probe(&self, codec: TargetCodec) -> HardwareEncoder {
        let listing = match self.probe.list_encoders().await {
            Ok(listing) => listing,
            Err(e) => {
                debug!("encoder listing failed, using software: {}", e);
                return HardwareEncoder::software(codec);
            }
        };

        for (name, kind) in candidates(codec) {
            if !listing.contains(name) {
                continue;
            }
            if self.probe.test_encode(name).await {
                return HardwareEncoder {
                    name: name.to_string(),
                    kind: Some(kind),
                };
            }
            debug!(encoder = name, "test encode failed, trying next candidate");
        }

        HardwareEncoder::software(codec)
    }
}
