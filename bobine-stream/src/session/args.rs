//! Encoder argument assembly.
//!
//! Translates a [`PlaybackPlan`] into the argument vector for the external
//! tool, including the hardware decode coupling: CUDA surfaces for NVENC
//! (system memory once software filters enter the graph), QSV decode with a
//! download before software filters, VAAPI with the explicit render node.

use std::path::Path;

use bobine_core::models::{MediaAsset, SubtitleTrack, VideoCodec};

use crate::playback::{AudioDisposition, PlaybackPlan, VideoDisposition};
use crate::session::hwaccel::{HardwareEncoder, HwAccelKind};
use crate::subtitle::{build_burn_in_filter, tone_map_chain};
use crate::Result;

const VAAPI_DEVICE: &str = "/dev/dri/renderD128";

pub struct HlsJob<'a> {
    pub asset: &'a MediaAsset,
    pub plan: &'a PlaybackPlan,
    pub encoder: &'a HardwareEncoder,
    /// The asset's embedded subtitle tracks, for burn-in index mapping.
    pub subtitles: &'a [SubtitleTrack],
    pub output_dir: &'a Path,
    pub segment_seconds: u32,
}

/// Argument vector for an HLS transcode session.
pub fn hls_transcode_args(job: &HlsJob<'_>) -> Result<Vec<String>> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];

    let (vf, filter_complex) = build_video_filters(job)?;
    let on_device = vf.is_none() && filter_complex.is_none();

    match job.encoder.kind {
        Some(HwAccelKind::Nvenc) => {
            args.extend(["-hwaccel".into(), "cuda".into()]);
            if on_device {
                args.extend(["-hwaccel_output_format".into(), "cuda".into()]);
            }
        }
        Some(HwAccelKind::Qsv) => {
            args.extend(["-hwaccel".into(), "qsv".into()]);
        }
        Some(HwAccelKind::Vaapi) => {
            args.extend([
                "-hwaccel".into(),
                "vaapi".into(),
                "-hwaccel_output_format".into(),
                "vaapi".into(),
                "-vaapi_device".into(),
                VAAPI_DEVICE.into(),
            ]);
        }
        None => {}
    }

    if job.plan.start_secs > 0.0 {
        args.extend(["-ss".into(), format!("{:.3}", job.plan.start_secs)]);
    }

    args.extend(["-i".into(), job.asset.path.to_string_lossy().into_owned()]);

    if let Some(fc) = &filter_complex {
        args.extend(["-filter_complex".into(), fc.clone()]);
        args.extend(["-map".into(), "[v]".into()]);
    } else {
        args.extend(["-map".into(), "0:v:0".into()]);
        if let Some(vf) = &vf {
            args.extend(["-vf".into(), vf.clone()]);
        }
    }
    args.extend(["-map".into(), "0:a:0".into()]);

    args.extend(["-c:v".into(), job.encoder.name.clone()]);
    if let VideoDisposition::Encode { bitrate, .. } = job.plan.video {
        args.extend(["-b:v".into(), format!("{}k", bitrate / 1000)]);
    }
    if job.encoder.kind.is_none() {
        args.extend(["-preset".into(), "veryfast".into()]);
    }

    push_audio_args(
        &mut args,
        job.plan.audio,
        job.plan.gain_db,
        job.plan.quality.profile().audio_bitrate,
    );

    let is_hevc = matches!(
        job.plan.video,
        VideoDisposition::Encode {
            codec: VideoCodec::Hevc,
            ..
        }
    );
    let segment_pattern = if is_hevc { "seg%05d.mp4" } else { "seg%05d.ts" };

    args.extend([
        "-f".into(),
        "hls".into(),
        "-hls_time".into(),
        job.segment_seconds.to_string(),
        "-hls_list_size".into(),
        "0".into(),
        "-hls_flags".into(),
        "independent_segments".into(),
    ]);
    if is_hevc {
        args.extend(["-hls_segment_type".into(), "fmp4".into()]);
    }
    args.extend([
        "-hls_segment_filename".into(),
        job.output_dir
            .join(segment_pattern)
            .to_string_lossy()
            .into_owned(),
        job.output_dir
            .join("stream.m3u8")
            .to_string_lossy()
            .into_owned(),
    ]);

    Ok(args)
}

/// Video filter graph for the job: `(-vf value, -filter_complex value)`,
/// at most one of which is set. Both absent means frames can stay on the
/// decode device end to end.
fn build_video_filters(job: &HlsJob<'_>) -> Result<(Option<String>, Option<String>)> {
    let (width, height) = match job.plan.video {
        VideoDisposition::Encode { width, height, .. } => (width, height),
        VideoDisposition::Copy => return Ok((None, None)),
    };
    let needs_scale = job.asset.width != width || job.asset.height != height;

    if let Some(track) = &job.plan.burn_in {
        let (burn, is_complex) = build_burn_in_filter(track, job.subtitles, &job.asset.path)?;
        let mut chain = Vec::new();
        if matches!(job.encoder.kind, Some(HwAccelKind::Qsv)) {
            chain.push("hwdownload,format=nv12".to_string());
        }
        if job.plan.tone_map_sdr {
            chain.push(tone_map_chain(None).to_string());
        }
        if needs_scale {
            chain.push(format!("scale={width}:{height}"));
        }
        if matches!(job.encoder.kind, Some(HwAccelKind::Vaapi)) {
            chain.push("format=nv12,hwupload".to_string());
        }

        if is_complex {
            // The overlay graph carries the [v] label; append the rest of
            // the chain before the label.
            let graph = burn.trim_end_matches("[v]").to_string();
            let mut full = graph;
            if !chain.is_empty() {
                full.push(',');
                full.push_str(&chain.join(","));
            }
            full.push_str("[v]");
            return Ok((None, Some(full)));
        }

        let mut parts = vec![burn];
        parts.extend(chain);
        return Ok((Some(parts.join(",")), None));
    }

    let mut chain: Vec<String> = Vec::new();
    match job.encoder.kind {
        Some(HwAccelKind::Vaapi) => {
            if job.plan.tone_map_sdr {
                chain.push(tone_map_chain(Some(HwAccelKind::Vaapi)).to_string());
            }
            if needs_scale {
                chain.push(format!("scale_vaapi={width}:{height}"));
            }
        }
        Some(HwAccelKind::Qsv) => {
            if job.plan.tone_map_sdr || needs_scale {
                chain.push("hwdownload,format=nv12".to_string());
                if job.plan.tone_map_sdr {
                    chain.push(tone_map_chain(Some(HwAccelKind::Qsv)).to_string());
                }
                if needs_scale {
                    chain.push(format!("scale={width}:{height}"));
                }
            }
        }
        Some(HwAccelKind::Nvenc) | None => {
            if job.plan.tone_map_sdr {
                chain.push(tone_map_chain(job.encoder.kind).to_string());
            }
            if needs_scale {
                chain.push(format!("scale={width}:{height}"));
            }
        }
    }

    if chain.is_empty() {
        Ok((None, None))
    } else {
        Ok((Some(chain.join(",")), None))
    }
}

fn push_audio_args(
    args: &mut Vec<String>,
    audio: AudioDisposition,
    gain_db: Option<f64>,
    audio_bitrate: u32,
) {
    match audio {
        AudioDisposition::Copy => args.extend(["-c:a".into(), "copy".into()]),
        AudioDisposition::AacStereo => {
            args.extend([
                "-c:a".into(),
                "aac".into(),
                "-ac".into(),
                "2".into(),
                "-b:a".into(),
                format!("{}k", audio_bitrate / 1000),
            ]);
        }
        AudioDisposition::Ac3Surround => {
            args.extend([
                "-c:a".into(),
                "ac3".into(),
                "-ac".into(),
                "6".into(),
                "-b:a".into(),
                "384k".into(),
            ]);
        }
    }

    if !matches!(audio, AudioDisposition::Copy) {
        if let Some(gain) = gain_db {
            args.extend(["-af".into(), format!("volume={gain}dB")]);
        }
    }
}

/// Argument vector for a live container remux to MPEG-TS on stdout.
#[must_use]
pub fn remux_ts_args(
    path: &Path,
    audio: AudioDisposition,
    start_secs: f64,
    gain_db: Option<f64>,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];

    if start_secs > 0.0 {
        args.extend(["-ss".into(), format!("{start_secs:.3}")]);
    }

    args.extend([
        "-i".into(),
        path.to_string_lossy().into_owned(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "0:a:0".into(),
        "-c:v".into(),
        "copy".into(),
    ]);

    match audio {
        AudioDisposition::Copy => args.extend(["-c:a".into(), "copy".into()]),
        _ => args.extend([
            "-c:a".into(),
            "aac".into(),
            "-ac".into(),
            "2".into(),
            "-b:a".into(),
            "192k".into(),
        ]),
    }
    if !matches!(audio, AudioDisposition::Copy) {
        if let Some(gain) = gain_db {
            args.extend(["-af".into(), format!("volume={gain}dB")]);
        }
    }

    args.extend(["-f".into(), "mpegts".into(), "pipe:1".into()]);
    args
}
