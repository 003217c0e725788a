//! NVIDIA GPU probe via `nvidia-smi`.
//!
//! The tool is optional; a missing binary or unparseable output simply
//! yields no snapshot and the affected metric fields stay empty.

use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuSnapshot {
    pub encoder_percent: f64,
    pub memory_percent: f64,
    pub temperature_c: f64,
}

/// Parse `nvidia-smi --format=csv,noheader,nounits` output for the query
/// `utilization.encoder,utilization.memory,temperature.gpu`. Only the first
/// GPU line is considered.
#[must_use]
pub fn parse_nvidia_csv(output: &str) -> Option<GpuSnapshot> {
    let line = output.lines().next()?;
    let mut fields = line.split(',').map(str::trim);

    let encoder_percent = fields.next()?.parse().ok()?;
    let memory_percent = fields.next()?.parse().ok()?;
    let temperature_c = fields.next()?.parse().ok()?;

    Some(GpuSnapshot {
        encoder_percent,
        memory_percent,
        temperature_c,
    })
}

/// Query the GPU, returning `None` when the tool is absent or fails.
pub async fn nvidia_smi_snapshot() -> Option<GpuSnapshot> {
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=utilization.encoder,utilization.memory,temperature.gpu",
            "--format=csv,noheader,nounits",
        ])
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_nvidia_csv(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_gpu_line() {
        let snap = parse_nvidia_csv("12, 34, 56\n").unwrap();
        assert_eq!(snap.encoder_percent, 12.0);
        assert_eq!(snap.memory_percent, 34.0);
        assert_eq!(snap.temperature_c, 56.0);
    }

    #[test]
    fn takes_first_of_multiple_gpus() {
        let snap = parse_nvidia_csv("5, 10, 40\n80, 90, 70\n").unwrap();
        assert_eq!(snap.temperature_c, 40.0);
    }

    #[test]
    fn rejects_malformed_output() {
        assert!(parse_nvidia_csv("").is_none());
        assert!(parse_nvidia_csv("N/A, N/A, N/A").is_none());
        assert!(parse_nvidia_csv("12, 34").is_none());
    }
}
