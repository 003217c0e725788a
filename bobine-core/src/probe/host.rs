//! Host resource probes with Linux-like semantics.
//!
//! CPU and memory come from the proc stat files; disk usage from a
//! `statvfs` call on the sampled path. The parsers are pure functions over
//! file contents so they can be tested without a live host.

use std::path::Path;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    pub percent: f64,
    pub used_mb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
}

/// Cumulative CPU utilization from `/proc/stat` contents:
/// `(total − idle) / total` over the aggregate `cpu` line.
#[must_use]
pub fn cpu_percent_from_stat(contents: &str) -> Option<f64> {
    let line = contents.lines().find(|l| {
        l.starts_with("cpu") && l.split_whitespace().next() == Some("cpu")
    })?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }

    let total: u64 = fields.iter().take(8).sum();
    if total == 0 {
        return None;
    }
    let idle = fields[3];

    Some((total - idle) as f64 / total as f64 * 100.0)
}

/// Memory utilization from `/proc/meminfo` contents:
/// `(MemTotal − MemAvailable) / MemTotal`.
#[must_use]
pub fn memory_from_meminfo(contents: &str) -> Option<MemoryUsage> {
    fn field_kb(contents: &str, name: &str) -> Option<u64> {
        contents
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    }

    let total_kb = field_kb(contents, "MemTotal:")?;
    let available_kb = field_kb(contents, "MemAvailable:")?;
    if total_kb == 0 {
        return None;
    }

    let used_kb = total_kb.saturating_sub(available_kb);
    Some(MemoryUsage {
        percent: used_kb as f64 / total_kb as f64 * 100.0,
        used_mb: used_kb as f64 / 1024.0,
    })
}

/// Read current CPU utilization from `/proc/stat`.
pub fn read_cpu_percent() -> std::io::Result<Option<f64>> {
    let contents = std::fs::read_to_string("/proc/stat")?;
    Ok(cpu_percent_from_stat(&contents))
}

/// Read current memory utilization from `/proc/meminfo`.
pub fn read_memory() -> std::io::Result<Option<MemoryUsage>> {
    let contents = std::fs::read_to_string("/proc/meminfo")?;
    Ok(memory_from_meminfo(&contents))
}

/// Filesystem usage of the volume holding `path`.
#[allow(unsafe_code)]
pub fn disk_usage(path: &Path) -> std::io::Result<DiskUsage> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let frsize = stat.f_frsize as f64;
    let total = stat.f_blocks as f64 * frsize;
    let free = stat.f_bavail as f64 * frsize;
    let used = (stat.f_blocks.saturating_sub(stat.f_bfree)) as f64 * frsize;

    Ok(DiskUsage {
        total_gb: total / BYTES_PER_GB,
        used_gb: used / BYTES_PER_GB,
        free_gb: free / BYTES_PER_GB,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "\
cpu  100 0 50 800 50 0 0 0 0 0
cpu0 50 0 25 400 25 0 0 0 0 0
intr 12345
";

    const MEMINFO: &str = "\
MemTotal:        8192000 kB
MemFree:         1024000 kB
MemAvailable:    4096000 kB
Buffers:          512000 kB
";

    #[test]
    fn cpu_percent_uses_aggregate_line() {
        // total = 1000, idle = 800 -> 20%
        let pct = cpu_percent_from_stat(STAT).unwrap();
        assert!((pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn cpu_percent_rejects_garbage() {
        assert!(cpu_percent_from_stat("intr 12345\n").is_none());
        assert!(cpu_percent_from_stat("cpu  0 0\n").is_none());
    }

    #[test]
    fn memory_from_meminfo_uses_available() {
        // used = 8192000 - 4096000 = 4096000 kB -> 50%, 4000 MB
        let mem = memory_from_meminfo(MEMINFO).unwrap();
        assert!((mem.percent - 50.0).abs() < 1e-9);
        assert!((mem.used_mb - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn disk_usage_on_root() {
        let usage = disk_usage(Path::new("/")).unwrap();
        assert!(usage.total_gb > 0.0);
        assert!(usage.free_gb <= usage.total_gb);
    }
}
