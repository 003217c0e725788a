pub mod gpu;
pub mod host;

pub use gpu::{nvidia_smi_snapshot, GpuSnapshot};
pub use host::{cpu_percent_from_stat, disk_usage, memory_from_meminfo, DiskUsage, MemoryUsage};
