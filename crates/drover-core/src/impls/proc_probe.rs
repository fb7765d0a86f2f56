//! ProcHostProbe - Linux の /proc からホスト負荷を読む

use std::path::PathBuf;

use crate::domain::HostSnapshot;
use crate::ports::HostProbe;

/// Reads `/proc/loadavg` and `/proc/meminfo`.
///
/// Unreadable or unparsable files yield `None` metrics.
#[derive(Debug, Clone)]
pub struct ProcHostProbe {
    root: PathBuf,
}

impl ProcHostProbe {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Read from another procfs mount (containers, tests).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.root.join(name)).ok()
    }
}

impl Default for ProcHostProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for ProcHostProbe {
    fn snapshot(&self, active_workers: usize) -> HostSnapshot {
        HostSnapshot {
            active_workers,
            load_average: self.read("loadavg").as_deref().and_then(parse_loadavg),
            free_memory_mb: self.read("meminfo").as_deref().and_then(parse_meminfo),
        }
    }
}

/// First field of `/proc/loadavg`.
fn parse_loadavg(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

/// `MemAvailable` from `/proc/meminfo`, in MiB.
fn parse_meminfo(raw: &str) -> Option<u64> {
    raw.lines().find_map(|line| {
        let rest = line.strip_prefix("MemAvailable:")?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb / 1024)
    })
}
