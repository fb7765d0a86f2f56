//! HostProbe port - rule 評価に使うホストの負荷情報

use crate::domain::HostSnapshot;

/// Reads host load for rule evaluation.
///
/// `active_workers` is filled in by the pool; probes only report host metrics.
pub trait HostProbe: Send + Sync {
    fn snapshot(&self, active_workers: usize) -> HostSnapshot;
}

/// Fixed metrics, for tests and hosts without `/proc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticHostProbe {
    pub load_average: Option<f64>,
    pub free_memory_mb: Option<u64>,
}

impl HostProbe for StaticHostProbe {
    fn snapshot(&self, active_workers: usize) -> HostSnapshot {
        HostSnapshot {
            active_workers,
            load_average: self.load_average,
            free_memory_mb: self.free_memory_mb,
        }
    }
}
