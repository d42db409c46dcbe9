//! Process memory observability
//!
//! Resident-set sampling used by the batch pool (per-batch observability)
//! and the training pipeline (peak figure in the report). Observation only:
//! nothing here throttles concurrency.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Samples the current process's resident set size and tracks history.
pub struct MemoryMonitor {
    initial_mb: f64,
    history: Vec<f64>,
    system: System,
    pid: Pid,
}

impl MemoryMonitor {
    pub fn new() -> Self {
        let pid = Pid::from_u32(std::process::id());
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let initial = Self::rss_mb_of(&system, pid);
        Self {
            initial_mb: initial,
            history: vec![initial],
            system,
            pid,
        }
    }

    fn rss_mb_of(system: &System, pid: Pid) -> f64 {
        system
            .process(pid)
            .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0)
    }

    /// Current resident set size in MB.
    pub fn rss_mb(&mut self) -> f64 {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        Self::rss_mb_of(&self.system, self.pid)
    }

    /// Sample current usage, append it to the history, and return it.
    pub fn sample(&mut self) -> f64 {
        let current = self.rss_mb();
        self.history.push(current);
        current
    }

    /// Highest sampled value so far.
    pub fn peak_mb(&self) -> f64 {
        self.history.iter().copied().fold(0.0, f64::max)
    }

    /// Change since construction, in MB.
    pub fn delta_mb(&mut self) -> f64 {
        self.rss_mb() - self.initial_mb
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }
}

impl Default for MemoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}
