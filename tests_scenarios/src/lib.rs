//! Scenario Test Utilities
//!
//! Shared builders for the end-to-end scheduler and paging scenarios.
//!
//! ## Test Philosophy
//!
//! - **Tick-exact**: tests drive [`SimKernel::tick_once`] directly; the clock
//!   and generator threads stay out of the picture.
//! - **Deterministic**: fixed generator seeds, explicit configs, temp output
//!   directories.
//! - **Audit-first**: scheduling behavior is asserted against the typed
//!   event log, not against timing.

use sim_kernel::{SchedulerPolicy, SimKernel, SystemConfig};
use tempfile::TempDir;

/// A kernel wired to a temporary output directory.
///
/// The directory guard must stay alive for the kernel's lifetime; dropping
/// it deletes snapshot, store and report files.
pub fn test_kernel(config: SystemConfig) -> (TempDir, SimKernel) {
    let dir = TempDir::new().expect("temp output dir");
    let kernel = SimKernel::with_seed(config, dir.path(), 0xD15C).expect("kernel construction");
    (dir, kernel)
}

/// FCFS on one core, snapshots off, generous memory.
pub fn fcfs_single_core() -> SystemConfig {
    SystemConfig {
        num_cpu: 1,
        scheduler: SchedulerPolicy::Fcfs,
        quantum_cycles: 0,
        ..SystemConfig::default()
    }
}

/// Round robin with the given core count and quantum.
pub fn round_robin(num_cpu: usize, quantum_cycles: u32) -> SystemConfig {
    SystemConfig {
        num_cpu,
        scheduler: SchedulerPolicy::RoundRobin,
        quantum_cycles,
        ..SystemConfig::default()
    }
}

/// A script of `count` one-word additions, long enough to stay busy.
pub fn busy_script(count: usize) -> String {
    vec!["ADD x x 1"; count].join("; ")
}
