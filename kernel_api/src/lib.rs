//! # Kernel API
//!
//! The seam between the simulator core and its collaborators (the shell, the
//! report renderer). The core never calls outward; collaborators drive it
//! through [`KernelControl`] and read state back as plain data.
//!
//! ## Philosophy
//!
//! - **Operations in, snapshots out**: queries return owned DTOs, never
//!   references into kernel state, so readers can never observe a torn tick.
//! - **Errors carry the user-facing message**: the shell prints
//!   `KernelError` display text verbatim.

pub mod error;
pub mod stats;

pub use error::KernelError;
pub use stats::{ProcessLine, ProcessSnapshot, UtilizationReport, VmStats};

use core_types::{Pid, ProcessStatus};

/// The operation set the simulator core offers to external collaborators.
///
/// Implemented by `sim_kernel::SimKernel`. All methods take `&self`; the
/// implementation synchronizes internally so that shell commands may race
/// the tick loop freely.
pub trait KernelControl {
    /// Queues a new process. `script` is a semicolon-separated program in the
    /// instruction syntax; `None` asks for a synthesized workload.
    fn submit_process(
        &self,
        name: &str,
        memory_size: usize,
        script: Option<&str>,
    ) -> Result<Pid, KernelError>;

    /// Starts the background process generator.
    fn begin_generation(&self);

    /// Stops the generator. The scheduler pipeline keeps running.
    fn end_generation(&self);

    /// Requests shutdown: the tick loop drains until every process reaches a
    /// terminal state, then exits.
    fn shutdown(&self);

    /// Names of all processes currently in `status`.
    fn list_by_status(&self, status: ProcessStatus) -> Vec<String>;

    /// Full snapshot of one process, if it exists.
    fn get_process(&self, name: &str) -> Option<ProcessSnapshot>;

    /// Attach to a process for interactive inspection.
    ///
    /// Attaching to a Faulted process fails with a message stating the fault
    /// time and the offending hex address.
    fn attach(&self, name: &str) -> Result<ProcessSnapshot, KernelError>;

    /// Aggregated CPU, frame and paging counters.
    fn vm_stats(&self) -> VmStats;

    /// CPU utilization and per-process progress, ready for rendering.
    fn utilization_report(&self) -> UtilizationReport;

    /// Writes a memory snapshot file immediately, outside the regular cadence.
    fn generate_snapshot_now(&self) -> Result<(), KernelError>;

    /// Writes the human-readable backing-store dump file.
    fn dump_backing_store(&self) -> Result<(), KernelError>;
}
