//! Query DTOs: owned snapshots of kernel state.

use core_types::{CoreId, FaultRecord, Pid, ProcessStatus, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Full inspection snapshot of one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: Pid,
    pub name: String,
    pub status: ProcessStatus,
    /// The core currently executing this process, if any.
    pub assigned_core: Option<CoreId>,
    pub created: Timestamp,
    /// Index of the next instruction to execute.
    pub current_line: usize,
    pub total_instructions: usize,
    /// Declared address-space size in bytes.
    pub memory_size: usize,
    /// Timestamped log lines emitted by PRINT and warnings.
    pub logs: Vec<String>,
    pub fault: Option<FaultRecord>,
}

/// Aggregated CPU, memory and paging counters (the `vmstat` view).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmStats {
    pub total_mem_bytes: usize,
    pub used_mem_bytes: usize,
    pub free_mem_bytes: usize,
    pub frame_size: usize,
    pub total_frames: usize,
    pub used_frames: usize,
    pub free_frames: usize,
    pub active_ticks: u64,
    pub idle_ticks: u64,
    pub total_ticks: u64,
    pub paged_in: u64,
    pub paged_out: u64,
    pub running: usize,
    pub waiting: usize,
    pub sleeping: usize,
    pub finished: usize,
}

/// One process row in the utilization report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessLine {
    pub name: String,
    pub created: Timestamp,
    pub core: Option<CoreId>,
    pub current_line: usize,
    pub total_instructions: usize,
    pub sleeping: bool,
}

/// CPU utilization and per-process progress, grouped by lifecycle stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationReport {
    pub cpu_utilization: f64,
    pub cores_used: usize,
    pub cores_available: usize,
    pub running: Vec<ProcessLine>,
    pub waiting: Vec<ProcessLine>,
    pub finished: Vec<ProcessLine>,
}

impl UtilizationReport {
    /// Renders the report in the layout of the utility log file.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "CPU utilization: {:.0}%", self.cpu_utilization);
        let _ = writeln!(out, "Cores used: {}", self.cores_used);
        let _ = writeln!(out, "Cores available: {}", self.cores_available);
        let _ = writeln!(out, "--------------------------------------");
        let _ = writeln!(out, "\nRunning processes:");
        for line in &self.running {
            if let Some(core) = line.core {
                let _ = writeln!(
                    out,
                    "{}\t{}\tCore:{}\t{} / {}",
                    line.name, line.created, core, line.current_line, line.total_instructions
                );
            }
        }
        let _ = writeln!(out, "\nWaiting processes:");
        for line in &self.waiting {
            let suffix = if line.sleeping { " (sleeping)" } else { "" };
            let _ = writeln!(
                out,
                "{}\t{}\t{} / {}{}",
                line.name, line.created, line.current_line, line.total_instructions, suffix
            );
        }
        let _ = writeln!(out, "\nFinished processes:");
        for line in &self.finished {
            let _ = writeln!(
                out,
                "{}\t{}\tFinished\t{} / {}",
                line.name, line.created, line.total_instructions, line.total_instructions
            );
        }
        let _ = writeln!(out, "--------------------------------------");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, core: Option<CoreId>, sleeping: bool) -> ProcessLine {
        ProcessLine {
            name: name.to_string(),
            created: Timestamp::from_epoch_secs(0),
            core,
            current_line: 3,
            total_instructions: 9,
            sleeping,
        }
    }

    #[test]
    fn test_render_sections() {
        let report = UtilizationReport {
            cpu_utilization: 50.0,
            cores_used: 1,
            cores_available: 1,
            running: vec![line("p01", Some(CoreId(0)), false)],
            waiting: vec![line("p02", None, true)],
            finished: vec![],
        };
        let text = report.render();
        assert!(text.starts_with("CPU utilization: 50%"));
        assert!(text.contains("Running processes:"));
        assert!(text.contains("p01"));
        assert!(text.contains("Core:0"));
        assert!(text.contains("p02"));
        assert!(text.contains("(sleeping)"));
        assert!(text.contains("Finished processes:"));
    }

    #[test]
    fn test_vm_stats_default_is_zeroed() {
        let stats = VmStats::default();
        assert_eq!(stats.total_ticks, 0);
        assert_eq!(stats.paged_in, 0);
    }
}
