//! # Simulated Kernel
//!
//! The tick-driven core of the OS simulator: a six-phase scheduler pipeline
//! over a population of interpreted processes, demand-paged memory, and the
//! control surface the shell drives.
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! - **Deterministic**: tests call [`SimKernel::tick_once`] instead of
//!   starting the clock thread; same submissions plus same ticks means the
//!   same schedule. The only randomness is the explicitly seeded program
//!   generator.
//! - **Auditable**: every scheduler decision lands in a typed
//!   [`ScheduleEvent`] log that tests assert against.
//! - **Inspectable without tearing**: the tick loop is the sole mutator;
//!   queries take read snapshots between phases and return owned DTOs.
//!
//! ## Concurrency model
//!
//! Two long-lived tasks (the tick loop and the generator) plus concurrent
//! shell queries. Lock order is processes -> queues -> cores -> memory; no
//! lock is held across backing-store I/O — eviction buffers are staged under
//! the memory lock and flushed after release.

pub mod config;
pub mod core_table;
mod generator;
pub mod kernel;
pub mod ready_queues;
pub mod scheduler;
mod state;

pub use config::{ConfigError, SchedulerPolicy, SystemConfig};
pub use core_table::CoreTable;
pub use kernel::{
    SimKernel, BACKING_STORE_DATA_FILE, BACKING_STORE_DUMP_FILE, REPORT_FILE,
};
pub use ready_queues::ReadyQueues;
pub use scheduler::Scheduler;
pub use state::ScheduleEvent;

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_api::KernelControl;
    use core_types::ProcessStatus;
    use tempfile::tempdir;

    fn kernel(config: SystemConfig) -> (tempfile::TempDir, SimKernel) {
        let dir = tempdir().unwrap();
        let kernel = SimKernel::with_seed(config, dir.path(), 7).unwrap();
        (dir, kernel)
    }

    fn one_core_fcfs() -> SystemConfig {
        SystemConfig {
            num_cpu: 1,
            scheduler: SchedulerPolicy::Fcfs,
            quantum_cycles: 0,
            ..SystemConfig::default()
        }
    }

    #[test]
    fn test_submit_validation() {
        let (_dir, kernel) = kernel(one_core_fcfs());
        assert_eq!(
            kernel.submit_process("bad", 100, None).unwrap_err(),
            kernel_api::KernelError::InvalidMemoryAllocation
        );
        assert_eq!(
            kernel.submit_process("bad", 32, None).unwrap_err(),
            kernel_api::KernelError::InvalidMemoryAllocation
        );
        assert_eq!(
            kernel
                .submit_process("bad", 4096, Some("NOT_AN_OPCODE"))
                .unwrap_err(),
            kernel_api::KernelError::InvalidCommand
        );
        kernel.submit_process("ok", 4096, Some("DECLARE x 1")).unwrap();
        assert_eq!(
            kernel
                .submit_process("ok", 4096, Some("DECLARE x 1"))
                .unwrap_err(),
            kernel_api::KernelError::DuplicateProcess("ok".to_string())
        );
    }

    #[test]
    fn test_single_process_runs_to_completion() {
        let (_dir, kernel) = kernel(one_core_fcfs());
        kernel
            .submit_process("p01", 4096, Some("DECLARE x 5; ADD x x 3; PRINT(\"v=\" + x)"))
            .unwrap();
        kernel.run_ticks(6);

        let snapshot = kernel.get_process("p01").unwrap();
        assert_eq!(snapshot.status, ProcessStatus::Finished);
        assert_eq!(snapshot.current_line, snapshot.total_instructions);
        assert!(snapshot.logs.last().unwrap().contains("\"v=8\""));
        assert!(kernel.drained());
    }

    #[test]
    fn test_exclusive_assignment_invariant() {
        let config = SystemConfig {
            num_cpu: 2,
            ..one_core_fcfs()
        };
        let (_dir, kernel) = kernel(config);
        for i in 0..4 {
            kernel
                .submit_process(
                    &format!("w{}", i),
                    4096,
                    Some("ADD x x 1; ADD x x 1; ADD x x 1; ADD x x 1"),
                )
                .unwrap();
        }
        for _ in 0..8 {
            kernel.tick_once();
            let running = kernel.list_by_status(ProcessStatus::Running);
            for name in &running {
                let snapshot = kernel.get_process(name).unwrap();
                assert!(snapshot.assigned_core.is_some(), "{} has no core", name);
            }
            let stats = kernel.vm_stats();
            assert_eq!(stats.running, running.len());
            assert!(running.len() <= 2);
        }
    }

    #[test]
    fn test_sleep_releases_core_and_wakes() {
        let (_dir, kernel) = kernel(one_core_fcfs());
        kernel
            .submit_process("sleeper", 4096, Some("SLEEP 3; PRINT(\"done\")"))
            .unwrap();
        kernel.tick_once(); // dispatch
        kernel.tick_once(); // execute SLEEP, release core
        assert_eq!(
            kernel.get_process("sleeper").unwrap().status,
            ProcessStatus::Sleeping
        );
        let stats = kernel.vm_stats();
        assert_eq!(stats.running, 0);

        kernel.run_ticks(6);
        assert_eq!(
            kernel.get_process("sleeper").unwrap().status,
            ProcessStatus::Finished
        );
        let events = kernel.audit_log();
        assert!(events
            .iter()
            .any(|e| matches!(e, ScheduleEvent::Slept { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ScheduleEvent::Woken { .. })));
    }

    #[test]
    fn test_faulted_process_attach_message() {
        let (_dir, kernel) = kernel(one_core_fcfs());
        kernel
            .submit_process("crasher", 4096, Some("WRITE 0x200000 1"))
            .unwrap();
        kernel.run_ticks(3);

        let snapshot = kernel.get_process("crasher").unwrap();
        assert_eq!(snapshot.status, ProcessStatus::Faulted);
        assert_eq!(snapshot.fault.unwrap().address, 0x200000);

        let err = kernel.attach("crasher").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("memory access violation"));
        assert!(text.contains("0x200000 invalid."));
    }

    #[test]
    fn test_frames_released_after_reap() {
        let (_dir, kernel) = kernel(one_core_fcfs());
        kernel
            .submit_process("short", 4096, Some("DECLARE x 1; ADD x x 1"))
            .unwrap();
        kernel.run_ticks(5);
        assert!(kernel.drained());
        let stats = kernel.vm_stats();
        assert_eq!(stats.used_frames, 0);
        assert_eq!(stats.free_frames, stats.total_frames);
    }

    #[test]
    fn test_tick_accounting_balances() {
        let (_dir, kernel) = kernel(one_core_fcfs());
        kernel.run_ticks(10);
        let stats = kernel.vm_stats();
        assert_eq!(stats.active_ticks + stats.idle_ticks, stats.total_ticks);
        assert_eq!(stats.total_ticks, 10);
    }

    #[test]
    fn test_generation_toggle() {
        let (_dir, kernel) = kernel(one_core_fcfs());
        kernel.begin_generation();
        // The generator submits immediately, then every freq*250 ms.
        std::thread::sleep(std::time::Duration::from_millis(50));
        kernel.end_generation();
        let stats = kernel.vm_stats();
        assert!(stats.waiting >= 1, "generator submitted nothing");
    }

    #[test]
    fn test_shutdown_drains() {
        let (_dir, kernel) = kernel(one_core_fcfs());
        kernel
            .submit_process("job", 4096, Some("ADD x x 1; ADD x x 1"))
            .unwrap();
        kernel.start();
        kernel.shutdown();
        assert!(kernel.drained());
        assert_eq!(
            kernel.get_process("job").unwrap().status,
            ProcessStatus::Finished
        );
    }
}
