//! The kernel facade: construction, threads, and the control surface.

use crate::config::SystemConfig;
use crate::generator::run_generator;
use crate::scheduler::Scheduler;
use crate::state::{KernelState, ScheduleEvent};
use core_types::{Pid, ProcessStatus};
use kernel_api::{
    KernelControl, KernelError, ProcessLine, ProcessSnapshot, UtilizationReport, VmStats,
};
use paging::BackingStore;
use process_image::{
    is_valid_memory_size, parse_script, Instruction, ProcessImage, ProgramGenerator, ProgramLimits,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// File names of persisted artifacts, relative to the output directory.
pub const BACKING_STORE_DATA_FILE: &str = "csopesy-backing-store-data.bin";
pub const BACKING_STORE_DUMP_FILE: &str = "csopesy-backing-store.txt";
pub const REPORT_FILE: &str = "csopesy-log.txt";

/// Seed used when the embedder does not supply one.
const DEFAULT_SEED: u64 = 0x5EED_0C50;

/// The simulator core.
///
/// Owns the shared state, the tick thread and the generator thread. The
/// shell drives it exclusively through [`KernelControl`] plus the inherent
/// lifecycle methods; tests skip the threads and call [`SimKernel::tick_once`]
/// for deterministic, tick-exact control.
pub struct SimKernel {
    state: Arc<KernelState>,
    scheduler: Arc<Mutex<Scheduler>>,
    programs: Arc<Mutex<ProgramGenerator>>,
    clock: Mutex<Option<JoinHandle<()>>>,
    generator: Mutex<Option<JoinHandle<()>>>,
}

impl SimKernel {
    /// Builds a kernel with the default generator seed.
    pub fn new(config: SystemConfig, output_dir: impl AsRef<Path>) -> Result<Self, KernelError> {
        Self::with_seed(config, output_dir, DEFAULT_SEED)
    }

    /// Builds a kernel with an explicit generator seed (deterministic runs).
    pub fn with_seed(
        config: SystemConfig,
        output_dir: impl AsRef<Path>,
        seed: u64,
    ) -> Result<Self, KernelError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).map_err(KernelError::io)?;
        let store = BackingStore::create(output_dir.join(BACKING_STORE_DATA_FILE))
            .map_err(|err| KernelError::Io(err.to_string()))?;
        let state = Arc::new(KernelState::new(config, output_dir, store));
        let scheduler = Arc::new(Mutex::new(Scheduler::new(Arc::clone(&state))));
        Ok(Self {
            state,
            scheduler,
            programs: Arc::new(Mutex::new(ProgramGenerator::new(seed))),
            clock: Mutex::new(None),
            generator: Mutex::new(None),
        })
    }

    /// Loads configuration (warning and defaulting as needed), constructs the
    /// subsystems and starts the tick thread.
    pub fn initialize(
        config_path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<Self, KernelError> {
        let kernel = Self::new(SystemConfig::load(config_path), output_dir)?;
        kernel.start();
        Ok(kernel)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.state.config
    }

    /// Starts the clock thread: one tick per millisecond until a requested
    /// shutdown finds every process terminal.
    pub fn start(&self) {
        let mut clock = self.clock.lock().expect("clock handle lock");
        if clock.is_some() {
            return;
        }
        let scheduler = Arc::clone(&self.scheduler);
        let state = Arc::clone(&self.state);
        *clock = Some(std::thread::spawn(move || loop {
            scheduler.lock().expect("scheduler lock").tick();
            if state.shutdown_requested.load(Ordering::SeqCst) && state.all_terminal() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }));
    }

    /// Runs exactly one pipeline pass. Test entry point; do not mix with a
    /// running clock thread.
    pub fn tick_once(&self) -> u64 {
        self.scheduler.lock().expect("scheduler lock").tick()
    }

    /// Runs `count` pipeline passes.
    pub fn run_ticks(&self, count: u64) {
        for _ in 0..count {
            self.tick_once();
        }
    }

    pub fn ticks(&self) -> u64 {
        self.state.tick_count()
    }

    /// Every scheduler decision so far.
    pub fn audit_log(&self) -> Vec<ScheduleEvent> {
        self.state.audit_snapshot()
    }

    pub fn output_dir(&self) -> &Path {
        &self.state.output_dir
    }

    /// True once every process is Finished or Faulted.
    pub fn drained(&self) -> bool {
        self.state.all_terminal()
    }

    /// Renders and writes the utilization report file.
    pub fn write_report(&self) -> Result<PathBuf, KernelError> {
        let text = self.utilization_report().render();
        let path = self.state.output_dir.join(REPORT_FILE);
        std::fs::write(&path, text).map_err(KernelError::io)?;
        Ok(path)
    }

    fn snapshot_of(&self, image: &ProcessImage) -> ProcessSnapshot {
        ProcessSnapshot {
            id: image.id(),
            name: image.name().to_string(),
            status: image.status(),
            assigned_core: image.assigned_core(),
            created: image.created(),
            current_line: image.pc(),
            total_instructions: image.instruction_count(),
            memory_size: image.memory_size(),
            logs: image.logs().to_vec(),
            fault: image.fault(),
        }
    }

    fn process_line(&self, image: &ProcessImage) -> ProcessLine {
        ProcessLine {
            name: image.name().to_string(),
            created: image.created(),
            core: image.assigned_core(),
            current_line: image.pc(),
            total_instructions: image.instruction_count(),
            sleeping: image.status() == ProcessStatus::Sleeping,
        }
    }
}

impl KernelControl for SimKernel {
    fn submit_process(
        &self,
        name: &str,
        memory_size: usize,
        script: Option<&str>,
    ) -> Result<Pid, KernelError> {
        if name.is_empty() {
            return Err(KernelError::InvalidCommand);
        }
        if !is_valid_memory_size(memory_size) {
            return Err(KernelError::InvalidMemoryAllocation);
        }
        let instructions: Vec<Instruction> = match script {
            Some(script) => parse_script(script).map_err(|_| KernelError::InvalidCommand)?,
            None => {
                let limits = ProgramLimits {
                    min_ins: self.state.config.min_ins,
                    max_ins: self.state.config.max_ins,
                    min_mem: memory_size,
                    max_mem: memory_size,
                };
                let (instructions, _) = self
                    .programs
                    .lock()
                    .expect("program generator lock")
                    .synthesize(name, &limits);
                instructions
            }
        };
        let pid = self.state.allocate_pid();
        submit_image(&self.state, pid, name.to_string(), memory_size, instructions)
    }

    fn begin_generation(&self) {
        if self.state.generating.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = Arc::clone(&self.state);
        let programs = Arc::clone(&self.programs);
        let mut generator = self.generator.lock().expect("generator handle lock");
        *generator = Some(std::thread::spawn(move || run_generator(state, programs)));
    }

    fn end_generation(&self) {
        self.state.generating.store(false, Ordering::SeqCst);
        if let Some(handle) = self.generator.lock().expect("generator handle lock").take() {
            let _ = handle.join();
        }
    }

    fn shutdown(&self) {
        self.end_generation();
        self.state.shutdown_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.clock.lock().expect("clock handle lock").take() {
            let _ = handle.join();
        }
    }

    fn list_by_status(&self, status: ProcessStatus) -> Vec<String> {
        let processes = self.state.processes.read().expect("process lock");
        processes
            .pids_sorted()
            .into_iter()
            .filter_map(|pid| processes.get(pid))
            .filter(|image| image.status() == status)
            .map(|image| image.name().to_string())
            .collect()
    }

    fn get_process(&self, name: &str) -> Option<ProcessSnapshot> {
        let processes = self.state.processes.read().expect("process lock");
        let pid = processes.pid_of(name)?;
        processes.get(pid).map(|image| self.snapshot_of(image))
    }

    fn attach(&self, name: &str) -> Result<ProcessSnapshot, KernelError> {
        let processes = self.state.processes.read().expect("process lock");
        let pid = processes
            .pid_of(name)
            .ok_or_else(|| KernelError::UnknownProcess(name.to_string()))?;
        let image = processes
            .get(pid)
            .ok_or_else(|| KernelError::UnknownProcess(name.to_string()))?;
        if let Some(fault) = image.fault() {
            return Err(KernelError::ProcessFaulted {
                name: image.name().to_string(),
                timestamp: fault.timestamp,
                address: fault.address,
            });
        }
        Ok(self.snapshot_of(image))
    }

    fn vm_stats(&self) -> VmStats {
        let (running, waiting, sleeping, finished) = {
            let processes = self.state.processes.read().expect("process lock");
            let count = |status: ProcessStatus| {
                processes
                    .iter()
                    .filter(|image| image.status() == status)
                    .count()
            };
            (
                count(ProcessStatus::Running),
                count(ProcessStatus::Waiting),
                count(ProcessStatus::Sleeping),
                count(ProcessStatus::Finished),
            )
        };
        let (active_ticks, idle_ticks, total_ticks) = {
            let cores = self.state.cores.lock().expect("core lock");
            (cores.active_ticks(), cores.idle_ticks(), cores.total_ticks())
        };
        let memory = self.state.memory.lock().expect("memory lock");
        let frame_size = memory.frame_size();
        VmStats {
            total_mem_bytes: self.state.config.max_overall_mem,
            used_mem_bytes: memory.used_frames() * frame_size,
            free_mem_bytes: memory.free_frames() * frame_size,
            frame_size,
            total_frames: memory.total_frames(),
            used_frames: memory.used_frames(),
            free_frames: memory.free_frames(),
            active_ticks,
            idle_ticks,
            total_ticks,
            paged_in: memory.paged_in(),
            paged_out: memory.paged_out(),
            running,
            waiting,
            sleeping,
            finished,
        }
    }

    fn utilization_report(&self) -> UtilizationReport {
        let processes = self.state.processes.read().expect("process lock");
        let mut running = Vec::new();
        let mut waiting = Vec::new();
        let mut finished = Vec::new();
        for pid in processes.pids_sorted() {
            let Some(image) = processes.get(pid) else {
                continue;
            };
            match image.status() {
                ProcessStatus::Running => running.push(self.process_line(image)),
                ProcessStatus::Waiting | ProcessStatus::Sleeping => {
                    waiting.push(self.process_line(image))
                }
                ProcessStatus::Finished | ProcessStatus::Faulted => {
                    finished.push(self.process_line(image))
                }
            }
        }
        drop(processes);

        let cores = self.state.cores.lock().expect("core lock");
        let total = cores.count();
        let used = cores.used_count();
        UtilizationReport {
            cpu_utilization: if total == 0 {
                0.0
            } else {
                used as f64 / total as f64 * 100.0
            },
            cores_used: used,
            cores_available: total - used,
            running,
            waiting,
            finished,
        }
    }

    fn generate_snapshot_now(&self) -> Result<(), KernelError> {
        let quantum = self.state.config.quantum_cycles as u64;
        let ticks = self.state.tick_count();
        let label = if quantum > 0 { ticks / quantum } else { ticks };
        let text = self
            .state
            .memory
            .lock()
            .expect("memory lock")
            .snapshot_text();
        let path = self
            .state
            .output_dir
            .join(format!("memory_stamp_{:02}.txt", label));
        std::fs::write(path, text).map_err(KernelError::io)
    }

    fn dump_backing_store(&self) -> Result<(), KernelError> {
        let text = self.state.memory.lock().expect("memory lock").dump_text();
        let path = self.state.output_dir.join(BACKING_STORE_DUMP_FILE);
        std::fs::write(path, text).map_err(KernelError::io)
    }
}

impl Drop for SimKernel {
    fn drop(&mut self) {
        // Stop background threads; the clock drains remaining work first.
        self.shutdown();
    }
}

/// Registers, stores and enqueues a ready-to-run image. Shared by user
/// submission and the generator.
pub(crate) fn submit_image(
    state: &KernelState,
    pid: Pid,
    name: String,
    memory_size: usize,
    instructions: Vec<Instruction>,
) -> Result<Pid, KernelError> {
    {
        let mut processes = state.processes.write().expect("process lock");
        if processes.contains_name(&name) {
            return Err(KernelError::DuplicateProcess(name));
        }
        processes.insert(ProcessImage::new(pid, name.clone(), memory_size, instructions));
    }
    // Register the address space before the process becomes dispatchable.
    state
        .memory
        .lock()
        .expect("memory lock")
        .register(pid, &name, memory_size);
    state.queues.lock().expect("queue lock").push_tail(pid);
    state.record(ScheduleEvent::Submitted {
        pid,
        tick: state.tick_count(),
    });
    Ok(pid)
}
