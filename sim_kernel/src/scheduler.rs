//! The tick pipeline.
//!
//! Every tick runs six phases in a fixed order: execute, wake, reap,
//! preempt, dispatch, snapshot. Each phase completes before the next begins;
//! cores are visited in ascending id; observers may rely on tick N's full
//! effect being visible before tick N+1 starts.

use crate::config::SchedulerPolicy;
use crate::state::{KernelState, PagedMemory, ScheduleEvent};
use core_types::{Pid, ProcessStatus};
use process_image::{Interpreter, StepOutcome};
use std::collections::HashSet;
use std::sync::Arc;

/// Drives the pipeline over the shared kernel state.
///
/// The tick loop is the sole mutator of process state; queries elsewhere
/// take read snapshots.
pub struct Scheduler {
    state: Arc<KernelState>,
    interpreter: Interpreter,
    /// Terminal processes whose memory has already been released.
    reaped: HashSet<Pid>,
}

impl Scheduler {
    pub(crate) fn new(state: Arc<KernelState>) -> Self {
        let interpreter = Interpreter::new(state.config.delay_per_exec);
        Self {
            state,
            interpreter,
            reaped: HashSet::new(),
        }
    }

    /// Runs one full pipeline pass and returns the tick number it executed.
    pub fn tick(&mut self) -> u64 {
        let tick = self
            .state
            .ticks
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;

        self.phase_execute(tick);
        self.phase_wake(tick);
        self.phase_reap();
        self.phase_preempt(tick);
        self.phase_dispatch(tick);
        self.phase_accounting();
        self.phase_snapshot(tick);

        tick
    }

    /// Phase 1: one interpreter step per occupied core, ascending id.
    fn phase_execute(&mut self, tick: u64) {
        let assignments = self.state.cores.lock().expect("core lock").assignments();

        for (core, pid) in assignments {
            let mut processes = self.state.processes.write().expect("process lock");
            let Some(image) = processes.get_mut(pid) else {
                continue;
            };
            if image.status() != ProcessStatus::Running {
                continue;
            }

            let mut paged = PagedMemory::new(&self.state.memory, &self.state.store);
            let outcome = self.interpreter.step(image, &mut paged);

            match outcome {
                StepOutcome::Continue => {}
                StepOutcome::Slept => {
                    image.set_assigned_core(None);
                    self.state.cores.lock().expect("core lock").clear(core);
                    self.state.record(ScheduleEvent::Slept { pid, core, tick });
                }
                StepOutcome::Finished => {
                    image.set_assigned_core(None);
                    self.state.cores.lock().expect("core lock").clear(core);
                    self.state.record(ScheduleEvent::Finished { pid, core, tick });
                }
                StepOutcome::Faulted => {
                    image.set_assigned_core(None);
                    self.state.cores.lock().expect("core lock").clear(core);
                    self.state.record(ScheduleEvent::Faulted { pid, core, tick });
                }
            }
        }
    }

    /// Phase 2: advance sleepers; a counter reaching zero re-enqueues at the
    /// tail.
    fn phase_wake(&mut self, tick: u64) {
        let mut processes = self.state.processes.write().expect("process lock");
        let mut woken = Vec::new();
        for image in processes.iter_mut() {
            if image.status() == ProcessStatus::Sleeping && image.tick_sleep() {
                image.set_status(ProcessStatus::Waiting);
                woken.push(image.id());
            }
        }
        if woken.is_empty() {
            return;
        }
        let mut queues = self.state.queues.lock().expect("queue lock");
        for pid in woken {
            queues.push_tail(pid);
            self.state.record(ScheduleEvent::Woken { pid, tick });
        }
    }

    /// Phase 3: release block and frames of newly terminal processes.
    fn phase_reap(&mut self) {
        let newly_terminal: Vec<Pid> = {
            let processes = self.state.processes.read().expect("process lock");
            processes
                .iter()
                .filter(|image| image.status().is_terminal())
                .map(|image| image.id())
                .filter(|pid| !self.reaped.contains(pid))
                .collect()
        };
        if newly_terminal.is_empty() {
            return;
        }
        let mut memory = self.state.memory.lock().expect("memory lock");
        for pid in newly_terminal {
            memory.release(pid);
            self.reaped.insert(pid);
        }
    }

    /// Phase 4 (RR only): count quanta down and preempt expired cores.
    fn phase_preempt(&mut self, tick: u64) {
        if self.state.config.scheduler != SchedulerPolicy::RoundRobin {
            return;
        }
        let expired = {
            let mut cores = self.state.cores.lock().expect("core lock");
            cores.decrement_all_quanta();
            cores.expired()
        };
        if expired.is_empty() {
            return;
        }

        let mut processes = self.state.processes.write().expect("process lock");
        let mut queues = self.state.queues.lock().expect("queue lock");
        let mut cores = self.state.cores.lock().expect("core lock");
        for (core, pid) in expired {
            cores.clear(core);
            if let Some(image) = processes.get_mut(pid) {
                image.set_status(ProcessStatus::Waiting);
                image.set_assigned_core(None);
            }
            queues.push_tail(pid);
            self.state.record(ScheduleEvent::Preempted { pid, core, tick });
        }
    }

    /// Phase 5: fill idle cores from the ready queue head; a process that
    /// cannot reserve a block rotates to the tail and the core stays idle
    /// this tick.
    fn phase_dispatch(&mut self, tick: u64) {
        let idle = self.state.cores.lock().expect("core lock").idle_cores();

        for core in idle {
            let Some(pid) = self.state.queues.lock().expect("queue lock").pop_head() else {
                break;
            };

            let mut processes = self.state.processes.write().expect("process lock");
            let Some(image) = processes.get_mut(pid) else {
                continue;
            };
            if image.status().is_terminal() {
                continue;
            }

            let reserved = self
                .state
                .memory
                .lock()
                .expect("memory lock")
                .reserve_block(pid);
            if !reserved {
                self.state
                    .queues
                    .lock()
                    .expect("queue lock")
                    .push_tail(pid);
                self.state.record(ScheduleEvent::MemoryStarved { pid, tick });
                continue;
            }

            let mut cores = self.state.cores.lock().expect("core lock");
            if cores.try_assign(core, pid) {
                image.set_assigned_core(Some(core));
                image.set_status(ProcessStatus::Running);
                if self.state.config.scheduler == SchedulerPolicy::RoundRobin {
                    cores.set_quantum(core, self.state.config.quantum_cycles);
                }
                self.state.record(ScheduleEvent::Dispatched { pid, core, tick });
            } else {
                drop(cores);
                self.state
                    .queues
                    .lock()
                    .expect("queue lock")
                    .push_front(pid);
            }
        }
    }

    /// Core active/idle accounting for this tick.
    fn phase_accounting(&mut self) {
        self.state.cores.lock().expect("core lock").record_tick();
    }

    /// Phase 6: write a memory snapshot every `quantum_cycles` ticks.
    ///
    /// The text is assembled under the memory lock; the file write happens
    /// after release.
    fn phase_snapshot(&mut self, tick: u64) {
        let quantum = self.state.config.quantum_cycles as u64;
        if quantum == 0 || tick % quantum != 0 {
            return;
        }
        let label = tick / quantum;
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
        if let Err(err) = std::fs::write(&path, text) {
            log::warn!("could not write {}: {}", path.display(), err);
        }
    }
}
