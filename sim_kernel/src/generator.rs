//! Background source of synthetic processes.

use crate::kernel::submit_image;
use crate::state::KernelState;
use process_image::{ProgramGenerator, ProgramLimits};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Polling slice so `end_generation` takes effect promptly mid-interval.
const STOP_POLL: Duration = Duration::from_millis(10);

/// Generator loop: one synthetic process per interval until stopped.
///
/// The interval is `batch-process-freq` units of 250 ms. Names are `pNN`
/// from the shared monotonic pid counter.
pub(crate) fn run_generator(state: Arc<KernelState>, programs: Arc<Mutex<ProgramGenerator>>) {
    let interval = Duration::from_millis(state.config.batch_process_freq as u64 * 250);
    while state.generating.load(Ordering::SeqCst) {
        submit_synthetic(&state, &programs);

        let deadline = Instant::now() + interval;
        while Instant::now() < deadline {
            if !state.generating.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(STOP_POLL);
        }
    }
}

/// Creates and enqueues one synthetic process.
pub(crate) fn submit_synthetic(state: &KernelState, programs: &Mutex<ProgramGenerator>) {
    let pid = state.allocate_pid();
    let name = format!("p{:02}", pid.as_u64());
    let limits = ProgramLimits {
        min_ins: state.config.min_ins,
        max_ins: state.config.max_ins,
        min_mem: state.config.min_mem_per_proc,
        max_mem: state.config.max_mem_per_proc,
    };
    let (instructions, memory_size) = programs
        .lock()
        .expect("program generator lock")
        .synthesize(&name, &limits);
    if let Err(err) = submit_image(state, pid, name.clone(), memory_size, instructions) {
        // A user process may already hold this name; skip the slot.
        log::warn!("generator could not submit {}: {}", name, err);
    }
}
