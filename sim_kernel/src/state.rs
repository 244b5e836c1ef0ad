//! Shared kernel state and the paged-memory bridge.

use crate::config::SystemConfig;
use crate::core_table::CoreTable;
use crate::ready_queues::ReadyQueues;
use core_types::{CoreId, Pid, Word};
use paging::{BackingStore, MemoryError, MemoryManager};
use process_image::{AccessViolation, DataMemory, ProcessImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

/// One scheduler decision, recorded for inspection and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    Submitted { pid: Pid, tick: u64 },
    Dispatched { pid: Pid, core: CoreId, tick: u64 },
    Preempted { pid: Pid, core: CoreId, tick: u64 },
    Slept { pid: Pid, core: CoreId, tick: u64 },
    Woken { pid: Pid, tick: u64 },
    Finished { pid: Pid, core: CoreId, tick: u64 },
    Faulted { pid: Pid, core: CoreId, tick: u64 },
    /// A dispatch attempt rotated to the queue tail because no block was free.
    MemoryStarved { pid: Pid, tick: u64 },
}

/// The owning container for processes: id is primary, name is a secondary
/// index.
#[derive(Debug, Default)]
pub(crate) struct ProcessTable {
    by_id: HashMap<Pid, ProcessImage>,
    by_name: HashMap<String, Pid>,
}

impl ProcessTable {
    pub fn insert(&mut self, image: ProcessImage) {
        self.by_name.insert(image.name().to_string(), image.id());
        self.by_id.insert(image.id(), image);
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessImage> {
        self.by_id.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessImage> {
        self.by_id.get_mut(&pid)
    }

    pub fn pid_of(&self, name: &str) -> Option<Pid> {
        self.by_name.get(name).copied()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessImage> {
        self.by_id.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ProcessImage> {
        self.by_id.values_mut()
    }

    /// Pids in submission (id) order, for deterministic listings.
    pub fn pids_sorted(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.by_id.keys().copied().collect();
        pids.sort();
        pids
    }
}

/// Everything the tick loop, the generator and the query surface share.
///
/// Lock order: processes -> queues -> cores -> memory. Acquire in that order,
/// release freely; no lock is ever held across backing-store I/O.
pub(crate) struct KernelState {
    pub config: SystemConfig,
    pub output_dir: PathBuf,
    pub processes: RwLock<ProcessTable>,
    pub queues: Mutex<ReadyQueues>,
    pub cores: Mutex<CoreTable>,
    pub memory: Mutex<MemoryManager>,
    pub store: BackingStore,
    pub ticks: AtomicU64,
    next_pid: AtomicU64,
    pub shutdown_requested: AtomicBool,
    pub generating: AtomicBool,
    pub audit: Mutex<Vec<ScheduleEvent>>,
}

impl KernelState {
    pub fn new(config: SystemConfig, output_dir: PathBuf, store: BackingStore) -> Self {
        Self {
            processes: RwLock::new(ProcessTable::default()),
            queues: Mutex::new(ReadyQueues::new(config.scheduler)),
            cores: Mutex::new(CoreTable::new(config.num_cpu)),
            memory: Mutex::new(MemoryManager::new(
                config.max_overall_mem,
                config.mem_per_frame,
                config.mem_per_proc,
            )),
            store,
            ticks: AtomicU64::new(0),
            next_pid: AtomicU64::new(1),
            shutdown_requested: AtomicBool::new(false),
            generating: AtomicBool::new(false),
            audit: Mutex::new(Vec::new()),
            config,
            output_dir,
        }
    }

    pub fn allocate_pid(&self) -> Pid {
        Pid::new(self.next_pid.fetch_add(1, Ordering::SeqCst))
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn record(&self, event: ScheduleEvent) {
        self.audit.lock().expect("audit lock").push(event);
    }

    pub fn audit_snapshot(&self) -> Vec<ScheduleEvent> {
        self.audit.lock().expect("audit lock").clone()
    }

    pub fn all_terminal(&self) -> bool {
        self.processes
            .read()
            .expect("process lock")
            .iter()
            .all(|image| image.status().is_terminal())
    }
}

/// The interpreter's window onto paged memory.
///
/// Resolves page faults in a retry loop: residency is checked under the
/// memory lock, but page-in reads and page-out writes hit the backing store
/// with the lock released. CLOCK guarantees each retry makes progress, so the
/// loop terminates.
pub(crate) struct PagedMemory<'a> {
    memory: &'a Mutex<MemoryManager>,
    store: &'a BackingStore,
}

impl<'a> PagedMemory<'a> {
    pub fn new(memory: &'a Mutex<MemoryManager>, store: &'a BackingStore) -> Self {
        Self { memory, store }
    }

    fn ensure<R>(
        &self,
        pid: Pid,
        address: u32,
        mut op: impl FnMut(&mut MemoryManager) -> Result<R, MemoryError>,
    ) -> Result<R, AccessViolation> {
        loop {
            let (name, page) = {
                let mut memory = self.memory.lock().expect("memory lock");
                match op(&mut memory) {
                    Ok(value) => return Ok(value),
                    Err(MemoryError::OutOfRange { address }) => {
                        return Err(AccessViolation { address })
                    }
                    Err(MemoryError::UnknownProcess(_)) | Err(MemoryError::NoFrames) => {
                        return Err(AccessViolation { address })
                    }
                    Err(MemoryError::NotResident { page, .. }) => {
                        let name = memory
                            .process_name(pid)
                            .unwrap_or_default()
                            .to_string();
                        (name, page)
                    }
                }
            };

            // Page-in: store read happens with the memory lock released.
            let loaded = match self.store.read(&name, page) {
                Ok(entries) => entries,
                Err(err) => {
                    log::warn!("backing store read for {} page {} failed: {}", name, page, err);
                    None
                }
            };

            let staged = {
                let mut memory = self.memory.lock().expect("memory lock");
                match memory.fault_in(pid, page, loaded) {
                    Ok(staged) => staged,
                    Err(MemoryError::OutOfRange { address }) => {
                        return Err(AccessViolation { address })
                    }
                    Err(_) => return Err(AccessViolation { address }),
                }
            };

            // Page-out: flush the evicted page after releasing the lock.
            if let Some(evicted) = staged {
                if let Err(err) = self
                    .store
                    .write(&evicted.name, evicted.page, &evicted.entries)
                {
                    log::warn!(
                        "backing store write for {} page {} failed: {}",
                        evicted.name,
                        evicted.page,
                        err
                    );
                }
            }
        }
    }
}

impl DataMemory for PagedMemory<'_> {
    fn read(&mut self, pid: Pid, address: u32) -> Result<Word, AccessViolation> {
        self.ensure(pid, address, |memory| memory.try_read(pid, address))
    }

    fn write(&mut self, pid: Pid, address: u32, value: Word) -> Result<(), AccessViolation> {
        self.ensure(pid, address, |memory| memory.try_write(pid, address, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PageIndex;
    use tempfile::tempdir;

    fn state_with(config: SystemConfig) -> (tempfile::TempDir, KernelState) {
        let dir = tempdir().unwrap();
        let store = BackingStore::create(dir.path().join("store.bin")).unwrap();
        let state = KernelState::new(config, dir.path().to_path_buf(), store);
        (dir, state)
    }

    #[test]
    fn test_pids_are_monotonic() {
        let (_dir, state) = state_with(SystemConfig::default());
        assert_eq!(state.allocate_pid(), Pid::new(1));
        assert_eq!(state.allocate_pid(), Pid::new(2));
        assert_eq!(state.allocate_pid(), Pid::new(3));
    }

    #[test]
    fn test_paged_memory_round_trip_through_eviction() {
        // Two frames of 16 bytes force evictions across three pages.
        let config = SystemConfig {
            max_overall_mem: 32,
            mem_per_frame: 16,
            mem_per_proc: 32,
            ..SystemConfig::default()
        };
        let (_dir, state) = state_with(config);
        let pid = state.allocate_pid();
        state.memory.lock().unwrap().register(pid, "p01", 64);

        let mut paged = PagedMemory::new(&state.memory, &state.store);
        paged.write(pid, 0, Word(10)).unwrap();
        paged.write(pid, 16, Word(20)).unwrap();
        paged.write(pid, 32, Word(30)).unwrap(); // evicts a dirty page

        assert_eq!(paged.read(pid, 0).unwrap(), Word(10));
        assert_eq!(paged.read(pid, 16).unwrap(), Word(20));
        assert_eq!(paged.read(pid, 32).unwrap(), Word(30));

        let memory = state.memory.lock().unwrap();
        assert!(memory.paged_out() >= 1);
        assert!(memory.paged_in() >= 4);
        assert_eq!(memory.used_frames() + memory.free_frames(), 2);
    }

    #[test]
    fn test_paged_memory_out_of_range() {
        let (_dir, state) = state_with(SystemConfig::default());
        let pid = state.allocate_pid();
        state.memory.lock().unwrap().register(pid, "p01", 4096);

        let mut paged = PagedMemory::new(&state.memory, &state.store);
        let err = paged.write(pid, 0x200000, Word(1)).unwrap_err();
        assert_eq!(err.address, 0x200000);
    }

    #[test]
    fn test_evicted_page_lands_in_store() {
        let config = SystemConfig {
            max_overall_mem: 16,
            mem_per_frame: 16,
            mem_per_proc: 16,
            ..SystemConfig::default()
        };
        let (_dir, state) = state_with(config);
        let pid = state.allocate_pid();
        state.memory.lock().unwrap().register(pid, "p01", 64);

        let mut paged = PagedMemory::new(&state.memory, &state.store);
        paged.write(pid, 0, Word(7)).unwrap();
        paged.write(pid, 16, Word(8)).unwrap(); // evicts page 0

        let entries = state.store.read("p01", PageIndex(0)).unwrap().unwrap();
        assert_eq!(entries, vec![(0, 7)]);
    }
}
