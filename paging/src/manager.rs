//! Demand paging: page tables, fault handling, reservations, counters.

use crate::blocks::BlockList;
use crate::frame::FrameTable;
use core_types::{FrameIndex, PageIndex, Pid, Timestamp, Word};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("no such process: {0}")]
    UnknownProcess(Pid),
    #[error("address 0x{address:X} outside the address space")]
    OutOfRange { address: u32 },
    #[error("page {page} of process {pid} is not resident")]
    NotResident { pid: Pid, page: PageIndex },
    #[error("no frames configured")]
    NoFrames,
}

/// A page-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    pub frame: FrameIndex,
    pub valid: bool,
    pub dirty: bool,
}

/// Page contents staged for the backing store.
///
/// Produced under the memory lock by an eviction; the caller appends it to
/// the store after releasing the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictedPage {
    pub name: String,
    pub page: PageIndex,
    pub entries: Vec<(u32, u16)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProcessMemory {
    name: String,
    memory_size: usize,
    page_table: BTreeMap<usize, PageEntry>,
    /// Word values of resident pages only; evicted values travel through the
    /// backing store.
    resident: HashMap<u32, Word>,
}

/// The paged virtual memory subsystem.
///
/// Everything here mutates under the caller's memory lock. File I/O never
/// happens inside: fault-in takes pre-loaded page contents and hands back an
/// optional [`EvictedPage`] to flush.
#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryManager {
    frame_size: usize,
    mem_per_proc: usize,
    frames: FrameTable,
    blocks: BlockList,
    procs: HashMap<Pid, ProcessMemory>,
    paged_in: u64,
    paged_out: u64,
}

impl MemoryManager {
    pub fn new(max_overall_mem: usize, frame_size: usize, mem_per_proc: usize) -> Self {
        let total_frames = if frame_size == 0 {
            0
        } else {
            max_overall_mem / frame_size
        };
        Self {
            frame_size,
            mem_per_proc,
            frames: FrameTable::new(total_frames),
            blocks: BlockList::new(max_overall_mem),
            procs: HashMap::new(),
            paged_in: 0,
            paged_out: 0,
        }
    }

    /// Registers a process's address space. Called once at submission.
    pub fn register(&mut self, pid: Pid, name: &str, memory_size: usize) {
        self.procs.insert(
            pid,
            ProcessMemory {
                name: name.to_string(),
                memory_size,
                page_table: BTreeMap::new(),
                resident: HashMap::new(),
            },
        );
    }

    pub fn process_name(&self, pid: Pid) -> Option<&str> {
        self.procs.get(&pid).map(|p| p.name.as_str())
    }

    /// Best-effort admission gate: reserves `mem-per-proc` bytes first-fit.
    ///
    /// Idempotent for a process that already holds a block. No frames are
    /// allocated here; they appear on fault-in.
    pub fn reserve_block(&mut self, pid: Pid) -> bool {
        self.blocks.reserve(pid, self.mem_per_proc)
    }

    /// Releases a terminated process's block and frames.
    ///
    /// Page-table entries stay behind, invalidated, for inspection; resident
    /// values are dropped.
    pub fn release(&mut self, pid: Pid) {
        self.blocks.release(pid);
        if let Some(proc) = self.procs.get_mut(&pid) {
            for entry in proc.page_table.values_mut() {
                if entry.valid {
                    self.frames.release(entry.frame);
                    entry.valid = false;
                    entry.dirty = false;
                }
            }
            proc.resident.clear();
        }
    }

    /// The page holding byte `address`.
    pub fn page_of(&self, address: u32) -> PageIndex {
        PageIndex(address as usize / self.frame_size)
    }

    /// Reads a word, requiring residency. Marks the frame referenced.
    pub fn try_read(&mut self, pid: Pid, address: u32) -> Result<Word, MemoryError> {
        let frame = self.resident_frame(pid, address)?;
        self.frames.mark_referenced(frame);
        let proc = self.procs.get(&pid).expect("checked above");
        Ok(proc.resident.get(&address).copied().unwrap_or_default())
    }

    /// Writes a word, requiring residency. Marks the frame referenced and the
    /// page dirty.
    pub fn try_write(&mut self, pid: Pid, address: u32, value: Word) -> Result<(), MemoryError> {
        let frame = self.resident_frame(pid, address)?;
        self.frames.mark_referenced(frame);
        let page = self.page_of(address);
        let proc = self.procs.get_mut(&pid).expect("checked above");
        proc.resident.insert(address, value);
        if let Some(entry) = proc.page_table.get_mut(&page.0) {
            entry.dirty = true;
        }
        Ok(())
    }

    fn resident_frame(&self, pid: Pid, address: u32) -> Result<FrameIndex, MemoryError> {
        let proc = self
            .procs
            .get(&pid)
            .ok_or(MemoryError::UnknownProcess(pid))?;
        if address as usize >= proc.memory_size {
            return Err(MemoryError::OutOfRange { address });
        }
        let page = self.page_of(address);
        match proc.page_table.get(&page.0) {
            Some(entry) if entry.valid => Ok(entry.frame),
            _ => Err(MemoryError::NotResident { pid, page }),
        }
    }

    /// Installs `page` for `pid`, evicting a victim if no frame is free.
    ///
    /// `loaded` is the page's previous contents read from the backing store
    /// (outside the memory lock) or `None` for a first touch. Returns the
    /// victim page staged for the store, if the victim was dirty or held
    /// values. Returns `Ok(None)` without effect when the page is already
    /// resident.
    pub fn fault_in(
        &mut self,
        pid: Pid,
        page: PageIndex,
        loaded: Option<Vec<(u32, u16)>>,
    ) -> Result<Option<EvictedPage>, MemoryError> {
        if self.frames.total() == 0 {
            return Err(MemoryError::NoFrames);
        }
        {
            let proc = self
                .procs
                .get(&pid)
                .ok_or(MemoryError::UnknownProcess(pid))?;
            let first_byte = page.0 * self.frame_size;
            if first_byte >= proc.memory_size {
                return Err(MemoryError::OutOfRange {
                    address: first_byte as u32,
                });
            }
            if matches!(proc.page_table.get(&page.0), Some(entry) if entry.valid) {
                return Ok(None);
            }
        }

        let mut staged = None;
        let frame = match self.frames.pop_free() {
            Some(frame) => frame,
            None => {
                let (frame, (victim_pid, victim_page)) =
                    self.frames.select_victim().ok_or(MemoryError::NoFrames)?;
                staged = self.evict(victim_pid, victim_page);
                frame
            }
        };

        self.frames.install(frame, pid, page);
        let frame_size = self.frame_size;
        let proc = self.procs.get_mut(&pid).expect("registered above");
        proc.page_table.insert(
            page.0,
            PageEntry {
                frame,
                valid: true,
                dirty: false,
            },
        );
        if let Some(entries) = loaded {
            for (address, value) in entries {
                if (address as usize) < proc.memory_size
                    && address as usize / frame_size == page.0
                {
                    proc.resident.insert(address, Word(value));
                }
            }
        }
        self.paged_in += 1;
        Ok(staged)
    }

    /// Pulls the victim's values out of residency and invalidates its page
    /// table entry. A clean page with no stored values leaves no record.
    fn evict(&mut self, victim_pid: Pid, victim_page: PageIndex) -> Option<EvictedPage> {
        let frame_size = self.frame_size;
        let proc = self.procs.get_mut(&victim_pid)?;
        let dirty = proc
            .page_table
            .get(&victim_page.0)
            .map(|entry| entry.dirty)
            .unwrap_or(false);

        let low = (victim_page.0 * frame_size) as u32;
        let high = ((victim_page.0 + 1) * frame_size) as u32;
        let mut entries: Vec<(u32, u16)> = proc
            .resident
            .iter()
            .filter(|(addr, _)| **addr >= low && **addr < high)
            .map(|(addr, value)| (*addr, value.value()))
            .collect();
        entries.sort_unstable_by_key(|(addr, _)| *addr);
        proc.resident.retain(|addr, _| *addr < low || *addr >= high);

        if let Some(entry) = proc.page_table.get_mut(&victim_page.0) {
            entry.valid = false;
            entry.dirty = false;
        }

        if dirty || !entries.is_empty() {
            self.paged_out += 1;
            Some(EvictedPage {
                name: proc.name.clone(),
                page: victim_page,
                entries,
            })
        } else {
            None
        }
    }

    // Counters: monotone, read-only from outside.

    pub fn paged_in(&self) -> u64 {
        self.paged_in
    }

    pub fn paged_out(&self) -> u64 {
        self.paged_out
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn total_frames(&self) -> usize {
        self.frames.total()
    }

    pub fn used_frames(&self) -> usize {
        self.frames.used_count()
    }

    pub fn free_frames(&self) -> usize {
        self.frames.free_count()
    }

    /// Processes currently holding a block reservation.
    pub fn reserved_count(&self) -> usize {
        self.blocks.reserved_count()
    }

    /// Resident page count per process, for the per-process memory listing.
    pub fn resident_pages(&self) -> Vec<(String, usize)> {
        let mut rows: Vec<(String, usize)> = self
            .procs
            .values()
            .map(|proc| {
                (
                    proc.name.clone(),
                    proc.page_table.values().filter(|e| e.valid).count(),
                )
            })
            .filter(|(_, pages)| *pages > 0)
            .collect();
        rows.sort();
        rows
    }

    /// The frame owning `(pid, page)`, if resident. Test hook for the
    /// page-table/frame-table agreement property.
    pub fn frame_of(&self, pid: Pid, page: PageIndex) -> Option<FrameIndex> {
        self.procs.get(&pid).and_then(|proc| {
            proc.page_table
                .get(&page.0)
                .filter(|entry| entry.valid)
                .map(|entry| entry.frame)
        })
    }

    /// Owner of a frame, as the frame table sees it.
    pub fn frame_owner(&self, frame: FrameIndex) -> Option<(Pid, PageIndex)> {
        self.frames.get(frame).owner
    }

    /// Human-readable frame listing for `memory_stamp_NN.txt`.
    pub fn snapshot_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Timestamp: {}", Timestamp::now());
        let _ = writeln!(
            out,
            "Frames: {} used / {} total ({} free), frame size {} bytes",
            self.used_frames(),
            self.total_frames(),
            self.free_frames(),
            self.frame_size
        );
        let _ = writeln!(
            out,
            "Paged in: {}  Paged out: {}",
            self.paged_in, self.paged_out
        );
        let _ = writeln!(out);
        for (index, frame) in self.frames.occupied() {
            let (pid, page) = frame.owner.expect("occupied");
            let name = self
                .process_name(pid)
                .unwrap_or("?")
                .to_string();
            let _ = writeln!(
                out,
                "Frame {:03}: {} page {} referenced={}",
                index.0,
                name,
                page,
                if frame.referenced { 1 } else { 0 }
            );
        }
        out
    }

    /// Human-readable page-table dump for the backing-store text file.
    pub fn dump_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Backing store dump {}", Timestamp::now());
        let mut pids: Vec<&Pid> = self.procs.keys().collect();
        pids.sort();
        for pid in pids {
            let proc = &self.procs[pid];
            let _ = writeln!(out, "\nProcess {} (pid {}):", proc.name, pid);
            if proc.page_table.is_empty() {
                let _ = writeln!(out, "  no pages touched");
                continue;
            }
            for (page, entry) in &proc.page_table {
                if entry.valid {
                    let _ = writeln!(
                        out,
                        "  page {}: resident (frame {}{})",
                        page,
                        entry.frame,
                        if entry.dirty { ", dirty" } else { "" }
                    );
                } else {
                    let _ = writeln!(out, "  page {}: swapped out", page);
                }
            }
        }
        out
    }
}
