//! Per-core assignment, quantum countdown and tick accounting.

use core_types::{CoreId, Pid};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct CoreSlot {
    assigned: Option<Pid>,
    quantum_remaining: u32,
    active_ticks: u64,
    idle_ticks: u64,
}

/// Exactly `num_cores` slots; assignment is test-and-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreTable {
    slots: Vec<CoreSlot>,
}

impl CoreTable {
    pub fn new(num_cores: usize) -> Self {
        Self {
            slots: vec![CoreSlot::default(); num_cores],
        }
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Atomic test-and-set: succeeds iff the slot was empty.
    pub fn try_assign(&mut self, core: CoreId, pid: Pid) -> bool {
        let slot = &mut self.slots[core.0];
        if slot.assigned.is_some() {
            return false;
        }
        slot.assigned = Some(pid);
        true
    }

    /// Clears a slot; always succeeds.
    pub fn clear(&mut self, core: CoreId) {
        let slot = &mut self.slots[core.0];
        slot.assigned = None;
        slot.quantum_remaining = 0;
    }

    pub fn assigned(&self, core: CoreId) -> Option<Pid> {
        self.slots[core.0].assigned
    }

    /// Occupied cores in ascending id order.
    pub fn assignments(&self) -> Vec<(CoreId, Pid)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.assigned.map(|pid| (CoreId(id), pid)))
            .collect()
    }

    /// Idle cores in ascending id order.
    pub fn idle_cores(&self) -> Vec<CoreId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.assigned.is_none())
            .map(|(id, _)| CoreId(id))
            .collect()
    }

    pub fn used_count(&self) -> usize {
        self.slots.iter().filter(|s| s.assigned.is_some()).count()
    }

    pub fn set_quantum(&mut self, core: CoreId, quantum: u32) {
        self.slots[core.0].quantum_remaining = quantum;
    }

    pub fn quantum_remaining(&self, core: CoreId) -> u32 {
        self.slots[core.0].quantum_remaining
    }

    /// Subtracts one from every occupied slot's quantum.
    pub fn decrement_all_quanta(&mut self) {
        for slot in &mut self.slots {
            if slot.assigned.is_some() && slot.quantum_remaining > 0 {
                slot.quantum_remaining -= 1;
            }
        }
    }

    /// Occupied cores whose quantum has run out.
    pub fn expired(&self) -> Vec<(CoreId, Pid)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| match slot.assigned {
                Some(pid) if slot.quantum_remaining == 0 => Some((CoreId(id), pid)),
                _ => None,
            })
            .collect()
    }

    /// Accounts one tick on every core: active when occupied, idle otherwise.
    pub fn record_tick(&mut self) {
        for slot in &mut self.slots {
            if slot.assigned.is_some() {
                slot.active_ticks += 1;
            } else {
                slot.idle_ticks += 1;
            }
        }
    }

    pub fn active_ticks(&self) -> u64 {
        self.slots.iter().map(|s| s.active_ticks).sum()
    }

    pub fn idle_ticks(&self) -> u64 {
        self.slots.iter().map(|s| s.idle_ticks).sum()
    }

    pub fn total_ticks(&self) -> u64 {
        self.active_ticks() + self.idle_ticks()
    }
}
