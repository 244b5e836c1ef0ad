//! Physical frames and second-chance replacement state.

use core_types::{FrameIndex, PageIndex, Pid};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One physical frame.
///
/// A frame is free iff `owner` is `None`; the frame table's free list is kept
/// consistent with that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// The page currently held, if any.
    pub owner: Option<(Pid, PageIndex)>,
    /// Second-chance reference bit, set on every access.
    pub referenced: bool,
}

/// Ownership of all physical frames plus the CLOCK hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameTable {
    frames: Vec<Frame>,
    free: VecDeque<FrameIndex>,
    clock_hand: usize,
}

impl FrameTable {
    pub fn new(total_frames: usize) -> Self {
        Self {
            frames: vec![Frame::default(); total_frames],
            free: (0..total_frames).map(FrameIndex).collect(),
            clock_hand: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.frames.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn used_count(&self) -> usize {
        self.total() - self.free_count()
    }

    pub fn get(&self, index: FrameIndex) -> &Frame {
        &self.frames[index.0]
    }

    /// Takes a free frame, if any.
    pub fn pop_free(&mut self) -> Option<FrameIndex> {
        self.free.pop_front()
    }

    /// Installs `(pid, page)` into `frame`, reference bit set.
    pub fn install(&mut self, frame: FrameIndex, pid: Pid, page: PageIndex) {
        let slot = &mut self.frames[frame.0];
        slot.owner = Some((pid, page));
        slot.referenced = true;
    }

    /// Frees a frame and returns its previous owner.
    pub fn release(&mut self, frame: FrameIndex) -> Option<(Pid, PageIndex)> {
        let slot = &mut self.frames[frame.0];
        let owner = slot.owner.take();
        slot.referenced = false;
        if owner.is_some() {
            self.free.push_back(frame);
        }
        owner
    }

    /// Sets the reference bit; called on every successful access.
    pub fn mark_referenced(&mut self, frame: FrameIndex) {
        self.frames[frame.0].referenced = true;
    }

    /// Runs the CLOCK sweep and returns the victim frame and its owner.
    ///
    /// Each occupied frame gets one grace pass: a set reference bit is
    /// cleared and the hand moves on; a clear bit selects the victim. The
    /// sweep inspects at most `2 * total` frames, so it terminates even when
    /// every bit starts set. Returns `None` only when no frame is occupied.
    pub fn select_victim(&mut self) -> Option<(FrameIndex, (Pid, PageIndex))> {
        if self.frames.is_empty() || self.used_count() == 0 {
            return None;
        }
        for _ in 0..2 * self.frames.len() {
            let index = self.clock_hand;
            self.clock_hand = (self.clock_hand + 1) % self.frames.len();
            let frame = &mut self.frames[index];
            let owner = match frame.owner {
                Some(owner) => owner,
                None => continue,
            };
            if frame.referenced {
                frame.referenced = false;
            } else {
                return Some((FrameIndex(index), owner));
            }
        }
        None
    }

    /// Occupied frames in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (FrameIndex, &Frame)> {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.owner.is_some())
            .map(|(index, frame)| (FrameIndex(index), frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_list_conservation() {
        let mut table = FrameTable::new(3);
        assert_eq!(table.free_count(), 3);

        let frame = table.pop_free().unwrap();
        table.install(frame, Pid::new(1), PageIndex(0));
        assert_eq!(table.used_count() + table.free_count(), 3);
        assert_eq!(table.used_count(), 1);

        table.release(frame);
        assert_eq!(table.free_count(), 3);
    }

    #[test]
    fn test_clock_gives_second_chance() {
        let mut table = FrameTable::new(2);
        let f0 = table.pop_free().unwrap();
        let f1 = table.pop_free().unwrap();
        table.install(f0, Pid::new(1), PageIndex(0));
        table.install(f1, Pid::new(2), PageIndex(0));

        // Both referenced: the sweep clears f0 then f1, wraps, and evicts f0.
        let (victim, owner) = table.select_victim().unwrap();
        assert_eq!(victim, f0);
        assert_eq!(owner, (Pid::new(1), PageIndex(0)));
    }

    #[test]
    fn test_clock_prefers_unreferenced() {
        let mut table = FrameTable::new(2);
        let f0 = table.pop_free().unwrap();
        let f1 = table.pop_free().unwrap();
        table.install(f0, Pid::new(1), PageIndex(0));
        table.install(f1, Pid::new(2), PageIndex(1));

        // Simulate a recent access to frame 0 only.
        let (victim, _) = table.select_victim().unwrap(); // clears both, evicts f0
        assert_eq!(victim, f0);
        table.release(f0);
        let frame = table.pop_free().unwrap();
        table.install(frame, Pid::new(3), PageIndex(0));

        // f1 is unreferenced, the new frame is referenced: f1 goes first.
        let (victim, owner) = table.select_victim().unwrap();
        assert_eq!(victim, f1);
        assert_eq!(owner, (Pid::new(2), PageIndex(1)));
    }

    #[test]
    fn test_select_victim_on_empty_table() {
        let mut table = FrameTable::new(2);
        assert_eq!(table.select_victim(), None);
    }

    #[test]
    fn test_sweep_bound() {
        // All frames referenced: victim found within 2n inspections.
        let mut table = FrameTable::new(8);
        for pid in 0..8 {
            let frame = table.pop_free().unwrap();
            table.install(frame, Pid::new(pid), PageIndex(0));
        }
        assert!(table.select_victim().is_some());
    }
}
