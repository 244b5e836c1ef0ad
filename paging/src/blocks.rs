//! First-fit block reservations over the simulated memory span.
//!
//! Reserving a block is the dispatcher's admission gate; it does not
//! allocate frames. Frames appear only on fault-in.

use core_types::Pid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Block {
    start: usize,
    size: usize,
    owner: Option<Pid>,
}

/// First-fit allocator with adjacent-free merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockList {
    blocks: Vec<Block>,
    total: usize,
}

impl BlockList {
    pub fn new(total_bytes: usize) -> Self {
        Self {
            blocks: vec![Block {
                start: 0,
                size: total_bytes,
                owner: None,
            }],
            total: total_bytes,
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.total
    }

    /// True if `pid` already holds a block.
    pub fn is_reserved(&self, pid: Pid) -> bool {
        self.blocks.iter().any(|b| b.owner == Some(pid))
    }

    /// Number of processes currently holding a block.
    pub fn reserved_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.owner.is_some()).count()
    }

    pub fn free_bytes(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.owner.is_none())
            .map(|b| b.size)
            .sum()
    }

    /// First-fit reservation of `size` bytes for `pid`.
    ///
    /// Idempotent: a pid that already holds a block keeps it. Returns false
    /// when no free block is large enough.
    pub fn reserve(&mut self, pid: Pid, size: usize) -> bool {
        if self.is_reserved(pid) {
            return true;
        }
        let position = self
            .blocks
            .iter()
            .position(|b| b.owner.is_none() && b.size >= size);
        let Some(index) = position else {
            return false;
        };

        let block = self.blocks[index];
        if block.size == size {
            self.blocks[index].owner = Some(pid);
        } else {
            self.blocks[index] = Block {
                start: block.start,
                size,
                owner: Some(pid),
            };
            self.blocks.insert(
                index + 1,
                Block {
                    start: block.start + size,
                    size: block.size - size,
                    owner: None,
                },
            );
        }
        true
    }

    /// Frees `pid`'s block, merging with free neighbors. Returns false when
    /// the pid held nothing.
    pub fn release(&mut self, pid: Pid) -> bool {
        let Some(index) = self.blocks.iter().position(|b| b.owner == Some(pid)) else {
            return false;
        };
        self.blocks[index].owner = None;
        self.merge_free();
        true
    }

    fn merge_free(&mut self) {
        self.blocks.sort_by_key(|b| b.start);
        let mut index = 0;
        while index + 1 < self.blocks.len() {
            let (current, next) = (self.blocks[index], self.blocks[index + 1]);
            if current.owner.is_none()
                && next.owner.is_none()
                && current.start + current.size == next.start
            {
                self.blocks[index].size += next.size;
                self.blocks.remove(index + 1);
            } else {
                index += 1;
            }
        }
    }
}
