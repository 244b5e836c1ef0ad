//! Unique identifiers for system entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a simulated process.
///
/// Process ids are monotonic integers handed out by the kernel at submission
/// time; they are never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(pub u64);

impl Pid {
    /// Creates a pid from its integer value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the integer value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a logical CPU core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CoreId(pub usize);

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a physical frame in the frame table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameIndex(pub usize);

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a page within a process's logical address space.
///
/// A page covers `frame_size` bytes; `PageIndex(addr / frame_size)` is the
/// page holding byte `addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageIndex(pub usize);

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_ordering_is_numeric() {
        assert!(Pid::new(2) < Pid::new(10));
    }

    #[test]
    fn test_pid_display() {
        assert_eq!(format!("{}", Pid::new(7)), "7");
    }

    #[test]
    fn test_ids_are_distinct_types() {
        // Compile-time property; keep a runtime sanity check on values.
        let core = CoreId(3);
        let frame = FrameIndex(3);
        assert_eq!(core.0, frame.0);
    }
}
