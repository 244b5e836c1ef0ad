//! Memory access violation records.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record of the access violation that terminated a process.
///
/// Kept on the process after termination so inspection commands can report
/// when and where the violation happened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    /// When the violating instruction executed.
    pub timestamp: Timestamp,
    /// The offending byte address.
    pub address: u32,
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0x{:X}", self.timestamp, self.address)
    }
}
