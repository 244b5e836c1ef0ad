//! Errors surfaced to collaborators.

use core_types::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when driving the kernel.
///
/// Display text is user-facing; the shell prints it verbatim.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum KernelError {
    /// Submitted memory size is not a power of two in [64, 65536].
    #[error("invalid memory allocation")]
    InvalidMemoryAllocation,

    /// Submitted script failed to parse or has an instruction count outside [1, 50].
    #[error("invalid command")]
    InvalidCommand,

    /// A process with this name already exists.
    #[error("process {0} already exists")]
    DuplicateProcess(String),

    /// No process with this name.
    #[error("process {0} not found")]
    UnknownProcess(String),

    /// Attach attempted on a process terminated by an access violation.
    #[error(
        "Process {name} shut down due to memory access violation that occurred at {timestamp}. 0x{address:X} invalid."
    )]
    ProcessFaulted {
        name: String,
        timestamp: Timestamp,
        address: u32,
    },

    /// A snapshot, dump or report file could not be written.
    #[error("i/o failure: {0}")]
    Io(String),
}

impl KernelError {
    /// Wraps an io error, keeping only its message (errors stay serializable).
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_error_messages() {
        assert_eq!(
            KernelError::InvalidMemoryAllocation.to_string(),
            "invalid memory allocation"
        );
        assert_eq!(KernelError::InvalidCommand.to_string(), "invalid command");
    }

    #[test]
    fn test_faulted_attach_message() {
        let err = KernelError::ProcessFaulted {
            name: "p03".to_string(),
            timestamp: Timestamp::from_epoch_secs(0),
            address: 0x200000,
        };
        let text = err.to_string();
        assert!(text.starts_with("Process p03 shut down due to memory access violation"));
        assert!(text.ends_with("0x200000 invalid."));
    }
}
