//! Process lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a simulated process.
///
/// A process is created `Waiting`, may cycle through `Running`, `Waiting` and
/// `Sleeping` any number of times, and terminates exactly once to `Finished`
/// or `Faulted`. Terminal processes are retained for inspection but hold no
/// core, no block reservation and no frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStatus {
    /// Ready to run, sitting in a ready queue.
    Waiting,
    /// Assigned to exactly one core.
    Running,
    /// Blocked on a SLEEP instruction; not in any queue.
    Sleeping,
    /// Ran to completion.
    Finished,
    /// Terminated by a memory access violation.
    Faulted,
}

impl ProcessStatus {
    /// Returns true for the two terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Finished | ProcessStatus::Faulted)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessStatus::Waiting => "Waiting",
            ProcessStatus::Running => "Running",
            ProcessStatus::Sleeping => "Sleeping",
            ProcessStatus::Finished => "Finished",
            ProcessStatus::Faulted => "Faulted",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ProcessStatus::Finished.is_terminal());
        assert!(ProcessStatus::Faulted.is_terminal());
        assert!(!ProcessStatus::Waiting.is_terminal());
        assert!(!ProcessStatus::Running.is_terminal());
        assert!(!ProcessStatus::Sleeping.is_terminal());
    }
}
