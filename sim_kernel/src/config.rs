//! System configuration: whitespace key-value lines, `#` comments.
//!
//! A missing or unreadable file is not fatal: the loader warns and continues
//! with defaults, as does any line it cannot make sense of.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown scheduler policy: {0}")]
    UnknownPolicy(String),
    #[error("bad value for {key}: {value}")]
    BadValue { key: String, value: String },
}

/// The active scheduling discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPolicy {
    Fcfs,
    RoundRobin,
}

impl SchedulerPolicy {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "fcfs" => Ok(SchedulerPolicy::Fcfs),
            "rr" => Ok(SchedulerPolicy::RoundRobin),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// All tunables, with the documented defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Number of logical cores (>= 1).
    pub num_cpu: usize,
    pub scheduler: SchedulerPolicy,
    /// Ticks per RR quantum; also the snapshot cadence when > 0.
    pub quantum_cycles: u32,
    /// Generator interval, units of 250 ms.
    pub batch_process_freq: u32,
    /// Inclusive instruction-count range for synthetic processes.
    pub min_ins: usize,
    pub max_ins: usize,
    /// Busy-wait after each instruction, milliseconds.
    pub delay_per_exec: u64,
    /// Total simulated memory, bytes.
    pub max_overall_mem: usize,
    /// Frame and page size, bytes.
    pub mem_per_frame: usize,
    /// Block reservation per process, bytes.
    pub mem_per_proc: usize,
    /// Inclusive memory-size range for synthetic processes.
    pub min_mem_per_proc: usize,
    pub max_mem_per_proc: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            num_cpu: 4,
            scheduler: SchedulerPolicy::Fcfs,
            quantum_cycles: 5,
            batch_process_freq: 1,
            min_ins: 1000,
            max_ins: 2000,
            delay_per_exec: 0,
            max_overall_mem: 16384,
            mem_per_frame: 16,
            mem_per_proc: 4096,
            min_mem_per_proc: 64,
            max_mem_per_proc: 65536,
        }
    }
}

impl SystemConfig {
    /// Loads configuration, falling back to defaults on any trouble.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(err) => {
                log::warn!(
                    "could not open {}: {}; using default values",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Parses config text; lines it cannot interpret are warned about and
    /// skipped.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            if let Err(err) = config.apply(key, value) {
                log::warn!("ignoring config line '{}': {}", line, err);
            }
        }
        config
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        // The scheduler value may be quoted in config files.
        let value = value.trim_matches('"');
        let bad = || ConfigError::BadValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "num-cpu" => self.num_cpu = value.parse().map_err(|_| bad())?,
            "scheduler" => self.scheduler = SchedulerPolicy::parse(value)?,
            "quantum-cycles" => self.quantum_cycles = value.parse().map_err(|_| bad())?,
            "batch-process-freq" => self.batch_process_freq = value.parse().map_err(|_| bad())?,
            "min-ins" => self.min_ins = value.parse().map_err(|_| bad())?,
            "max-ins" => self.max_ins = value.parse().map_err(|_| bad())?,
            "delay-per-exec" => self.delay_per_exec = value.parse().map_err(|_| bad())?,
            "max-overall-mem" => self.max_overall_mem = value.parse().map_err(|_| bad())?,
            "mem-per-frame" => self.mem_per_frame = value.parse().map_err(|_| bad())?,
            "mem-per-proc" => self.mem_per_proc = value.parse().map_err(|_| bad())?,
            "min-mem-per-proc" => self.min_mem_per_proc = value.parse().map_err(|_| bad())?,
            "max-mem-per-proc" => self.max_mem_per_proc = value.parse().map_err(|_| bad())?,
            other => log::warn!("unknown config key: {}", other),
        }
        Ok(())
    }
}
