//! Ready queues: an FCFS queue and a round-robin deque.
//!
//! Only the queue matching the configured policy is used in a run; both sit
//! behind the single queue lock. FIFO order is strict; a memory-starved
//! process rotates to the tail rather than blocking the head.

use crate::config::SchedulerPolicy;
use core_types::Pid;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyQueues {
    policy: SchedulerPolicy,
    fcfs: VecDeque<Pid>,
    round_robin: VecDeque<Pid>,
}

impl ReadyQueues {
    pub fn new(policy: SchedulerPolicy) -> Self {
        Self {
            policy,
            fcfs: VecDeque::new(),
            round_robin: VecDeque::new(),
        }
    }

    fn active(&mut self) -> &mut VecDeque<Pid> {
        match self.policy {
            SchedulerPolicy::Fcfs => &mut self.fcfs,
            SchedulerPolicy::RoundRobin => &mut self.round_robin,
        }
    }

    pub fn push_tail(&mut self, pid: Pid) {
        self.active().push_back(pid);
    }

    /// Used when a core assignment fails after the pop; the process keeps its
    /// place at the head.
    pub fn push_front(&mut self, pid: Pid) {
        self.active().push_front(pid);
    }

    pub fn pop_head(&mut self) -> Option<Pid> {
        self.active().pop_front()
    }

    pub fn len(&self) -> usize {
        match self.policy {
            SchedulerPolicy::Fcfs => self.fcfs.len(),
            SchedulerPolicy::RoundRobin => self.round_robin.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue contents in dispatch order.
    pub fn snapshot(&self) -> Vec<Pid> {
        match self.policy {
            SchedulerPolicy::Fcfs => self.fcfs.iter().copied().collect(),
            SchedulerPolicy::RoundRobin => self.round_robin.iter().copied().collect(),
        }
    }
}
