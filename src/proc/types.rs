/*!
 * Process Types
 * States, scheduling policies, and inspection records
 */

use crate::core::types::{Pid, Tick};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process state machine.
///
/// ```text
/// Unused --alloc--> Allocated --init done--> Runnable
/// Runnable --scheduled--> Running
/// Running --blocks--> Sleeping     Sleeping --woken--> Runnable
/// Running --yields--> Runnable
/// Running --exits--> Zombie        Zombie --reaped--> Unused
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcState {
    /// Free table slot; identity fields are unset.
    Unused,
    /// Allocated but not yet fully initialized.
    Allocated,
    /// Ready to run, waiting for a CPU.
    Runnable,
    /// Currently assigned to a CPU.
    Running,
    /// Blocked on a channel.
    Sleeping,
    /// Exited; waiting for the parent to reap the exit status.
    Zombie,
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcState::Unused => "unused",
            ProcState::Allocated => "alloc",
            ProcState::Runnable => "runble",
            ProcState::Running => "run",
            ProcState::Sleeping => "sleep",
            ProcState::Zombie => "zombie",
        };
        f.write_str(s)
    }
}

/// Scheduling policy, swappable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Non-preemptive first-come first-served table scan.
    Fcfs,
    /// Preemptive round-robin over the table scan order.
    RoundRobin,
    /// Non-preemptive shortest-job-first on the smoothed burst estimate.
    Sjf,
    /// Preemptive UNIX-style multilevel feedback on decayed CPU usage.
    Unix,
}

impl Policy {
    pub fn is_preemptive(self) -> bool {
        matches!(self, Policy::RoundRobin | Policy::Unix)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Policy::Fcfs => "fcfs",
            Policy::RoundRobin => "round_robin",
            Policy::Sjf => "sjf",
            Policy::Unix => "unix",
        };
        f.write_str(s)
    }
}

/// Point-in-time snapshot of one process, as reported by `proc_info`/`ps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessInfo {
    pub pid: Pid,
    /// Parent pid; `None` for the init process and unparented records.
    pub ppid: Option<Pid>,
    pub state: ProcState,
    pub name: String,
    /// Tick the record was allocated.
    pub ctime: Tick,
    /// Tick of the first dispatch, if the process has run yet.
    pub stime: Option<Tick>,
    /// Ticks from first dispatch until exit, or until now if still live.
    pub etime: Tick,
    pub memory_bytes: usize,
}
