/*!
 * Process Inspection
 * Accounting snapshots and the debugging dump
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::Pid;
use crate::kernel::Kernel;
use crate::mem::PAGE_SIZE;
use crate::proc::table::{ParentMap, ProcRecord};
use crate::proc::types::{ProcState, ProcessInfo};
use std::fmt::Write as _;

impl Kernel {
    /// Accounting snapshot for one process.
    pub fn proc_info(&self, pid: Pid) -> KernelResult<ProcessInfo> {
        let parents = self.table.parents.lock();
        for (id, slot) in self.table.slots().iter().enumerate() {
            let rec = slot.inner.lock();
            if rec.state != ProcState::Unused && rec.pid == pid {
                return Ok(self.snapshot(id, &rec, &parents));
            }
        }
        Err(KernelError::NotFound(pid))
    }

    /// Snapshot of every live process, in slot order.
    pub fn ps(&self) -> Vec<ProcessInfo> {
        let parents = self.table.parents.lock();
        let mut out = Vec::new();
        for (id, slot) in self.table.slots().iter().enumerate() {
            let rec = slot.inner.lock();
            if rec.state != ProcState::Unused {
                out.push(self.snapshot(id, &rec, &parents));
            }
        }
        out
    }

    fn snapshot(&self, id: usize, rec: &ProcRecord, parents: &ParentMap) -> ProcessInfo {
        let ppid = parents
            .get(id)
            .map(|parent| self.table.slot(parent).inner.lock().pid);
        let etime = match (rec.stime, rec.endtime) {
            (Some(stime), Some(endtime)) => endtime.saturating_sub(stime),
            (Some(stime), None) => self.clock.now().saturating_sub(stime),
            (None, _) => 0,
        };
        let memory_bytes = rec.space.as_ref().map_or(0, |s| s.size_bytes())
            + rec.ctx_page.as_ref().map_or(0, |_| PAGE_SIZE);
        ProcessInfo {
            pid: rec.pid,
            ppid,
            state: rec.state,
            name: rec.name.clone(),
            ctime: rec.ctime,
            stime: rec.stime,
            etime,
            memory_bytes,
        }
    }

    /// Best-effort table dump for debugging. Skips locks it cannot take
    /// immediately, so it is safe to call from anywhere, even with the
    /// table wedged.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (id, slot) in self.table.slots().iter().enumerate() {
            let Some(rec) = slot.inner.try_lock() else {
                let _ = writeln!(out, "slot {:2}: <locked>", id);
                continue;
            };
            if rec.state == ProcState::Unused {
                continue;
            }
            let _ = write!(out, "slot {:2}: pid {:4} {:6} {}", id, rec.pid, rec.state, rec.name);
            if let Some(chan) = rec.chan {
                let _ = write!(out, " chan={:#x}", chan.raw());
            }
            if rec.killed {
                let _ = write!(out, " killed");
            }
            let _ = writeln!(out);
        }
        out
    }
}
