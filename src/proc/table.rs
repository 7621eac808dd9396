/*!
 * Process Table
 * Fixed-capacity slot arena, record state machine, and parent links
 *
 * Locking discipline: each slot has its own mutex guarding the record; the
 * parent map is a separate process-wide lock (the wait lock) acquired
 * before any record lock; the pid counter and the memory pool are leaf
 * locks. A process holds at most its own record lock across the CPU
 * handoff.
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::{Channel, Pid, SlotId, Tick};
use crate::mem::{AddressSpace, MemoryPool, PageBlock};
use crate::proc::handle::ProcHandle;
use crate::proc::resources::Resources;
use crate::proc::types::ProcState;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;

/// A process body: the saved user image, rendered as the entry function the
/// process thread executes. Fork clones it; fork_entry replaces it.
pub type ProcBody = Arc<dyn Fn(&ProcHandle) -> i32 + Send + Sync + 'static>;

/// One process record. Guarded by its slot's mutex.
pub(crate) struct ProcRecord {
    pub state: ProcState,
    pub pid: Pid,
    pub name: String,
    /// Channel this record is sleeping on; `None` unless Sleeping.
    pub chan: Option<Channel>,
    /// Sticky cooperative-kill flag, observed at suspension points.
    pub killed: bool,
    /// Exit status; meaningful only once state is Zombie.
    pub xstate: i32,
    /// True from dispatch until the dispatching CPU finished its run
    /// accounting. Nobody may re-dispatch or reap the record while set.
    pub on_cpu: bool,

    // Saved execution context and owned collaborator resources.
    pub entry: Option<ProcBody>,
    pub ctx_page: Option<PageBlock>,
    pub space: Option<AddressSpace>,
    pub files: Option<Resources>,

    // Scheduling accounting.
    pub is_batch: bool,
    pub base_priority: i64,
    /// Decayed CPU-usage counter for the UNIX policy.
    pub cpu_usage: u64,
    /// Smoothed burst estimate for SJF; 0 means "no estimate yet".
    pub burst_est: u64,
    pub ctime: Tick,
    pub stime: Option<Tick>,
    pub endtime: Option<Tick>,
    /// Tick of the last block/yield/exit; the end of the current run slice.
    pub last_stop: Tick,
    /// Tick this record last became Runnable.
    pub enqueued_at: Tick,
    /// Tick the current run slice was dispatched.
    pub dispatched_at: Tick,
}

impl ProcRecord {
    fn unused() -> Self {
        Self {
            state: ProcState::Unused,
            pid: 0,
            name: String::new(),
            chan: None,
            killed: false,
            xstate: 0,
            on_cpu: false,
            entry: None,
            ctx_page: None,
            space: None,
            files: None,
            is_batch: false,
            base_priority: 0,
            cpu_usage: 0,
            burst_est: 0,
            ctime: 0,
            stime: None,
            endtime: None,
            last_stop: 0,
            enqueued_at: 0,
            dispatched_at: 0,
        }
    }
}

/// One table slot: the record plus the condvar used for the CPU handoff and
/// for reapers waiting out `on_cpu`.
pub(crate) struct Slot {
    pub inner: Mutex<ProcRecord>,
    pub cv: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            inner: Mutex::new(ProcRecord::unused()),
            cv: Condvar::new(),
        }
    }

    /// Hand the CPU back to the scheduler and block until re-dispatched.
    ///
    /// The caller has already moved the record out of Running and holds the
    /// record lock and nothing else. Switching while still Running is a
    /// protocol violation.
    pub(crate) fn give_up_cpu(&self, rec: &mut MutexGuard<'_, ProcRecord>) {
        if rec.state == ProcState::Running {
            panic!("switch: process still running");
        }
        self.cv.notify_all();
        while rec.state != ProcState::Running {
            self.cv.wait(rec);
        }
    }
}

/// Parent links, child slot -> parent slot. Guarded by the wait lock so no
/// child can be orphaned mid-scan; never an owning reference.
pub(crate) struct ParentMap {
    links: Vec<Option<SlotId>>,
}

impl ParentMap {
    pub fn get(&self, child: SlotId) -> Option<SlotId> {
        self.links[child]
    }

    pub fn set(&mut self, child: SlotId, parent: Option<SlotId>) {
        self.links[child] = parent;
    }

    /// Pass the dying process's children to init. Caller holds the wait
    /// lock. Returns how many children moved.
    pub fn reparent(&mut self, dying: SlotId, init: SlotId) -> usize {
        let mut moved = 0;
        for link in self.links.iter_mut() {
            if *link == Some(dying) {
                *link = Some(init);
                moved += 1;
            }
        }
        moved
    }
}

pub(crate) struct ProcTable {
    slots: Vec<Slot>,
    /// The wait lock; acquire before any record lock.
    pub parents: Mutex<ParentMap>,
    next_pid: Mutex<Pid>,
}

impl ProcTable {
    pub fn new(nproc: usize) -> Self {
        Self {
            slots: (0..nproc).map(|_| Slot::new()).collect(),
            parents: Mutex::new(ParentMap {
                links: vec![None; nproc],
            }),
            next_pid: Mutex::new(1),
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id]
    }

    fn alloc_pid(&self) -> Pid {
        let mut next = self.next_pid.lock();
        let pid = *next;
        *next += 1;
        pid
    }

    /// Find an Unused slot, assign a fresh pid, charge the context page,
    /// reset all accounting fields, and return the record still locked so
    /// the caller finishes initialization atomically. Leaves no partial
    /// record behind on failure.
    pub fn alloc<'a>(
        &'a self,
        pool: &Arc<MemoryPool>,
        now: Tick,
    ) -> KernelResult<(SlotId, MutexGuard<'a, ProcRecord>)> {
        for (id, slot) in self.slots.iter().enumerate() {
            let mut rec = slot.inner.lock();
            if rec.state != ProcState::Unused {
                continue;
            }
            let ctx_page = match pool.alloc(1) {
                Ok(block) => block,
                Err(e) => {
                    *rec = ProcRecord::unused();
                    return Err(e);
                }
            };
            *rec = ProcRecord::unused();
            rec.pid = self.alloc_pid();
            rec.state = ProcState::Allocated;
            rec.ctx_page = Some(ctx_page);
            rec.space = Some(AddressSpace::empty(pool));
            rec.ctime = now;
            rec.enqueued_at = now;
            return Ok((id, rec));
        }
        Err(KernelError::TableFull)
    }

    /// Release everything a record owns and return the slot to Unused. The
    /// caller holds the record lock; this is the only path back to Unused.
    pub fn free(&self, rec: &mut ProcRecord) {
        if let Some(files) = rec.files.as_mut() {
            files.close_all();
        }
        *rec = ProcRecord::unused();
    }
}
