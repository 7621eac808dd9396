/*!
 * Process Handle
 * The in-process view of the kernel: the syscall surface a body runs against
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::{Channel, Pid, SlotId, Tick};
use crate::kernel::Kernel;
use crate::proc::batch::BatchReport;
use crate::proc::lifecycle::{ExitRequest, ForkKind};
use crate::proc::types::{ProcState, ProcessInfo};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Handle passed to every process body. All blocking calls go through the
/// record's handoff protocol, so a body must only touch the kernel through
/// its own handle.
pub struct ProcHandle {
    kernel: Arc<Kernel>,
    slot: SlotId,
    pid: Pid,
}

impl ProcHandle {
    pub(crate) fn new(kernel: Arc<Kernel>, slot: SlotId, pid: Pid) -> Self {
        Self { kernel, slot, pid }
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Pid of the current parent; `None` only for init.
    pub fn ppid(&self) -> Option<Pid> {
        let parents = self.kernel.table.parents.lock();
        let parent = parents.get(self.slot)?;
        Some(self.kernel.table.slot(parent).inner.lock().pid)
    }

    /// Create a child that re-runs this process's image.
    pub fn fork(&self) -> KernelResult<Pid> {
        self.kernel.fork_from(self.slot, ForkKind::Image)
    }

    /// Create a child that starts at `entry` instead of the parent's image.
    pub fn fork_entry<F>(&self, entry: F) -> KernelResult<Pid>
    where
        F: Fn(&ProcHandle) -> i32 + Send + Sync + 'static,
    {
        self.kernel
            .fork_from(self.slot, ForkKind::Entry(Arc::new(entry)))
    }

    /// Create a batch child with the given base priority; it competes under
    /// SJF/UNIX scheduling and is aggregated into the batch report.
    pub fn fork_batch<F>(&self, base_priority: i64, entry: F) -> KernelResult<Pid>
    where
        F: Fn(&ProcHandle) -> i32 + Send + Sync + 'static,
    {
        self.kernel.fork_from(
            self.slot,
            ForkKind::Batch {
                base_priority,
                entry: Arc::new(entry),
            },
        )
    }

    /// Terminate this process with `status`. Never returns.
    pub fn exit(&self, status: i32) -> ! {
        std::panic::panic_any(ExitRequest { status })
    }

    /// Block until any child exits; returns its pid and exit status.
    pub fn wait(&self) -> KernelResult<(Pid, i32)> {
        self.kernel.wait_for_child(self.slot, None)
    }

    /// Block until the child with `pid` exits; returns its exit status.
    pub fn waitpid(&self, pid: Pid) -> KernelResult<i32> {
        self.kernel
            .wait_for_child(self.slot, Some(pid))
            .map(|(_, status)| status)
    }

    /// Voluntarily give up the CPU and go back to the run queue.
    pub fn yield_now(&self) {
        let slot = self.kernel.table.slot(self.slot);
        let mut rec = slot.inner.lock();
        assert_eq!(rec.state, ProcState::Running, "yield from non-running process");
        let now = self.kernel.clock.now();
        rec.cpu_usage += self.kernel.cfg.cpu_charge;
        rec.state = ProcState::Runnable;
        rec.last_stop = now;
        rec.enqueued_at = now;
        slot.give_up_cpu(&mut rec);
    }

    /// Sleep until at least `n` ticks have elapsed. Returns `Killed` if the
    /// process is killed while waiting.
    pub fn sleep_ticks(&self, n: Tick) -> KernelResult<()> {
        let tick_lock = self.kernel.clock.mutex();
        let mut ticks = tick_lock.lock();
        let t0 = *ticks;
        while *ticks - t0 < n {
            if self.killed() {
                return Err(KernelError::Killed);
            }
            ticks = self
                .kernel
                .sleep_on(self.slot, Channel::TICKS, tick_lock, ticks);
        }
        Ok(())
    }

    /// Atomically release `guard`, sleep on `chan`, and reacquire `lock`.
    /// Building block for the condition-variable primitives; callers loop
    /// on their predicate.
    pub fn sleep_on<'a, T>(
        &self,
        chan: Channel,
        lock: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
    ) -> MutexGuard<'a, T> {
        self.kernel.sleep_on(self.slot, chan, lock, guard)
    }

    /// Whether a kill has been requested for this process.
    pub fn killed(&self) -> bool {
        self.kernel.table.slot(self.slot).inner.lock().killed
    }

    /// Snapshot of this process's own accounting.
    pub fn info(&self) -> KernelResult<ProcessInfo> {
        self.kernel.proc_info(self.pid)
    }

    /// Wait until every counted batch job has exited, then drain the
    /// aggregates into a report. Returns `Killed` if this process is
    /// killed while waiting.
    pub fn batch_report(&self) -> KernelResult<BatchReport> {
        loop {
            {
                let mut batch = self.kernel.batch.lock();
                if batch.quiesced() {
                    return Ok(batch.take_report());
                }
            }
            self.sleep_ticks(1)?;
        }
    }
}
