/*!
 * Lifecycle Manager
 * Fork variants, exit, wait/waitpid, and the process thread shell
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::{Channel, Pid, SlotId};
use crate::kernel::Kernel;
use crate::proc::handle::ProcHandle;
use crate::proc::resources::Resources;
use crate::proc::table::ProcBody;
use crate::proc::types::ProcState;
use log::{debug, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Panic payload used by `ProcHandle::exit` to unwind the process thread.
pub(crate) struct ExitRequest {
    pub status: i32,
}

/// Which fork variant is being performed.
pub(crate) enum ForkKind {
    /// Plain fork: the child re-runs the parent's saved image.
    Image,
    /// forkf: the child's resume point is forced to a new entry.
    Entry(ProcBody),
    /// A batch job: new entry plus a base priority for the UNIX policy.
    Batch { base_priority: i64, entry: ProcBody },
}

impl Kernel {
    /// Create a child of the process in `parent`: allocate a record,
    /// duplicate the address space and file references, copy the saved
    /// context (the child starts with a zeroed return value, i.e. a fresh
    /// run of its entry), link the parent, and mark it Runnable. Any
    /// failure rolls the partial child back to Unused.
    pub(crate) fn fork_from(
        self: &Arc<Self>,
        parent: SlotId,
        kind: ForkKind,
    ) -> KernelResult<Pid> {
        let now = self.clock.now();

        // Snapshot the parent image; the parent is Running, so its fields
        // are stable once the record lock is taken.
        let (entry, name, files) = {
            let rec = self.table.slot(parent).inner.lock();
            let entry = match &kind {
                ForkKind::Entry(body) | ForkKind::Batch { entry: body, .. } => {
                    Some(Arc::clone(body))
                }
                ForkKind::Image => rec.entry.clone(),
            };
            (
                entry,
                rec.name.clone(),
                rec.files.as_ref().map(Resources::dup),
            )
        };
        let entry = entry.ok_or(KernelError::InvalidArgument("parent has no image"))?;

        let (child, mut rec) = self.table.alloc(&self.pool, now)?;
        // Clone the parent address space into the fresh one. Locking the
        // parent under the child record is safe: record locks nest only
        // child-to-parent, and the fresh child has no parent link yet.
        {
            let parent_rec = self.table.slot(parent).inner.lock();
            let space = rec.space.as_mut().expect("alloc leaves an empty space");
            if let Some(parent_space) = parent_rec.space.as_ref() {
                if let Err(e) = space.copy_from(parent_space) {
                    drop(parent_rec);
                    self.table.free(&mut rec);
                    return Err(e);
                }
            }
        }
        rec.entry = Some(Arc::clone(&entry));
        rec.name = name;
        rec.files = files;
        if let ForkKind::Batch { base_priority, .. } = kind {
            rec.is_batch = true;
            rec.base_priority = base_priority;
            self.batch.lock().add_job();
        }
        let pid = rec.pid;
        drop(rec);

        {
            let mut parents = self.table.parents.lock();
            parents.set(child, Some(parent));
        }

        if spawn_process_thread(Arc::clone(self), child, pid, entry).is_err() {
            let mut parents = self.table.parents.lock();
            parents.set(child, None);
            let mut rec = self.table.slot(child).inner.lock();
            self.table.free(&mut rec);
            return Err(KernelError::OutOfMemory);
        }

        {
            let mut rec = self.table.slot(child).inner.lock();
            rec.state = ProcState::Runnable;
            rec.enqueued_at = self.clock.now();
        }
        debug!("fork: slot {} created child pid {}", parent, pid);
        Ok(pid)
    }

    /// Reap one exited child of `me`, matching `want` if given. Blocks on
    /// the caller's exit channel until a child exits; returns `NoChild`
    /// when no (matching) child exists and `Killed` when the caller was
    /// killed while waiting.
    pub(crate) fn wait_for_child(
        &self,
        me: SlotId,
        want: Option<Pid>,
    ) -> KernelResult<(Pid, i32)> {
        let mut parents = self.table.parents.lock();
        loop {
            let mut have_match = false;
            for (id, slot) in self.table.slots().iter().enumerate() {
                if parents.get(id) != Some(me) {
                    continue;
                }
                let mut rec = slot.inner.lock();
                if let Some(pid) = want {
                    if rec.pid != pid {
                        continue;
                    }
                }
                have_match = true;
                if rec.state == ProcState::Zombie {
                    // Wait out the CPU still finishing this child's last
                    // run accounting before tearing the record down.
                    while rec.on_cpu {
                        slot.cv.wait(&mut rec);
                    }
                    let pid = rec.pid;
                    let status = rec.xstate;
                    self.table.free(&mut rec);
                    parents.set(id, None);
                    debug!("wait: reaped pid {} (status {})", pid, status);
                    return Ok((pid, status));
                }
            }
            if !have_match {
                return Err(KernelError::NoChild);
            }
            if self.table.slot(me).inner.lock().killed {
                return Err(KernelError::Killed);
            }
            parents = self.sleep_on(me, Channel::of_slot(me), &self.table.parents, parents);
        }
    }

    /// Terminate the process in `me`. Never returns control to the process:
    /// the caller's thread ends after the final handoff. Fatal on init.
    pub(crate) fn do_exit(&self, me: SlotId, status: i32) {
        if me == self.init_slot() {
            panic!("init exiting");
        }

        // Close owned resources before becoming unreapable-in-progress.
        {
            let mut rec = self.table.slot(me).inner.lock();
            if let Some(mut files) = rec.files.take() {
                files.close_all();
            }
        }

        let mut parents = self.table.parents.lock();
        let parent = parents.get(me);
        let orphans = parents.reparent(me, self.init_slot());
        if orphans > 0 {
            self.wakeup(Channel::of_slot(self.init_slot()));
        }
        // The parent might be sleeping in wait().
        if let Some(parent_slot) = parent {
            self.wakeup(Channel::of_slot(parent_slot));
        }

        let slot = self.table.slot(me);
        let mut rec = slot.inner.lock();
        assert_eq!(rec.state, ProcState::Running, "exit from non-running process");
        let now = self.clock.now();
        rec.xstate = status;
        rec.state = ProcState::Zombie;
        rec.last_stop = now;
        rec.endtime = Some(now);
        if rec.is_batch {
            self.batch.lock().record_completion(now, rec.ctime);
        }
        drop(parents);

        debug!("exit: pid {} finished with status {}", rec.pid, status);
        // Final handoff; the thread never takes the CPU again.
        slot.cv.notify_all();
    }
}

/// Start the OS thread backing a process. The thread parks until the
/// scheduler dispatches the record, runs the body, and performs exit.
pub(crate) fn spawn_process_thread(
    kernel: Arc<Kernel>,
    slot_id: SlotId,
    pid: Pid,
    body: ProcBody,
) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name(format!("pid-{pid}"))
        .spawn(move || proc_shell(kernel, slot_id, pid, body))
        .map(drop)
}

fn proc_shell(kernel: Arc<Kernel>, slot_id: SlotId, pid: Pid, body: ProcBody) {
    // Park until the first dispatch, then stamp the first-run time.
    {
        let slot = kernel.table.slot(slot_id);
        let mut rec = slot.inner.lock();
        while rec.state != ProcState::Running {
            slot.cv.wait(&mut rec);
        }
        debug_assert_eq!(rec.pid, pid);
        rec.stime = Some(kernel.clock.now());
    }

    let handle = ProcHandle::new(Arc::clone(&kernel), slot_id, pid);
    let status = match catch_unwind(AssertUnwindSafe(|| body(&handle))) {
        Ok(status) => status,
        Err(payload) => match payload.downcast::<ExitRequest>() {
            Ok(request) => request.status,
            Err(_) => {
                warn!("pid {} body panicked; exiting with status -1", pid);
                -1
            }
        },
    };
    kernel.do_exit(slot_id, status);
}
