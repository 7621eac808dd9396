/*!
 * Counting Semaphore
 * Built on a condition variable over the kernel sleep channels
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::proc::ProcHandle;
use crate::sync::condvar::CondVar;
use parking_lot::Mutex;

struct SemState {
    /// The count; negative under contention (`-value` blocked waiters).
    value: i64,
    /// Releases banked by `post` and not yet claimed by a woken waiter.
    releases: u64,
}

/// Counting semaphore. Each `post` under contention banks one release and
/// wakes one sleeper; the sleeper claims the release when it runs. A killed
/// waiter gives its count back and re-signals any banked release, so a
/// release handed to a waiter that is cancelled still reaches a live one.
pub struct Semaphore {
    state: Mutex<SemState>,
    cv: CondVar,
}

impl Semaphore {
    pub fn new(initial: i64) -> Self {
        Self {
            state: Mutex::new(SemState {
                value: initial,
                releases: 0,
            }),
            cv: CondVar::new(),
        }
    }

    /// P operation: take one count, blocking while it is negative. Returns
    /// `Killed` if the process is killed while blocked; the taken count is
    /// restored and never absorbs a release meant for another waiter.
    pub fn wait(&self, proc: &ProcHandle) -> KernelResult<()> {
        let mut state = self.state.lock();
        state.value -= 1;
        if state.value >= 0 {
            return Ok(());
        }
        loop {
            state = self.cv.wait(proc, &self.state, state);
            if proc.killed() {
                state.value += 1;
                let pass_on = state.releases > 0;
                drop(state);
                if pass_on {
                    self.cv.signal(proc.kernel());
                }
                return Err(KernelError::Killed);
            }
            if state.releases > 0 {
                state.releases -= 1;
                return Ok(());
            }
        }
    }

    /// V operation: give back one count; if anyone was blocked, bank a
    /// release and wake exactly one waiter to claim it.
    pub fn post(&self, kernel: &Kernel) {
        let mut state = self.state.lock();
        state.value += 1;
        let contended = state.value <= 0;
        if contended {
            state.releases += 1;
        }
        drop(state);
        if contended {
            self.cv.signal(kernel);
        }
    }

    /// Current count; negative means `-value` waiters are blocked.
    pub fn value(&self) -> i64 {
        self.state.lock().value
    }
}
