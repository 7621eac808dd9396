/*!
 * Bounded Buffers
 * Two producer-consumer buffers: one on per-cell condition variables, one
 * on semaphores
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::proc::ProcHandle;
use crate::sync::condvar::CondVar;
use crate::sync::semaphore::Semaphore;
use parking_lot::Mutex;

/// Capacity of both buffer flavors.
pub const BUFFER_SIZE: usize = 20;

struct CellState {
    value: i64,
    full: bool,
}

/// One buffer cell with its own lock and its own insert/delete condvars, so
/// a producer blocked on cell i never contends with traffic on cell j.
struct Cell {
    state: Mutex<CellState>,
    inserted: CondVar,
    deleted: CondVar,
}

/// Bounded FIFO buffer on condition variables. Producers and consumers
/// claim a cell index from the shared cursors, then rendezvous on that
/// cell alone.
pub struct CondBuffer {
    cells: Vec<Cell>,
    head: Mutex<usize>,
    tail: Mutex<usize>,
}

impl CondBuffer {
    pub fn new() -> Self {
        Self {
            cells: (0..BUFFER_SIZE)
                .map(|_| Cell {
                    state: Mutex::new(CellState {
                        value: 0,
                        full: false,
                    }),
                    inserted: CondVar::new(),
                    deleted: CondVar::new(),
                })
                .collect(),
            head: Mutex::new(0),
            tail: Mutex::new(0),
        }
    }

    /// Insert `value`, blocking while the claimed cell is still full.
    pub fn produce(&self, proc: &ProcHandle, value: i64) -> KernelResult<()> {
        let index = {
            let mut head = self.head.lock();
            let index = *head;
            *head = (*head + 1) % BUFFER_SIZE;
            index
        };
        let cell = &self.cells[index];
        let mut state = cell.state.lock();
        while state.full {
            state = cell.deleted.wait(proc, &cell.state, state);
            if proc.killed() {
                return Err(KernelError::Killed);
            }
        }
        state.value = value;
        state.full = true;
        drop(state);
        cell.inserted.signal(proc.kernel());
        Ok(())
    }

    /// Remove the oldest value, blocking while the claimed cell is empty.
    pub fn consume(&self, proc: &ProcHandle) -> KernelResult<i64> {
        let index = {
            let mut tail = self.tail.lock();
            let index = *tail;
            *tail = (*tail + 1) % BUFFER_SIZE;
            index
        };
        let cell = &self.cells[index];
        let mut state = cell.state.lock();
        while !state.full {
            state = cell.inserted.wait(proc, &cell.state, state);
            if proc.killed() {
                return Err(KernelError::Killed);
            }
        }
        let value = state.value;
        state.full = false;
        drop(state);
        cell.deleted.signal(proc.kernel());
        Ok(value)
    }
}

impl Default for CondBuffer {
    fn default() -> Self {
        Self::new()
    }
}

struct SemBufferData {
    buf: [i64; BUFFER_SIZE],
    nextp: usize,
    nextc: usize,
}

/// Bounded FIFO buffer on semaphores: `empty`/`full` count free and used
/// cells, and one binary semaphore per side serializes the cursor update.
pub struct SemBuffer {
    data: Mutex<SemBufferData>,
    producer: Semaphore,
    consumer: Semaphore,
    empty: Semaphore,
    full: Semaphore,
}

impl SemBuffer {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(SemBufferData {
                buf: [0; BUFFER_SIZE],
                nextp: 0,
                nextc: 0,
            }),
            producer: Semaphore::new(1),
            consumer: Semaphore::new(1),
            empty: Semaphore::new(BUFFER_SIZE as i64),
            full: Semaphore::new(0),
        }
    }

    pub fn produce(&self, proc: &ProcHandle, value: i64) -> KernelResult<()> {
        self.empty.wait(proc)?;
        self.producer.wait(proc)?;
        {
            let mut data = self.data.lock();
            let at = data.nextp;
            data.buf[at] = value;
            data.nextp = (at + 1) % BUFFER_SIZE;
        }
        self.producer.post(proc.kernel());
        self.full.post(proc.kernel());
        Ok(())
    }

    pub fn consume(&self, proc: &ProcHandle) -> KernelResult<i64> {
        self.full.wait(proc)?;
        self.consumer.wait(proc)?;
        let value = {
            let mut data = self.data.lock();
            let at = data.nextc;
            let value = data.buf[at];
            data.nextc = (at + 1) % BUFFER_SIZE;
            value
        };
        self.consumer.post(proc.kernel());
        self.empty.post(proc.kernel());
        Ok(value)
    }
}

impl Default for SemBuffer {
    fn default() -> Self {
        Self::new()
    }
}
