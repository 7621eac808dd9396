/*!
 * Synchronization Primitives
 * Condition variables, semaphores, barriers, and bounded buffers built on
 * the kernel sleep/wakeup channels
 */

pub mod barrier;
pub mod buffer;
pub mod condvar;
pub mod semaphore;

pub use barrier::{BarrierPool, NBARRIER};
pub use buffer::{CondBuffer, SemBuffer, BUFFER_SIZE};
pub use condvar::CondVar;
pub use semaphore::Semaphore;
