/*!
 * kernos - Userspace Process Scheduler Kernel
 * Process table, swappable scheduling policies, and blocking primitives
 */

pub mod clock;
pub mod core;
pub mod kernel;
pub mod mem;
pub mod proc;
pub mod sync;

// Re-exports
pub use crate::core::errors::{KernelError, KernelResult};
pub use crate::core::types::{Channel, Pid, SlotId, Tick};
pub use clock::Clock;
pub use kernel::{Config, Kernel};
pub use mem::{AddressSpace, MemoryPool, PAGE_SIZE};
pub use proc::batch::BatchReport;
pub use proc::handle::ProcHandle;
pub use proc::types::{Policy, ProcState, ProcessInfo};
pub use sync::{BarrierPool, CondBuffer, CondVar, SemBuffer, Semaphore};
