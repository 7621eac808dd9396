/*!
 * Process Module
 * Process table, scheduling, lifecycle, and inspection
 */

pub mod batch;
pub mod handle;
pub mod inspect;
pub mod lifecycle;
pub mod resources;
pub mod scheduler;
pub mod sleep;
pub mod table;
pub mod types;

// Re-export for convenience
pub use batch::BatchReport;
pub use handle::ProcHandle;
pub use types::{Policy, ProcState, ProcessInfo};
