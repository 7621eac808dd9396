/*!
 * Error Types
 * Centralized error handling with thiserror and serde support
 */

use crate::core::types::Pid;
use serde::Serialize;
use thiserror::Error;

/// Common result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Recoverable kernel errors.
///
/// Protocol violations (switching with the wrong locks held, switching a
/// non-running process, init exiting) are not represented here: they
/// indicate corrupted invariants and panic instead.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum KernelError {
    #[error("process table is full")]
    TableFull,

    #[error("out of memory")]
    OutOfMemory,

    #[error("process {0} not found")]
    NotFound(Pid),

    #[error("no child to wait for")]
    NoChild,

    #[error("no free barrier slot")]
    NoFreeBarrier,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("process was killed")]
    Killed,
}
