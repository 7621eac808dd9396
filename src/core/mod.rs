/*!
 * Core Module
 * Common types and error definitions shared across the kernel
 */

pub mod errors;
pub mod types;
