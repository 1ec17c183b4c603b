//! Session automation engine for stagehand
//!
//! This crate is the heart of stagehandd, containing:
//! - The job table and reconciler (remote list -> local intent)
//! - The timer scheduler (fire each job once, at the right instant)
//! - Conflict resolution (one live session per channel)
//! - The activation worker (re-validate, resolve, activate with retry)

mod activate;
mod engine;
mod scheduler;

pub use activate::*;
pub use engine::*;
pub use scheduler::*;
