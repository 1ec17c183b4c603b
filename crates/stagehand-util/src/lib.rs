//! Shared utilities for the stagehand workspace
//!
//! This crate provides:
//! - ID types (SessionId, ChannelId, GuildId, ClientId)
//! - Time helpers (fire-instant clamping, duration formatting)
//! - Bounded exponential backoff
//! - Default paths for socket and config files

mod backoff;
mod ids;
mod paths;
mod time;

pub use backoff::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
