//! Discord REST adapter for the stagehand session gateway
//!
//! Talks to the guild scheduled-events HTTP API with a bot token and parses
//! its loosely-typed records into the fixed `Session` representation at this
//! boundary. No other crate sees the wire format.

mod rest;
mod wire;

pub use rest::*;
pub use wire::*;
