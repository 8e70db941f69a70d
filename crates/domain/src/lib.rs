//! Shared types for the Steer workspace: the error taxonomy, configuration,
//! the problem model consumed from the problem store, and structured trace
//! events.

pub mod config;
pub mod error;
pub mod problem;
pub mod trace;
