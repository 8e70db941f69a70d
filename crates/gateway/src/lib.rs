//! Steer gateway: the HTTP surface and session controller for interactive
//! multi-objective methods.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
