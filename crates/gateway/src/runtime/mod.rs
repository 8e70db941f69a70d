//! Session runtime: the controller that drives method sessions through
//! their state machine, and the per-owner locks it serializes on.

pub mod controller;
pub mod session_lock;

pub use controller::{Created, SessionController};
pub use session_lock::SessionLockMap;
