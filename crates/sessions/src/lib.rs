//! Session persistence for Steer.
//!
//! One [`MethodSession`] per owner, kept in a JSON file under the state path
//! and replaced as a whole on every committed transition. Problems are read
//! through the [`ProblemStore`] trait so the gateway never depends on where
//! they live.

pub mod problems;
pub mod session;
pub mod store;

pub use problems::{InMemoryProblemStore, JsonProblemStore, ProblemStore};
pub use session::{MethodSession, SessionState, SessionSummary};
pub use store::SessionStore;
