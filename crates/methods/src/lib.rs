//! Interactive multi-objective methods behind one engine interface.
//!
//! The session controller never looks inside an engine. It talks to the
//! [`registry`] to construct or restore one, hands client payloads to the
//! [`preference`] dispatcher (or, for navigation methods, to
//! [`navigation`]), and renders results with the family serializer in
//! [`family`].

pub mod engine;
pub mod engines;
pub mod family;
pub mod navigation;
pub mod preference;
pub mod registry;
pub mod request;
pub mod snapshot;

pub use engine::{MethodEngine, PopulationView};
pub use family::{MethodFamily, RequestShape};
pub use preference::{dispatch, Preference};
pub use registry::{MethodRegistry, MethodSpec};
pub use request::{Answer, PendingRequests, Request, RequestKind};
pub use snapshot::{EngineState, MethodSnapshot, SNAPSHOT_VERSION};
