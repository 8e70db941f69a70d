//! Reference engines.
//!
//! Small deterministic stand-ins for the real optimizers: achievement
//! scalarizing over a candidate set, a linear-interpolation navigator, and a
//! mutation plus non-dominated-sort evolutionary loop.

pub mod benchmarks;
pub mod evolutionary;
pub mod model;
pub mod navigator;
pub mod nimbus;
pub mod reference_point;
pub mod scalarize;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use st_domain::error::{Error, Result};

use crate::preference::Preference;
use crate::request::{Answer, Request};

pub use evolutionary::{EvolutionaryMethod, EvolutionaryVariant};
pub use navigator::NautilusNavigator;
pub use nimbus::SynchronousNimbus;
pub use reference_point::ReferencePointMethod;

/// Content of the terminal request every single-solution method ends with.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FinalContent {
    pub message: String,
    pub objective_vector: Vec<f64>,
    pub solution: Option<Vec<f64>>,
}

/// Unwrap the answered request, rejecting answers a method cannot act on.
pub(crate) fn answered(answer: Answer, method: &str) -> Result<Request> {
    match answer {
        Answer::Respond(request) => Ok(request),
        Answer::Advance | Answer::Finalize => Err(Error::Engine(format!(
            "{method} needs a response to its last request"
        ))),
    }
}

/// Read a passthrough payload as the method's response type.
pub(crate) fn payload_as<T: DeserializeOwned>(request: &Request) -> Result<T> {
    match &request.response {
        Some(Preference::Payload { payload }) => serde_json::from_value(Value::Object(payload.clone()))
            .map_err(|e| Error::Engine(format!("malformed response: {e}"))),
        Some(other) => Err(Error::Engine(format!("unexpected preference {other:?}"))),
        None => Err(Error::Engine("request carries no response".into())),
    }
}

/// A vector the client sent must have one finite value per objective.
pub(crate) fn check_vector(name: &str, v: &[f64], k: usize) -> Result<()> {
    if v.len() != k {
        return Err(Error::Engine(format!(
            "`{name}` has {} values, expected {k}",
            v.len()
        )));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(Error::Engine(format!("`{name}` must be finite")));
    }
    Ok(())
}

pub(crate) fn expect_kind(request: &Request, expected: crate::request::RequestKind) -> Result<()> {
    if request.kind != expected {
        return Err(Error::Engine(format!(
            "expected a response to a {expected:?} request, got {:?}",
            request.kind
        )));
    }
    Ok(())
}
