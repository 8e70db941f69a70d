use serde::Serialize;
use st_domain::error::{Error, Result};

use crate::family::MethodFamily;
use crate::request::{Answer, PendingRequests};
use crate::snapshot::MethodSnapshot;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core engine trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait that every interactive method must implement.
///
/// An engine is a stateful object that lives only for the duration of one
/// request. Between requests it exists as a [`MethodSnapshot`]; the registry
/// rebuilds it from that snapshot. Engines run on the blocking pool, so they
/// must be `Send` but never need to be shared.
pub trait MethodEngine: Send {
    fn family(&self) -> MethodFamily;

    /// Produce the first request(s).
    fn start(&mut self) -> Result<PendingRequests>;

    /// Consume an answered request and produce the next one(s).
    ///
    /// Rejections are reported as [`Error::Engine`]; the engine may be left
    /// in any state afterwards because callers always work on a copy.
    fn iterate(&mut self, answer: Answer) -> Result<PendingRequests>;

    /// Capture the full state as a versioned record.
    fn snapshot(&self) -> MethodSnapshot;

    /// Current population, for families that publish one.
    fn population(&self) -> Option<PopulationView> {
        None
    }

    /// Interaction types the engine can switch between.
    fn interaction_types(&self) -> Option<Vec<String>> {
        None
    }

    /// Switch the active interaction type and reissue the pending requests.
    fn set_interaction_type(&mut self, _interaction_type: &str) -> Result<PendingRequests> {
        Err(Error::InvalidState(format!(
            "{} methods have no interaction types",
            self.family()
        )))
    }
}

/// Population published alongside population-family responses, in the
/// problem's own sense.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationView {
    pub individuals: Vec<Vec<f64>>,
    pub objectives: Vec<Vec<f64>>,
    pub ideal: Vec<f64>,
    pub nadir: Vec<f64>,
}
