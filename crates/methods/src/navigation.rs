//! Navigation history.
//!
//! Navigation engines publish their whole state in every request, and the
//! client keeps the trail. Stepping back means the client resends an earlier
//! response body with `go_to_previous: true`; [`route`] rebuilds the request
//! from those fields. A [`StepLedger`] remembers what was actually issued so
//! that the engine can cross-check replays when configured to.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use st_domain::error::{Error, Result};

use crate::preference::Preference;
use crate::request::{Answer, PendingRequests, Request, RequestKind};

/// Content of a navigation request. Every field is echoed by the client on
/// step-back, so this is also the shape of a go-back payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationContent {
    pub ideal: Vec<f64>,
    pub nadir: Vec<f64>,
    pub reachable_lb: Vec<f64>,
    pub reachable_ub: Vec<f64>,
    /// `null` where the client set no bound.
    pub user_bounds: Vec<Option<f64>>,
    pub reachable_idx: Vec<usize>,
    pub step_number: u32,
    pub steps_remaining: u32,
    pub distance: f64,
    pub allowed_speeds: Vec<u32>,
    pub current_speed: u32,
    pub navigation_point: Vec<f64>,
}

/// What the client answers to a navigation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationResponse {
    #[serde(default)]
    pub reference_point: Option<Vec<f64>>,
    #[serde(default)]
    pub speed: Option<u32>,
    #[serde(default)]
    pub go_to_previous: bool,
    #[serde(default)]
    pub stop: bool,
    #[serde(default)]
    pub user_bounds: Option<Vec<Option<f64>>>,
    /// New remaining budget. Only read when no reference point is given.
    #[serde(default)]
    pub steps_remaining: Option<u32>,
}

impl NavigationResponse {
    /// `{"steps_remaining": n}` without a reference point changes the budget
    /// without moving.
    pub fn budget_change(&self) -> Option<u32> {
        if self.go_to_previous || self.stop || self.reference_point.is_some() {
            return None;
        }
        self.steps_remaining
    }
}

/// Attach a navigation payload to the pending request, or rebuild the
/// request from the payload when the client steps back.
pub fn route(payload: &Value, pending: &PendingRequests) -> Result<Answer> {
    let response: NavigationResponse = serde_json::from_value(payload.clone())
        .map_err(|e| Error::InvalidPreference(format!("navigation response: {e}")))?;

    let request = if response.go_to_previous {
        rebuild(payload)?
    } else {
        match pending {
            PendingRequests::Single(r) => r.clone(),
            PendingRequests::Tuple(_) => {
                return Err(Error::InvalidPreference(
                    "navigation methods issue a single request".into(),
                ))
            }
        }
    };
    Ok(Answer::Respond(
        request.with_response(Preference::Navigation(response)),
    ))
}

/// Rebuild a navigation request field for field from a resent response body.
pub fn rebuild(payload: &Value) -> Result<Request> {
    let content: NavigationContent = serde_json::from_value(payload.clone())
        .map_err(|e| Error::InvalidPreference(format!("cannot step back: {e}")))?;
    Ok(Request::new(RequestKind::Navigation, &content))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// StepLedger
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One issued navigation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEntry {
    pub step_number: u32,
    pub steps_remaining: u32,
    pub navigation_point: Vec<f64>,
}

/// Bounded ring buffer of issued steps, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLedger {
    capacity: usize,
    entries: VecDeque<StepEntry>,
}

const POINT_TOLERANCE: f64 = 1e-9;

impl StepLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(256)),
        }
    }

    /// Record a step. Steps at or after it belong to an abandoned branch and
    /// are dropped first.
    pub fn record(&mut self, entry: StepEntry) {
        if self.capacity == 0 {
            return;
        }
        self.entries.retain(|e| e.step_number < entry.step_number);
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Check a replayed step against what was issued.
    pub fn verify(&self, content: &NavigationContent) -> Result<()> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.step_number == content.step_number)
            .ok_or_else(|| {
                Error::Engine(format!(
                    "step {} is not in the navigation history",
                    content.step_number
                ))
            })?;

        let same_point = entry.navigation_point.len() == content.navigation_point.len()
            && entry
                .navigation_point
                .iter()
                .zip(&content.navigation_point)
                .all(|(a, b)| (a - b).abs() <= POINT_TOLERANCE * (1.0 + a.abs()));
        if entry.steps_remaining != content.steps_remaining || !same_point {
            return Err(Error::Engine(format!(
                "step {} does not match the navigation history",
                content.step_number
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(step: u32) -> NavigationContent {
        NavigationContent {
            ideal: vec![0.0, 0.0],
            nadir: vec![1.0, 1.0],
            reachable_lb: vec![0.0, 0.0],
            reachable_ub: vec![1.0, 1.0],
            user_bounds: vec![None, Some(0.8)],
            reachable_idx: vec![0, 1, 2],
            step_number: step,
            steps_remaining: 40 - step,
            distance: 12.5,
            allowed_speeds: vec![1, 2, 3, 4, 5],
            current_speed: 1,
            navigation_point: vec![0.9, 0.9],
        }
    }

    fn pending() -> PendingRequests {
        PendingRequests::Single(Request::new(RequestKind::Navigation, &content(5)))
    }

    #[test]
    fn forward_payload_attaches_to_pending() {
        let payload = json!({ "reference_point": [0.2, 0.3], "speed": 1, "go_to_previous": false });
        let Answer::Respond(req) = route(&payload, &pending()).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(req.content["step_number"], 5);
        let Some(Preference::Navigation(resp)) = req.response else {
            panic!("expected a navigation response");
        };
        assert_eq!(resp.reference_point, Some(vec![0.2, 0.3]));
        assert_eq!(resp.budget_change(), None);
    }

    #[test]
    fn go_back_rebuilds_from_payload() {
        let mut payload = serde_json::to_value(content(3)).unwrap();
        payload["go_to_previous"] = json!(true);
        payload["reference_point"] = json!([0.2, 0.3]);
        let Answer::Respond(req) = route(&payload, &pending()).unwrap() else {
            panic!("expected a response");
        };
        let rebuilt: NavigationContent = req.content_as().unwrap();
        assert_eq!(rebuilt, content(3));
    }

    #[test]
    fn go_back_with_missing_fields_is_rejected() {
        let payload = json!({ "go_to_previous": true, "step_number": 3 });
        let err = route(&payload, &pending()).unwrap_err();
        assert!(matches!(err, Error::InvalidPreference(_)));
    }

    #[test]
    fn budget_message_is_recognized() {
        let resp: NavigationResponse = serde_json::from_value(json!({ "steps_remaining": 7 })).unwrap();
        assert_eq!(resp.budget_change(), Some(7));
    }

    #[test]
    fn ledger_drops_abandoned_branch_and_respects_capacity() {
        let mut ledger = StepLedger::new(3);
        for step in 1..=5 {
            let c = content(step);
            ledger.record(StepEntry {
                step_number: step,
                steps_remaining: c.steps_remaining,
                navigation_point: c.navigation_point,
            });
        }
        assert_eq!(ledger.len(), 3);
        assert!(ledger.verify(&content(2)).is_err());
        assert!(ledger.verify(&content(4)).is_ok());

        ledger.record(StepEntry {
            step_number: 4,
            steps_remaining: 36,
            navigation_point: vec![0.5, 0.5],
        });
        assert_eq!(ledger.len(), 2);
        assert!(ledger.verify(&content(5)).is_err());
    }

    #[test]
    fn ledger_rejects_tampered_point() {
        let mut ledger = StepLedger::new(8);
        let c = content(2);
        ledger.record(StepEntry {
            step_number: 2,
            steps_remaining: c.steps_remaining,
            navigation_point: c.navigation_point.clone(),
        });
        let mut tampered = c;
        tampered.navigation_point[0] = 0.1;
        assert!(ledger.verify(&tampered).is_err());
    }
}
