use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::PopulationView;
use crate::request::PendingRequests;

/// Method family. Stored next to every session so that preference dispatch
/// and response shaping never have to look inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodFamily {
    /// Reference point and classification methods. Payloads pass through.
    Scalarizing,
    /// Step-wise navigation with client-resent history.
    Navigation,
    /// Evolutionary methods answering a tuple of preference requests.
    Population,
}

impl MethodFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scalarizing => "scalarizing",
            Self::Navigation => "navigation",
            Self::Population => "population",
        }
    }

    /// Render the client-facing body for a set of pending requests.
    ///
    /// Serializing through `serde_json::Value` maps non-finite floats to
    /// `null`.
    pub fn render(self, requests: &PendingRequests, population: Option<&PopulationView>) -> Value {
        match (self, population) {
            (Self::Population, Some(pop)) => json!({
                "response": requests.contents(),
                "preference_type": -1,
                "individuals": pop.individuals,
                "objectives": pop.objectives,
                "ideal": pop.ideal,
                "nadir": pop.nadir,
            }),
            _ => json!({ "response": requests.contents() }),
        }
    }
}

impl std::fmt::Display for MethodFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an engine issues one request at a time or a tuple of variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestShape {
    Single,
    Tuple,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Request, RequestKind};

    #[test]
    fn single_family_wraps_content() {
        let req = Request::new(RequestKind::Navigation, &json!({ "step_number": 1 }));
        let body = MethodFamily::Navigation.render(&PendingRequests::Single(req), None);
        assert_eq!(body, json!({ "response": { "step_number": 1 } }));
    }

    #[test]
    fn population_body_carries_individuals() {
        let req = Request::new(RequestKind::Bounds, &json!({ "message": "m" }));
        let pop = PopulationView {
            individuals: vec![vec![0.1, 0.2]],
            objectives: vec![vec![1.0, f64::NAN]],
            ideal: vec![0.0, 0.0],
            nadir: vec![1.0, 1.0],
        };
        let body = MethodFamily::Population.render(&PendingRequests::Tuple(vec![req]), Some(&pop));
        assert_eq!(body["preference_type"], -1);
        assert_eq!(body["individuals"], json!([[0.1, 0.2]]));
        assert!(body["objectives"][0][1].is_null());
    }
}
