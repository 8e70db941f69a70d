//! Synchronous NIMBUS over a candidate set.
//!
//! The client classifies the objectives of the current solution, the engine
//! answers with up to four solutions from different scalarizations, and the
//! client may archive some, ask for intermediate solutions between two, and
//! finally pick the most preferred one to continue from or stop at.

use serde::{Deserialize, Serialize};
use st_domain::config::MethodsConfig;
use st_domain::error::{Error, Result};
use st_domain::problem::ProblemRecord;

use super::model::{CandidateSet, ProblemModel};
use super::{answered, check_vector, expect_kind, payload_as, scalarize, FinalContent};
use crate::engine::MethodEngine;
use crate::family::MethodFamily;
use crate::request::{Answer, PendingRequests, Request, RequestKind};
use crate::snapshot::{EngineState, MethodSnapshot};

const SYMBOLS: [&str; 5] = ["<", "<=", "=", ">=", "0"];
const MAX_SOLUTIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Phase {
    Classification,
    Save,
    Intermediate,
    MostPreferred,
    Done,
}

impl Phase {
    fn kind(self) -> RequestKind {
        match self {
            Self::Classification => RequestKind::Classification,
            Self::Save => RequestKind::Save,
            Self::Intermediate => RequestKind::Intermediate,
            Self::MostPreferred => RequestKind::MostPreferred,
            Self::Done => RequestKind::Stop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynchronousNimbus {
    model: ProblemModel,
    candidates: CandidateSet,
    current: usize,
    phase: Phase,
    /// Solutions produced by the latest classification or intermediate step.
    generated: Vec<usize>,
    archive: Vec<usize>,
    /// Candidates listed in the last request; response indices refer to it.
    shown: Vec<usize>,
}

// ── request contents ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ClassificationContent {
    message: String,
    objective_names: Vec<String>,
    objective_values: Vec<f64>,
    ideal: Vec<f64>,
    nadir: Vec<f64>,
    classification_symbols: Vec<&'static str>,
    max_solutions: usize,
}

#[derive(Debug, Serialize)]
struct SolutionsContent {
    message: String,
    objective_names: Vec<String>,
    objectives: Vec<Vec<f64>>,
}

// ── responses ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    classifications: Vec<String>,
    levels: Vec<f64>,
    #[serde(default = "d_one")]
    number_of_solutions: usize,
}

fn d_one() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    #[serde(default)]
    indices: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct IntermediateResponse {
    #[serde(default)]
    indices: Vec<usize>,
    #[serde(default)]
    number_of_desired_solutions: usize,
}

#[derive(Debug, Deserialize)]
struct MostPreferredResponse {
    index: usize,
    #[serde(rename = "continue")]
    proceed: bool,
}

impl SynchronousNimbus {
    pub fn new(problem: &ProblemRecord, config: &MethodsConfig) -> Result<Self> {
        let model = ProblemModel::new(problem)?;
        let candidates = model.candidates(config.candidate_samples, config.seed);
        let midpoint: Vec<f64> = model
            .ideal
            .iter()
            .zip(&model.nadir)
            .map(|(i, n)| (i + n) / 2.0)
            .collect();
        let current = scalarize::best_by_asf(
            &candidates.objectives,
            &candidates.all(),
            &midpoint,
            &model.weights(),
        )
        .ok_or_else(|| Error::Engine("problem has no candidate solutions".into()))?;
        Ok(Self {
            model,
            candidates,
            current,
            phase: Phase::Classification,
            generated: Vec::new(),
            archive: Vec::new(),
            shown: Vec::new(),
        })
    }

    fn own(&self, i: usize) -> Vec<f64> {
        self.model.to_own(&self.candidates.objectives[i])
    }

    fn request(&self) -> Request {
        let kind = self.phase.kind();
        if self.phase == Phase::Classification {
            return Request::new(
                kind,
                &ClassificationContent {
                    message: "Classify each objective of the current solution.".into(),
                    objective_names: self.model.names().to_vec(),
                    objective_values: self.own(self.current),
                    ideal: self.model.own_ideal(),
                    nadir: self.model.own_nadir(),
                    classification_symbols: SYMBOLS.to_vec(),
                    max_solutions: MAX_SOLUTIONS,
                },
            );
        }
        let message = match self.phase {
            Phase::Save => "Select solutions to save with `indices`.",
            Phase::Intermediate => {
                "Pick two `indices` and a `number_of_desired_solutions` to see solutions \
                 between them, or ask for none to choose the most preferred solution."
            }
            _ => "Choose the most preferred solution with `index`; set `continue` to keep iterating.",
        };
        Request::new(
            kind,
            &SolutionsContent {
                message: message.into(),
                objective_names: self.model.names().to_vec(),
                objectives: self.shown.iter().map(|&i| self.own(i)).collect(),
            },
        )
    }

    fn shown_at(&self, position: usize) -> Result<usize> {
        self.shown.get(position).copied().ok_or_else(|| {
            Error::Engine(format!(
                "index {position} is out of range for {} listed solutions",
                self.shown.len()
            ))
        })
    }

    /// Generated solutions followed by archived ones not already among them.
    fn listing(&self) -> Vec<usize> {
        let mut list = self.generated.clone();
        list.extend(self.archive.iter().filter(|i| !self.generated.contains(*i)));
        list
    }

    fn classify(&mut self, response: ClassificationResponse) -> Result<()> {
        let k = self.model.n_objectives();
        if response.classifications.len() != k {
            return Err(Error::Engine(format!(
                "expected {k} classifications, got {}",
                response.classifications.len()
            )));
        }
        check_vector("levels", &response.levels, k)?;
        if !(1..=MAX_SOLUTIONS).contains(&response.number_of_solutions) {
            return Err(Error::Engine(format!(
                "`number_of_solutions` must be between 1 and {MAX_SOLUTIONS}"
            )));
        }
        if let Some(bad) = response
            .classifications
            .iter()
            .find(|c| !SYMBOLS.contains(&c.as_str()))
        {
            return Err(Error::Engine(format!("unknown classification `{bad}`")));
        }
        let improve = response.classifications.iter().any(|c| c == "<" || c == "<=");
        let impair = response.classifications.iter().any(|c| c == ">=" || c == "0");
        if !improve || !impair {
            return Err(Error::Engine(
                "at least one objective must improve and one must be allowed to impair".into(),
            ));
        }

        let current = self.candidates.objectives[self.current].clone();
        let levels = self.model.to_min(&response.levels);
        let mut q = Vec::with_capacity(k);
        let mut limit = Vec::with_capacity(k);
        for i in 0..k {
            let (qi, li) = match response.classifications[i].as_str() {
                "<" => (self.model.ideal[i], current[i]),
                "<=" => {
                    if levels[i] > current[i] {
                        return Err(Error::Engine(format!(
                            "level of objective {i} does not improve on the current value"
                        )));
                    }
                    (levels[i], current[i])
                }
                "=" => (current[i], current[i]),
                ">=" => {
                    if levels[i] < current[i] {
                        return Err(Error::Engine(format!(
                            "level of objective {i} is better than the current value"
                        )));
                    }
                    (levels[i], levels[i])
                }
                _ => (self.model.nadir[i], f64::INFINITY),
            };
            q.push(qi);
            limit.push(li);
        }

        let rows = &self.candidates.objectives;
        let eps = 1e-12;
        let mut feasible: Vec<usize> = self
            .candidates
            .all()
            .into_iter()
            .filter(|&j| rows[j].iter().zip(&limit).all(|(f, l)| *f <= l + eps))
            .collect();
        if feasible.is_empty() {
            feasible = self.candidates.all();
        }

        let range = self.model.weights();
        let stom: Vec<f64> = q
            .iter()
            .zip(&self.model.ideal)
            .map(|(qi, zi)| 1.0 / (qi - zi + 1e-6).max(1e-6))
            .collect();
        let guess: Vec<f64> = q
            .iter()
            .zip(&self.model.nadir)
            .map(|(qi, ni)| 1.0 / (ni - qi + 1e-6).max(1e-6))
            .collect();
        let utopian: Vec<f64> = self.model.ideal.iter().map(|z| z - 1e-6).collect();
        let unit = vec![1.0; k];
        let scalarizations: [(&[f64], &[f64]); MAX_SOLUTIONS] = [
            (q.as_slice(), range.as_slice()),
            (utopian.as_slice(), stom.as_slice()),
            (q.as_slice(), unit.as_slice()),
            (self.model.nadir.as_slice(), guess.as_slice()),
        ];

        self.generated = scalarizations
            .iter()
            .take(response.number_of_solutions)
            .filter_map(|(reference, weights)| scalarize::best_by_asf(rows, &feasible, reference, weights))
            .collect();
        Ok(())
    }

    fn intermediate(&mut self, a: usize, b: usize, n: usize) {
        let rows = &self.candidates.objectives;
        let all = self.candidates.all();
        let w = self.model.weights();
        let (fa, fb) = (rows[a].clone(), rows[b].clone());
        self.generated = (1..=n)
            .filter_map(|t| {
                let s = t as f64 / (n + 1) as f64;
                let p: Vec<f64> = fa.iter().zip(&fb).map(|(x, y)| x + s * (y - x)).collect();
                scalarize::best_by_asf(rows, &all, &p, &w)
            })
            .collect();
    }
}

impl MethodEngine for SynchronousNimbus {
    fn family(&self) -> MethodFamily {
        MethodFamily::Scalarizing
    }

    fn start(&mut self) -> Result<PendingRequests> {
        Ok(PendingRequests::Single(self.request()))
    }

    fn iterate(&mut self, answer: Answer) -> Result<PendingRequests> {
        let request = answered(answer, "NIMBUS")?;
        expect_kind(&request, self.phase.kind())?;

        match self.phase {
            Phase::Classification => {
                self.classify(payload_as(&request)?)?;
                self.shown = self.generated.clone();
                self.phase = Phase::Save;
            }
            Phase::Save => {
                let response: SaveResponse = payload_as(&request)?;
                for position in response.indices {
                    let i = self.shown_at(position)?;
                    if !self.archive.contains(&i) {
                        self.archive.push(i);
                    }
                }
                self.shown = self.listing();
                self.phase = Phase::Intermediate;
            }
            Phase::Intermediate => {
                let response: IntermediateResponse = payload_as(&request)?;
                if response.number_of_desired_solutions > 0 {
                    let &[a, b] = response.indices.as_slice() else {
                        return Err(Error::Engine(
                            "intermediate solutions need exactly two `indices`".into(),
                        ));
                    };
                    let (a, b) = (self.shown_at(a)?, self.shown_at(b)?);
                    self.intermediate(a, b, response.number_of_desired_solutions);
                    self.shown = self.generated.clone();
                    self.phase = Phase::Save;
                } else {
                    self.shown = self.listing();
                    self.phase = Phase::MostPreferred;
                }
            }
            Phase::MostPreferred => {
                let response: MostPreferredResponse = payload_as(&request)?;
                self.current = self.shown_at(response.index)?;
                if response.proceed {
                    self.shown.clear();
                    self.phase = Phase::Classification;
                } else {
                    self.phase = Phase::Done;
                    return Ok(PendingRequests::Single(Request::new(
                        RequestKind::Stop,
                        &FinalContent {
                            message: "Final solution chosen.".into(),
                            objective_vector: self.own(self.current),
                            solution: self.candidates.variables_of(self.current).cloned(),
                        },
                    )));
                }
            }
            Phase::Done => return Err(Error::Engine("the method has already finished".into())),
        }
        Ok(PendingRequests::Single(self.request()))
    }

    fn snapshot(&self) -> MethodSnapshot {
        MethodSnapshot::new(EngineState::Nimbus(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::model::fixtures;
    use crate::preference::Preference;
    use serde_json::{json, Value};

    fn step(nimbus: &mut SynchronousNimbus, pending: &PendingRequests, payload: Value) -> Result<PendingRequests> {
        let PendingRequests::Single(req) = pending else {
            panic!("single request expected");
        };
        nimbus.iterate(Answer::Respond(req.clone().with_response(Preference::Payload {
            payload: payload.as_object().cloned().unwrap(),
        })))
    }

    fn kind(pending: &PendingRequests) -> RequestKind {
        match pending {
            PendingRequests::Single(r) => r.kind,
            PendingRequests::Tuple(_) => panic!("single request expected"),
        }
    }

    #[test]
    fn full_cycle_reaches_a_final_solution() {
        let mut nimbus = SynchronousNimbus::new(&fixtures::discrete_problem(), &MethodsConfig::default()).unwrap();
        let mut pending = nimbus.start().unwrap();
        assert_eq!(kind(&pending), RequestKind::Classification);

        let levels = pending.contents()["objective_values"].clone();
        pending = step(
            &mut nimbus,
            &pending,
            json!({ "classifications": ["<", "0", "="], "levels": levels, "number_of_solutions": 4 }),
        )
        .unwrap();
        assert_eq!(kind(&pending), RequestKind::Save);
        assert_eq!(pending.contents()["objectives"].as_array().unwrap().len(), 4);

        pending = step(&mut nimbus, &pending, json!({ "indices": [0, 1, 2, 3] })).unwrap();
        assert_eq!(kind(&pending), RequestKind::Intermediate);

        pending = step(
            &mut nimbus,
            &pending,
            json!({ "indices": [0, 3], "number_of_desired_solutions": 5 }),
        )
        .unwrap();
        assert_eq!(kind(&pending), RequestKind::Save);
        assert_eq!(pending.contents()["objectives"].as_array().unwrap().len(), 5);

        pending = step(&mut nimbus, &pending, json!({ "indices": [] })).unwrap();
        pending = step(
            &mut nimbus,
            &pending,
            json!({ "indices": [], "number_of_desired_solutions": 0 }),
        )
        .unwrap();
        assert_eq!(kind(&pending), RequestKind::MostPreferred);

        pending = step(&mut nimbus, &pending, json!({ "index": 0, "continue": false })).unwrap();
        assert!(pending.is_terminal());
        assert_eq!(pending.contents()["objective_vector"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn classification_must_improve_and_impair() {
        let mut nimbus = SynchronousNimbus::new(&fixtures::discrete_problem(), &MethodsConfig::default()).unwrap();
        let pending = nimbus.start().unwrap();
        let levels = pending.contents()["objective_values"].clone();
        let err = step(
            &mut nimbus,
            &pending,
            json!({ "classifications": ["<", "<", "="], "levels": levels, "number_of_solutions": 1 }),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
    }

    #[test]
    fn response_to_the_wrong_phase_is_rejected() {
        let mut nimbus = SynchronousNimbus::new(&fixtures::discrete_problem(), &MethodsConfig::default()).unwrap();
        let _ = nimbus.start().unwrap();
        let stale = PendingRequests::Single(Request::new(RequestKind::Save, &json!({})));
        assert!(step(&mut nimbus, &stale, json!({ "indices": [] })).is_err());
    }
}
