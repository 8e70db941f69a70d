//! Reference point method.
//!
//! Each iteration projects the client's reference point onto the candidate
//! set with the achievement scalarizing function, plus one perturbed
//! projection per objective so the client sees the neighbourhood.

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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePointMethod {
    model: ProblemModel,
    candidates: CandidateSet,
    iteration: u32,
    /// Candidates shown last, current solution first.
    shown: Vec<usize>,
    finished: bool,
}

#[derive(Debug, Serialize)]
struct ReferencePointContent {
    message: String,
    objective_names: Vec<String>,
    ideal: Vec<f64>,
    nadir: Vec<f64>,
    minimize: Vec<i8>,
    iteration: u32,
    current_solution: Option<Vec<f64>>,
    additional_solutions: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct ReferencePointResponse {
    #[serde(default)]
    reference_point: Option<Vec<f64>>,
    #[serde(default)]
    satisfied: bool,
    /// 1-based position in `[current, additional...]`.
    #[serde(default)]
    solution_index: Option<usize>,
}

impl ReferencePointMethod {
    pub fn new(problem: &ProblemRecord, config: &MethodsConfig) -> Result<Self> {
        let model = ProblemModel::new(problem)?;
        let all = model.candidates(config.candidate_samples, config.seed);
        let front = scalarize::non_dominated_fronts(&all.objectives)
            .into_iter()
            .next()
            .unwrap_or_default();
        let candidates = CandidateSet {
            objectives: front.iter().map(|&i| all.objectives[i].clone()).collect(),
            variables: front
                .iter()
                .filter_map(|&i| all.variables_of(i).cloned())
                .collect(),
        };
        if candidates.is_empty() {
            return Err(Error::Engine("problem has no candidate solutions".into()));
        }
        Ok(Self {
            model,
            candidates,
            iteration: 0,
            shown: Vec::new(),
            finished: false,
        })
    }

    fn request(&self) -> Request {
        let own = |i: &usize| self.model.to_own(&self.candidates.objectives[*i]);
        let message = if self.shown.is_empty() {
            "Please specify a reference point with one aspiration level per objective.".to_string()
        } else {
            "Specify a new reference point, or set `satisfied` and pick a solution with \
             `solution_index` (1 is the current solution)."
                .to_string()
        };
        Request::new(
            RequestKind::ReferencePoint,
            &ReferencePointContent {
                message,
                objective_names: self.model.names().to_vec(),
                ideal: self.model.own_ideal(),
                nadir: self.model.own_nadir(),
                minimize: self.model.record.minimize.clone(),
                iteration: self.iteration,
                current_solution: self.shown.first().map(own),
                additional_solutions: self.shown.iter().skip(1).map(own).collect(),
            },
        )
    }

    fn project(&mut self, reference_point: &[f64]) -> Result<()> {
        check_vector("reference_point", reference_point, self.model.n_objectives())?;
        let q = self.model.to_min(reference_point);
        let w = self.model.weights();
        let rows = &self.candidates.objectives;
        let all = self.candidates.all();

        let current = scalarize::best_by_asf(rows, &all, &q, &w)
            .ok_or_else(|| Error::Engine("no candidate solutions".into()))?;
        let d = scalarize::euclidean(&q, &rows[current]);

        let mut shown = vec![current];
        for j in 0..q.len() {
            let mut shifted = q.clone();
            shifted[j] += d;
            if let Some(i) = scalarize::best_by_asf(rows, &all, &shifted, &w) {
                if !shown.contains(&i) {
                    shown.push(i);
                }
            }
        }
        self.shown = shown;
        self.iteration += 1;
        Ok(())
    }
}

impl MethodEngine for ReferencePointMethod {
    fn family(&self) -> MethodFamily {
        MethodFamily::Scalarizing
    }

    fn start(&mut self) -> Result<PendingRequests> {
        Ok(PendingRequests::Single(self.request()))
    }

    fn iterate(&mut self, answer: Answer) -> Result<PendingRequests> {
        if self.finished {
            return Err(Error::Engine("the method has already finished".into()));
        }
        let request = answered(answer, "the reference point method")?;
        expect_kind(&request, RequestKind::ReferencePoint)?;
        let response: ReferencePointResponse = payload_as(&request)?;

        if response.satisfied {
            let position = response.solution_index.unwrap_or(1);
            let chosen = position
                .checked_sub(1)
                .and_then(|p| self.shown.get(p).copied())
                .ok_or_else(|| {
                    Error::Engine(format!(
                        "`solution_index` {position} does not name a shown solution"
                    ))
                })?;
            self.finished = true;
            return Ok(PendingRequests::Single(Request::new(
                RequestKind::Stop,
                &FinalContent {
                    message: "Final solution chosen.".into(),
                    objective_vector: self.model.to_own(&self.candidates.objectives[chosen]),
                    solution: self.candidates.variables_of(chosen).cloned(),
                },
            )));
        }

        let reference_point = response
            .reference_point
            .ok_or_else(|| Error::Engine("`reference_point` is required".into()))?;
        self.project(&reference_point)?;
        Ok(PendingRequests::Single(self.request()))
    }

    fn snapshot(&self) -> MethodSnapshot {
        MethodSnapshot::new(EngineState::ReferencePoint(self.clone()))
    }
}
