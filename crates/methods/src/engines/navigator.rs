//! NAUTILUS Navigator over a discrete problem.
//!
//! The navigation point starts at the nadir and moves a fraction of the way
//! towards the client's projected reference point on every step, so that it
//! reaches a Pareto optimal row on the last step. Only rows dominating the
//! navigation point stay reachable.

use serde::{Deserialize, Serialize};
use st_domain::config::{HistoryPolicy, MethodsConfig};
use st_domain::error::{Error, Result};
use st_domain::problem::ProblemRecord;

use super::model::ProblemModel;
use super::{answered, check_vector, expect_kind, scalarize, FinalContent};
use crate::engine::MethodEngine;
use crate::family::MethodFamily;
use crate::navigation::{NavigationContent, NavigationResponse, StepEntry, StepLedger};
use crate::preference::Preference;
use crate::request::{Answer, PendingRequests, Request, RequestKind};
use crate::snapshot::{EngineState, MethodSnapshot};

const ALLOWED_SPEEDS: [u32; 5] = [1, 2, 3, 4, 5];
const REACH_TOLERANCE: f64 = 1e-12;
/// Upper bound on a navigation's step budget, whatever the client asks for.
pub const MAX_NAVIGATION_STEPS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NautilusNavigator {
    model: ProblemModel,
    /// Table rows in minimization form.
    rows: Vec<Vec<f64>>,
    total_steps: u32,
    step_number: u32,
    steps_remaining: u32,
    /// Minimization form.
    navigation_point: Vec<f64>,
    reachable_idx: Vec<usize>,
    /// Own sense, `None` where unbounded.
    user_bounds: Vec<Option<f64>>,
    distance: f64,
    current_speed: u32,
    policy: HistoryPolicy,
    ledger: StepLedger,
    finished: bool,
}

impl NautilusNavigator {
    pub fn new(problem: &ProblemRecord, config: &MethodsConfig) -> Result<Self> {
        let model = ProblemModel::new(problem)?;
        let rows = model.candidates(0, config.seed).objectives;
        if !(2..=MAX_NAVIGATION_STEPS).contains(&config.navigation_steps) {
            return Err(Error::Config(format!(
                "navigation needs between 2 and {MAX_NAVIGATION_STEPS} steps"
            )));
        }
        let k = model.n_objectives();
        Ok(Self {
            navigation_point: model.nadir.clone(),
            reachable_idx: (0..rows.len()).collect(),
            rows,
            total_steps: config.navigation_steps,
            step_number: 1,
            steps_remaining: config.navigation_steps - 1,
            user_bounds: vec![None; k],
            distance: 0.0,
            current_speed: ALLOWED_SPEEDS[0],
            policy: config.history_policy,
            ledger: StepLedger::new(config.history_capacity),
            finished: false,
            model,
        })
    }

    fn content(&self) -> NavigationContent {
        let k = self.model.n_objectives();
        let mut lb = vec![f64::INFINITY; k];
        for &j in &self.reachable_idx {
            for (l, f) in lb.iter_mut().zip(&self.rows[j]) {
                *l = l.min(*f);
            }
        }
        let ub = &self.navigation_point;
        // Bounds in own sense: flipping a maximized objective swaps them.
        let (reachable_lb, reachable_ub): (Vec<f64>, Vec<f64>) = (0..k)
            .map(|i| {
                let s = f64::from(self.model.record.minimize[i]);
                let (a, b) = (lb[i] * s, ub[i] * s);
                (a.min(b), a.max(b))
            })
            .unzip();

        NavigationContent {
            ideal: self.model.own_ideal(),
            nadir: self.model.own_nadir(),
            reachable_lb,
            reachable_ub,
            user_bounds: self.user_bounds.clone(),
            reachable_idx: self.reachable_idx.clone(),
            step_number: self.step_number,
            steps_remaining: self.steps_remaining,
            distance: self.distance,
            allowed_speeds: ALLOWED_SPEEDS.to_vec(),
            current_speed: self.current_speed,
            navigation_point: self.model.to_own(&self.navigation_point),
        }
    }

    fn request(&self) -> PendingRequests {
        PendingRequests::Single(Request::new(RequestKind::Navigation, &self.content()))
    }

    fn record_step(&mut self) {
        self.ledger.record(StepEntry {
            step_number: self.step_number,
            steps_remaining: self.steps_remaining,
            navigation_point: self.model.to_own(&self.navigation_point),
        });
    }

    /// Rows still reachable that also satisfy the client's bounds.
    fn within_bounds(&self) -> Vec<usize> {
        self.reachable_idx
            .iter()
            .copied()
            .filter(|&j| {
                self.rows[j]
                    .iter()
                    .zip(&self.user_bounds)
                    .zip(&self.model.record.minimize)
                    .all(|((f, bound), s)| match bound {
                        Some(b) => *f <= b * f64::from(*s) + REACH_TOLERANCE,
                        None => true,
                    })
            })
            .collect()
    }

    fn step_forward(&mut self, response: &NavigationResponse) -> Result<()> {
        if self.step_number >= self.total_steps {
            return Err(Error::Engine(format!(
                "navigation reached the Pareto front at step {}; go back or stop",
                self.step_number
            )));
        }
        let k = self.model.n_objectives();
        let reference_point = response
            .reference_point
            .as_deref()
            .ok_or_else(|| Error::Engine("`reference_point` is required".into()))?;
        check_vector("reference_point", reference_point, k)?;
        if let Some(bounds) = &response.user_bounds {
            if bounds.len() != k {
                return Err(Error::Engine(format!(
                    "`user_bounds` has {} values, expected {k}",
                    bounds.len()
                )));
            }
            self.user_bounds = bounds.clone();
        }
        if let Some(speed) = response.speed {
            if !ALLOWED_SPEEDS.contains(&speed) {
                return Err(Error::Engine(format!("speed {speed} is not allowed")));
            }
            self.current_speed = speed;
        }

        let candidates = self.within_bounds();
        let q = self.model.to_min(reference_point);
        let target = scalarize::best_by_asf(&self.rows, &candidates, &q, &self.model.weights())
            .ok_or_else(|| Error::Engine("no reachable solution satisfies the bounds".into()))?;
        let goal = self.rows[target].clone();

        let moves_left = f64::from(self.total_steps - self.step_number);
        self.navigation_point = if self.total_steps - self.step_number == 1 {
            goal.clone()
        } else {
            self.navigation_point
                .iter()
                .zip(&goal)
                .map(|(z, f)| z + (f - z) / moves_left)
                .collect()
        };
        self.step_number += 1;
        self.steps_remaining = self.total_steps.saturating_sub(self.step_number).max(1);

        let z = &self.navigation_point;
        let rows = &self.rows;
        let mut reachable: Vec<usize> = self
            .reachable_idx
            .iter()
            .copied()
            .filter(|&j| rows[j].iter().zip(z).all(|(f, zi)| *f <= zi + REACH_TOLERANCE))
            .collect();
        if !reachable.contains(&target) {
            reachable.push(target);
            reachable.sort_unstable();
        }
        self.reachable_idx = reachable;

        let span = scalarize::euclidean(&self.model.nadir, &goal);
        self.distance = if span > f64::EPSILON {
            100.0 * scalarize::euclidean(&self.model.nadir, &self.navigation_point) / span
        } else {
            100.0
        };
        self.record_step();
        Ok(())
    }

    fn step_back(&mut self, content: NavigationContent) -> Result<()> {
        let k = self.model.n_objectives();
        check_vector("navigation_point", &content.navigation_point, k)?;
        if content.user_bounds.len() != k {
            return Err(Error::Engine("`user_bounds` has the wrong length".into()));
        }
        if content.step_number == 0 {
            return Err(Error::Engine("step 0 is outside the navigation".into()));
        }
        let total_steps = self.budget_of(&content)?;
        if content.reachable_idx.is_empty()
            || content.reachable_idx.iter().any(|&j| j >= self.rows.len())
        {
            return Err(Error::Engine("`reachable_idx` does not name table rows".into()));
        }
        if !ALLOWED_SPEEDS.contains(&content.current_speed) {
            return Err(Error::Engine("`current_speed` is not allowed".into()));
        }
        if self.policy == HistoryPolicy::Verify {
            self.ledger.verify(&content)?;
        }

        self.total_steps = total_steps;
        self.step_number = content.step_number;
        self.steps_remaining = content.steps_remaining;
        self.navigation_point = self.model.to_min(&content.navigation_point);
        self.reachable_idx = content.reachable_idx;
        self.user_bounds = content.user_bounds;
        self.distance = content.distance;
        self.current_speed = content.current_speed;
        self.finished = false;
        Ok(())
    }

    /// Step budget implied by a resent step. A step issued with one step left
    /// is either one move short of the front or already on it, in which case
    /// the navigation point is a table row.
    fn budget_of(&self, content: &NavigationContent) -> Result<u32> {
        if content.steps_remaining == 0 {
            return Err(Error::Engine("`steps_remaining` must be at least 1".into()));
        }
        let point = self.model.to_min(&content.navigation_point);
        let on_front = content.steps_remaining == 1
            && self.rows.iter().any(|row| {
                row.iter()
                    .zip(&point)
                    .all(|(f, z)| (f - z).abs() <= REACH_TOLERANCE)
            });
        if on_front {
            return bounded_budget(Some(content.step_number));
        }
        bounded_budget(content.step_number.checked_add(content.steps_remaining))
    }

    fn change_budget(&mut self, steps_remaining: u32) -> Result<()> {
        if steps_remaining == 0 {
            return Err(Error::Engine("`steps_remaining` must be at least 1".into()));
        }
        self.total_steps = bounded_budget(self.step_number.checked_add(steps_remaining))?;
        self.steps_remaining = steps_remaining;
        self.record_step();
        Ok(())
    }

    fn stop(&mut self) -> Result<PendingRequests> {
        let chosen = scalarize::best_by_asf(
            &self.rows,
            &self.reachable_idx,
            &self.navigation_point,
            &self.model.weights(),
        )
        .ok_or_else(|| Error::Engine("nothing is reachable".into()))?;
        self.finished = true;
        let solution = match &self.model.record.payload {
            st_domain::problem::ProblemPayload::Table { variables, .. } => variables.get(chosen).cloned(),
            _ => None,
        };
        Ok(PendingRequests::Single(Request::new(
            RequestKind::Stop,
            &FinalContent {
                message: "Navigation stopped.".into(),
                objective_vector: self.model.to_own(&self.rows[chosen]),
                solution,
            },
        )))
    }
}

fn bounded_budget(total: Option<u32>) -> Result<u32> {
    match total {
        Some(total) if total <= MAX_NAVIGATION_STEPS => Ok(total),
        _ => Err(Error::Engine(format!(
            "a navigation may not exceed {MAX_NAVIGATION_STEPS} steps"
        ))),
    }
}

impl MethodEngine for NautilusNavigator {
    fn family(&self) -> MethodFamily {
        MethodFamily::Navigation
    }

    fn start(&mut self) -> Result<PendingRequests> {
        self.record_step();
        Ok(self.request())
    }

    fn iterate(&mut self, answer: Answer) -> Result<PendingRequests> {
        if self.finished {
            return Err(Error::Engine("the navigation has already stopped".into()));
        }
        let request = answered(answer, "the navigator")?;
        expect_kind(&request, RequestKind::Navigation)?;
        let response = match &request.response {
            Some(Preference::Navigation(r)) => r.clone(),
            _ => return Err(Error::Engine("expected a navigation response".into())),
        };

        if response.go_to_previous {
            let content: NavigationContent = request
                .content_as()
                .map_err(|e| Error::Engine(format!("cannot step back: {e}")))?;
            tracing::debug!(step_number = content.step_number, "navigation step back");
            self.step_back(content)?;
        } else if response.stop {
            return self.stop();
        } else if let Some(n) = response.budget_change() {
            self.change_budget(n)?;
        } else {
            self.step_forward(&response)?;
        }
        Ok(self.request())
    }

    fn snapshot(&self) -> MethodSnapshot {
        MethodSnapshot::new(EngineState::Navigator(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::model::fixtures;
    use crate::navigation;
    use serde_json::{json, Value};

    fn navigator(config: &MethodsConfig) -> NautilusNavigator {
        NautilusNavigator::new(&fixtures::discrete_problem(), config).unwrap()
    }

    fn send(nav: &mut NautilusNavigator, pending: &PendingRequests, payload: Value) -> Result<PendingRequests> {
        let answer = navigation::route(&payload, pending)?;
        nav.iterate(answer)
    }

    fn midpoint() -> Value {
        json!({ "reference_point": [0.5, -0.5, 0.5], "speed": 1, "go_to_previous": false, "stop": false })
    }

    #[test]
    fn forty_steps_reach_the_front() {
        let mut nav = navigator(&MethodsConfig::default());
        let mut pending = nav.start().unwrap();
        assert_eq!(pending.contents()["step_number"], 1);
        assert_eq!(pending.contents()["steps_remaining"], 39);

        pending = send(&mut nav, &pending, midpoint()).unwrap();
        assert_eq!(pending.contents()["step_number"], 2);
        assert_eq!(pending.contents()["steps_remaining"], 38);

        for _ in 0..38 {
            pending = send(&mut nav, &pending, midpoint()).unwrap();
        }
        assert_eq!(pending.contents()["step_number"], 40);
        assert_eq!(pending.contents()["steps_remaining"], 1);
        assert_eq!(pending.contents()["distance"], 100.0);

        let err = send(&mut nav, &pending, midpoint()).unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
    }

    #[test]
    fn reachable_set_shrinks() {
        let mut nav = navigator(&MethodsConfig::default());
        let start = nav.start().unwrap();
        let before = start.contents()["reachable_idx"].as_array().unwrap().len();
        let mut pending = start;
        for _ in 0..20 {
            pending = send(&mut nav, &pending, midpoint()).unwrap();
        }
        let after = pending.contents()["reachable_idx"].as_array().unwrap().len();
        assert!(after < before, "{after} >= {before}");
    }

    #[test]
    fn step_back_reproduces_the_step() {
        let mut nav = navigator(&MethodsConfig::default());
        let mut pending = nav.start().unwrap();
        let mut trail = Vec::new();
        for _ in 0..5 {
            pending = send(&mut nav, &pending, midpoint()).unwrap();
            trail.push(pending.contents());
        }

        let mut back = trail[1].clone();
        back["go_to_previous"] = json!(true);
        back["reference_point"] = json!([0.5, -0.5, 0.5]);
        let replayed = send(&mut nav, &pending, back.clone()).unwrap();
        assert_eq!(replayed.contents(), trail[1]);

        let again = send(&mut nav, &replayed, back).unwrap();
        assert_eq!(again.contents()["step_number"], trail[1]["step_number"]);
        assert_eq!(again.contents()["steps_remaining"], trail[1]["steps_remaining"]);
    }

    #[test]
    fn verify_policy_rejects_forged_history() {
        let config = MethodsConfig {
            history_policy: HistoryPolicy::Verify,
            ..MethodsConfig::default()
        };
        let mut nav = navigator(&config);
        let mut pending = nav.start().unwrap();
        for _ in 0..3 {
            pending = send(&mut nav, &pending, midpoint()).unwrap();
        }
        let mut forged = pending.contents();
        forged["go_to_previous"] = json!(true);
        forged["step_number"] = json!(9);
        let err = send(&mut nav, &pending, forged).unwrap_err();
        assert!(matches!(err, Error::Engine(_)));

        let mut honest = pending.contents();
        honest["go_to_previous"] = json!(true);
        assert!(send(&mut nav, &pending, honest).is_ok());
    }

    #[test]
    fn budget_change_keeps_the_step() {
        let mut nav = navigator(&MethodsConfig::default());
        let mut pending = nav.start().unwrap();
        pending = send(&mut nav, &pending, midpoint()).unwrap();
        pending = send(&mut nav, &pending, json!({ "steps_remaining": 3 })).unwrap();
        assert_eq!(pending.contents()["step_number"], 2);
        assert_eq!(pending.contents()["steps_remaining"], 3);
        for _ in 0..3 {
            pending = send(&mut nav, &pending, midpoint()).unwrap();
        }
        assert_eq!(pending.contents()["step_number"], 5);
        assert!(send(&mut nav, &pending, midpoint()).is_err());
    }

    #[test]
    fn oversized_budget_is_rejected() {
        let mut nav = navigator(&MethodsConfig::default());
        let mut pending = nav.start().unwrap();
        pending = send(&mut nav, &pending, midpoint()).unwrap();

        let err = send(&mut nav, &pending, json!({ "steps_remaining": u32::MAX })).unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        let err = send(
            &mut nav,
            &pending,
            json!({ "steps_remaining": MAX_NAVIGATION_STEPS }),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Engine(_)));

        // The navigation is untouched and still moves.
        let next = send(&mut nav, &pending, midpoint()).unwrap();
        assert_eq!(next.contents()["step_number"], 3);
        assert_eq!(next.contents()["steps_remaining"], 37);
    }

    #[test]
    fn step_back_across_a_budget_change_restores_that_budget() {
        let mut nav = navigator(&MethodsConfig::default());
        let mut pending = nav.start().unwrap();
        pending = send(&mut nav, &pending, midpoint()).unwrap();
        let before_change = pending.contents();
        assert_eq!(before_change["steps_remaining"], 38);

        pending = send(&mut nav, &pending, json!({ "steps_remaining": 3 })).unwrap();
        pending = send(&mut nav, &pending, midpoint()).unwrap();
        assert_eq!(pending.contents()["steps_remaining"], 2);

        let mut back = before_change.clone();
        back["go_to_previous"] = json!(true);
        back["reference_point"] = json!([0.5, -0.5, 0.5]);
        pending = send(&mut nav, &pending, back).unwrap();
        assert_eq!(pending.contents()["step_number"], 2);
        assert_eq!(pending.contents()["steps_remaining"], 38);

        let forward = send(&mut nav, &pending, midpoint()).unwrap();
        assert_eq!(forward.contents()["step_number"], 3);
        assert_eq!(forward.contents()["steps_remaining"], 37);
    }

    #[test]
    fn step_back_to_the_front_keeps_it_final() {
        let config = MethodsConfig {
            navigation_steps: 3,
            ..MethodsConfig::default()
        };
        let mut nav = navigator(&config);
        let mut pending = nav.start().unwrap();
        pending = send(&mut nav, &pending, midpoint()).unwrap();
        pending = send(&mut nav, &pending, midpoint()).unwrap();
        let front = pending.contents();
        assert_eq!(front["step_number"], 3);

        let mut back = front.clone();
        back["go_to_previous"] = json!(true);
        back["reference_point"] = json!([0.5, -0.5, 0.5]);
        pending = send(&mut nav, &pending, back).unwrap();
        assert!(send(&mut nav, &pending, midpoint()).is_err());
    }

    #[test]
    fn stop_returns_a_table_row() {
        let mut nav = navigator(&MethodsConfig::default());
        let mut pending = nav.start().unwrap();
        pending = send(&mut nav, &pending, midpoint()).unwrap();
        let done = send(&mut nav, &pending, json!({ "stop": true })).unwrap();
        assert!(done.is_terminal());
        assert_eq!(done.contents()["objective_vector"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn impossible_bounds_fail() {
        let mut nav = navigator(&MethodsConfig::default());
        let pending = nav.start().unwrap();
        let payload = json!({
            "reference_point": [0.5, -0.5, 0.5],
            "user_bounds": [-1.0, null, null],
        });
        assert!(send(&mut nav, &pending, payload).is_err());
    }
}
