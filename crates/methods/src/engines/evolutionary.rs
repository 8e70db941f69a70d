//! Evolutionary reference engine (RVEA and NSGA-III flavoured).
//!
//! A real-coded population over the benchmark's `[0, 1]` box. Every
//! generation creates offspring by blend crossover and mutation, merges them
//! with the parents and keeps the best half by non-dominated rank and a
//! secondary key. Without preferences the key is crowding distance (NSGA-III
//! flavour) or the scalarized distance to the ideal (RVEA flavour); with
//! preferences it measures how well a solution matches them.
//!
//! Each generation draws from its own stream seeded by `(seed, generation)`,
//! so a restored snapshot continues exactly where the saved run left off.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use st_domain::config::MethodsConfig;
use st_domain::error::{Error, Result};
use st_domain::problem::ProblemRecord;

use super::model::ProblemModel;
use super::scalarize;
use crate::engine::{MethodEngine, PopulationView};
use crate::family::MethodFamily;
use crate::preference::Preference;
use crate::request::{Answer, PendingRequests, Request, RequestKind};
use crate::snapshot::{EngineState, MethodSnapshot};

const MUTATION_SPREAD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionaryVariant {
    Rvea,
    Nsga3,
}

/// How the client expresses preferences to a population method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionType {
    #[serde(rename = "Reference point")]
    ReferencePoint,
    #[serde(rename = "Preferred solutions")]
    PreferredSolutions,
    #[serde(rename = "Non-preferred solutions")]
    NonPreferredSolutions,
    #[serde(rename = "Preferred ranges")]
    PreferredRanges,
}

impl InteractionType {
    const ALL: [InteractionType; 4] = [
        Self::ReferencePoint,
        Self::PreferredSolutions,
        Self::NonPreferredSolutions,
        Self::PreferredRanges,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReferencePoint => "Reference point",
            Self::PreferredSolutions => "Preferred solutions",
            Self::NonPreferredSolutions => "Non-preferred solutions",
            Self::PreferredRanges => "Preferred ranges",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Whether a preference may be given while this type is active.
    /// Classification resolves to a reference point.
    fn admits(self, preference: &Preference) -> bool {
        matches!(
            (self, preference),
            (Self::ReferencePoint, Preference::ReferencePoint { .. })
                | (Self::ReferencePoint, Preference::Classification { .. })
                | (Self::PreferredSolutions, Preference::PreferredSolutions { .. })
                | (Self::NonPreferredSolutions, Preference::NonPreferredSolutions { .. })
                | (Self::PreferredRanges, Preference::Bounds { .. })
        )
    }

    /// The request slot answered in this mode.
    fn request_kind(self) -> RequestKind {
        match self {
            Self::ReferencePoint => RequestKind::ReferencePoint,
            Self::PreferredSolutions => RequestKind::PreferredSolutions,
            Self::NonPreferredSolutions => RequestKind::NonPreferredSolutions,
            Self::PreferredRanges => RequestKind::Bounds,
        }
    }
}

/// Active steering, in minimization form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Steering {
    Reference { point: Vec<f64> },
    Towards { rows: Vec<Vec<f64>> },
    AwayFrom { rows: Vec<Vec<f64>> },
    Ranges { lower: Vec<f64>, upper: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionaryMethod {
    model: ProblemModel,
    variant: EvolutionaryVariant,
    interactive: bool,
    population_size: usize,
    generations_per_iteration: usize,
    seed: u64,
    generation: u64,
    individuals: Vec<Vec<f64>>,
    /// Minimization form, row for row with `individuals`.
    objectives: Vec<Vec<f64>>,
    interaction_type: InteractionType,
    steering: Option<Steering>,
    finished: bool,
}

impl EvolutionaryMethod {
    pub fn new(
        problem: &ProblemRecord,
        config: &MethodsConfig,
        variant: EvolutionaryVariant,
        interactive: bool,
    ) -> Result<Self> {
        let model = ProblemModel::new(problem)?;
        if model.evaluate(&vec![0.5; model.n_variables()]).is_none() {
            return Err(Error::IncompatibleProblemType(
                "evolutionary methods need objective functions".into(),
            ));
        }
        Ok(Self {
            model,
            variant,
            interactive,
            population_size: config.population_size.max(4),
            generations_per_iteration: config.generations_per_iteration,
            seed: config.seed,
            generation: 0,
            individuals: Vec::new(),
            objectives: Vec::new(),
            interaction_type: InteractionType::ReferencePoint,
            steering: None,
            finished: false,
        })
    }

    fn rng_for(&self, generation: u64) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ generation.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    fn evaluate(&self, x: &[f64]) -> Vec<f64> {
        self.model
            .evaluate(x)
            .unwrap_or_else(|| vec![f64::INFINITY; self.model.n_objectives()])
    }

    fn initialize(&mut self) {
        let mut rng = self.rng_for(0);
        let n = self.model.n_variables();
        self.individuals = (0..self.population_size)
            .map(|_| (0..n).map(|_| rng.gen::<f64>()).collect())
            .collect();
        self.objectives = self.individuals.iter().map(|x| self.evaluate(x)).collect();
    }

    fn evolve(&mut self) {
        for _ in 0..self.generations_per_iteration {
            self.generation += 1;
            let mut rng = self.rng_for(self.generation);
            let ranks = scalarize::ranks(&self.objectives);
            let n_vars = self.model.n_variables();

            let mut offspring = Vec::with_capacity(self.population_size);
            for _ in 0..self.population_size {
                let a = tournament(&ranks, &mut rng);
                let b = tournament(&ranks, &mut rng);
                let child: Vec<f64> = (0..n_vars)
                    .map(|v| {
                        let alpha = rng.gen::<f64>();
                        let mut gene = alpha * self.individuals[a][v] + (1.0 - alpha) * self.individuals[b][v];
                        if rng.gen::<f64>() < 1.0 / n_vars as f64 {
                            gene += rng.gen_range(-MUTATION_SPREAD..MUTATION_SPREAD);
                        }
                        gene.clamp(0.0, 1.0)
                    })
                    .collect();
                offspring.push(child);
            }

            let mut individuals = std::mem::take(&mut self.individuals);
            let mut objectives = std::mem::take(&mut self.objectives);
            for child in offspring {
                objectives.push(self.evaluate(&child));
                individuals.push(child);
            }
            let keep = self.survivors(&objectives);
            self.individuals = keep.iter().map(|&i| individuals[i].clone()).collect();
            self.objectives = keep.iter().map(|&i| objectives[i].clone()).collect();
        }
    }

    /// Indices of the rows that survive into the next generation.
    fn survivors(&self, rows: &[Vec<f64>]) -> Vec<usize> {
        let fronts = scalarize::non_dominated_fronts(rows);
        let mut rank = vec![0usize; rows.len()];
        let mut crowding = vec![0.0; rows.len()];
        for (r, front) in fronts.iter().enumerate() {
            for (&i, d) in front.iter().zip(scalarize::crowding_distance(rows, front)) {
                rank[i] = r;
                crowding[i] = d;
            }
        }

        let weights = self.model.weights();
        let score = |i: usize| -> (f64, f64) {
            let f = &rows[i];
            match &self.steering {
                None => match self.variant {
                    EvolutionaryVariant::Nsga3 => (0.0, -crowding[i]),
                    EvolutionaryVariant::Rvea => (0.0, scalarize::asf(f, &self.model.ideal, &weights)),
                },
                Some(Steering::Reference { point }) => (0.0, scalarize::asf(f, point, &weights)),
                Some(Steering::Towards { rows: liked }) => (0.0, nearest(f, liked)),
                Some(Steering::AwayFrom { rows: disliked }) => (0.0, -nearest(f, disliked)),
                Some(Steering::Ranges { lower, upper }) => {
                    let violation: f64 = f
                        .iter()
                        .zip(lower.iter().zip(upper))
                        .map(|(v, (lo, hi))| (lo - v).max(0.0) + (v - hi).max(0.0))
                        .sum();
                    (violation, -crowding[i])
                }
            }
        };

        let mut order: Vec<usize> = (0..rows.len()).collect();
        let keys: Vec<(f64, f64)> = order.iter().map(|&i| score(i)).collect();
        order.sort_by(|&a, &b| {
            keys[a]
                .0
                .partial_cmp(&keys[b].0)
                .unwrap_or(Ordering::Equal)
                .then(rank[a].cmp(&rank[b]))
                .then(keys[a].1.partial_cmp(&keys[b].1).unwrap_or(Ordering::Equal))
                .then(a.cmp(&b))
        });
        order.truncate(self.population_size);
        order
    }

    fn steer(&mut self, preference: &Preference) -> Result<()> {
        let k = self.model.n_objectives();
        let pick = |indices: &[usize]| -> Result<Vec<Vec<f64>>> {
            if indices.is_empty() {
                return Err(Error::Engine("select at least one solution".into()));
            }
            indices
                .iter()
                .map(|&i| {
                    self.objectives.get(i).cloned().ok_or_else(|| {
                        Error::Engine(format!("solution {i} is not in the population"))
                    })
                })
                .collect()
        };

        let steering = match preference {
            Preference::PreferredSolutions { indices } => Steering::Towards { rows: pick(indices)? },
            Preference::NonPreferredSolutions { indices } => Steering::AwayFrom { rows: pick(indices)? },
            Preference::ReferencePoint { columns, values } => {
                let ordered = self
                    .model
                    .names()
                    .iter()
                    .map(|name| {
                        columns
                            .iter()
                            .position(|c| c == name)
                            .map(|p| values[p])
                            .ok_or_else(|| Error::Engine(format!("no value for objective `{name}`")))
                    })
                    .collect::<Result<Vec<f64>>>()?;
                super::check_vector("reference point", &ordered, k)?;
                Steering::Reference {
                    point: self.model.to_min(&ordered),
                }
            }
            Preference::Bounds { matrix } => {
                if matrix.len() != k || matrix.iter().any(|r| r.len() != 2 || r[0] > r[1]) {
                    return Err(Error::Engine(format!(
                        "bounds must be {k} rows of [lower, upper]"
                    )));
                }
                let (lower, upper): (Vec<f64>, Vec<f64>) = matrix
                    .iter()
                    .zip(&self.model.record.minimize)
                    .map(|(r, s)| {
                        let s = f64::from(*s);
                        let (a, b) = (r[0] * s, r[1] * s);
                        (a.min(b), a.max(b))
                    })
                    .unzip();
                Steering::Ranges { lower, upper }
            }
            Preference::Classification {
                current_solution,
                classifications,
                levels,
            } => {
                if classifications.len() != k || levels.len() != k {
                    return Err(Error::Engine(format!(
                        "classification needs {k} symbols and {k} levels"
                    )));
                }
                let levels = self.model.to_min(levels);
                let current = if current_solution.len() == k {
                    self.model.to_min(current_solution)
                } else {
                    levels.clone()
                };
                let point = classifications
                    .iter()
                    .enumerate()
                    .map(|(i, c)| match c.as_str() {
                        "<" => Ok(self.model.ideal[i]),
                        "<=" | ">=" => Ok(levels[i]),
                        "=" => Ok(current[i]),
                        "0" => Ok(self.model.nadir[i]),
                        other => Err(Error::Engine(format!("unknown classification `{other}`"))),
                    })
                    .collect::<Result<Vec<f64>>>()?;
                Steering::Reference { point }
            }
            other => return Err(Error::Engine(format!("unsupported preference {other:?}"))),
        };
        self.steering = Some(steering);
        Ok(())
    }

    fn requests(&self) -> PendingRequests {
        let dimensions = json!({
            "columns": self.model.names(),
            "ideal": self.model.own_ideal(),
            "nadir": self.model.own_nadir(),
            "minimize": self.model.record.minimize,
        });
        let active = self.interaction_type.as_str();
        let answered = self.interaction_type.request_kind();
        let n = self.individuals.len();
        PendingRequests::Tuple(vec![
            Request::new(
                RequestKind::PreferredSolutions,
                &json!({
                    "message": format!("Select preferred solutions by index (0 to {}).", n.saturating_sub(1)),
                    "interaction_type": active,
                    "active": answered == RequestKind::PreferredSolutions,
                }),
            ),
            Request::new(
                RequestKind::NonPreferredSolutions,
                &json!({
                    "message": format!("Select non-preferred solutions by index (0 to {}).", n.saturating_sub(1)),
                    "interaction_type": active,
                    "active": answered == RequestKind::NonPreferredSolutions,
                }),
            ),
            Request::new(
                RequestKind::ReferencePoint,
                &json!({
                    "message": "Provide one aspiration level per column of `dimensions_data`.",
                    "interaction_type": active,
                    "active": answered == RequestKind::ReferencePoint,
                    "dimensions_data": dimensions,
                }),
            ),
            Request::new(
                RequestKind::Bounds,
                &json!({
                    "message": "Provide a [lower, upper] range per column of `dimensions_data`.",
                    "interaction_type": active,
                    "active": answered == RequestKind::Bounds,
                    "dimensions_data": dimensions,
                }),
            ),
        ])
    }

    fn finish(&mut self) -> PendingRequests {
        let front = scalarize::non_dominated_fronts(&self.objectives)
            .into_iter()
            .next()
            .unwrap_or_default();
        self.individuals = front.iter().map(|&i| self.individuals[i].clone()).collect();
        self.objectives = front.iter().map(|&i| self.objectives[i].clone()).collect();
        self.finished = true;
        PendingRequests::Single(Request::new(
            RequestKind::Stop,
            &json!({
                "message": "Final non-dominated population.",
                "individuals": self.individuals,
                "objectives": self.objectives.iter().map(|f| self.model.to_own(f)).collect::<Vec<_>>(),
            }),
        ))
    }
}

impl MethodEngine for EvolutionaryMethod {
    fn family(&self) -> MethodFamily {
        MethodFamily::Population
    }

    fn start(&mut self) -> Result<PendingRequests> {
        self.initialize();
        self.evolve();
        Ok(self.requests())
    }

    fn iterate(&mut self, answer: Answer) -> Result<PendingRequests> {
        if self.finished {
            return Err(Error::Engine("the method has already finished".into()));
        }
        match answer {
            Answer::Finalize => return Ok(self.finish()),
            Answer::Advance => self.steering = None,
            Answer::Respond(request) => {
                if self.interactive {
                    let preference = request
                        .response
                        .as_ref()
                        .ok_or_else(|| Error::Engine("request carries no preference".into()))?;
                    if !self.interaction_type.admits(preference) {
                        return Err(Error::Engine(format!(
                            "the active interaction type is `{}`; switch it before giving this preference",
                            self.interaction_type.as_str()
                        )));
                    }
                    self.steer(preference)?;
                }
            }
        }
        self.evolve();
        Ok(self.requests())
    }

    fn snapshot(&self) -> MethodSnapshot {
        MethodSnapshot::new(EngineState::Evolutionary(self.clone()))
    }

    fn population(&self) -> Option<PopulationView> {
        Some(PopulationView {
            individuals: self.individuals.clone(),
            objectives: self.objectives.iter().map(|f| self.model.to_own(f)).collect(),
            ideal: self.model.own_ideal(),
            nadir: self.model.own_nadir(),
        })
    }

    fn interaction_types(&self) -> Option<Vec<String>> {
        Some(InteractionType::ALL.iter().map(|t| t.as_str().to_string()).collect())
    }

    fn set_interaction_type(&mut self, interaction_type: &str) -> Result<PendingRequests> {
        if self.finished {
            return Err(Error::InvalidState("the method has already finished".into()));
        }
        self.interaction_type = InteractionType::parse(interaction_type).ok_or_else(|| {
            Error::InvalidPreference(format!(
                "unknown interaction type `{interaction_type}`; allowed: {:?}",
                InteractionType::ALL.map(InteractionType::as_str)
            ))
        })?;
        Ok(self.requests())
    }
}

/// Binary tournament on non-dominated rank.
fn tournament(ranks: &[usize], rng: &mut StdRng) -> usize {
    let i = rng.gen_range(0..ranks.len());
    let j = rng.gen_range(0..ranks.len());
    if ranks[j] < ranks[i] {
        j
    } else {
        i
    }
}

/// Distance from `f` to the closest of `rows`.
fn nearest(f: &[f64], rows: &[Vec<f64>]) -> f64 {
    rows.iter()
        .map(|r| scalarize::euclidean(f, r))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::model::fixtures;
    use crate::preference;
    use serde_json::json;

    fn config() -> MethodsConfig {
        MethodsConfig {
            population_size: 16,
            generations_per_iteration: 3,
            ..MethodsConfig::default()
        }
    }

    fn irvea() -> EvolutionaryMethod {
        EvolutionaryMethod::new(&fixtures::dtlz2_problem(), &config(), EvolutionaryVariant::Rvea, true).unwrap()
    }

    #[test]
    fn start_issues_four_requests_and_a_population() {
        let mut ea = irvea();
        let pending = ea.start().unwrap();
        let PendingRequests::Tuple(requests) = &pending else {
            panic!("tuple expected");
        };
        assert_eq!(requests.len(), 4);
        let pop = ea.population().unwrap();
        assert_eq!(pop.individuals.len(), 16);
        assert_eq!(pop.objectives[0].len(), 4);
    }

    #[test]
    fn every_preference_type_iterates() {
        let mut ea = irvea();
        let mut pending = ea.start().unwrap();
        let payloads = [
            ("Reference point", 0, json!({ "preference_data": 0 })),
            ("Preferred solutions", 1, json!({ "preference_data": [1, 2, 3] })),
            ("Non-preferred solutions", 2, json!({ "preference_data": [1, 2, 3] })),
            ("Reference point", 3, json!({ "preference_data": [0.5, 0.5, 0.5, 0.5] })),
            ("Preferred ranges", 4, json!({ "preference_data": [[0.5, 0.7], [0.2, 0.5], [0.1, 0.5], [0.2, 0.6]] })),
            ("Reference point", 5, json!({ "classifications": ["<", "0", "=", ">="], "levels": [0.1, 0.9, 0.5, 0.6], "current_solution": [0.3, 0.3, 0.5, 0.5] })),
        ];
        for (mode, index, payload) in payloads {
            pending = ea.set_interaction_type(mode).unwrap();
            let answer = preference::dispatch(MethodFamily::Population, Some(index), &payload, &pending).unwrap();
            pending = ea.iterate(answer).unwrap();
            assert!(!pending.is_terminal(), "index {index}");
        }
        let done = ea.iterate(Answer::Finalize).unwrap();
        assert!(done.is_terminal());
        assert!(ea.iterate(Answer::Advance).is_err());
    }

    #[test]
    fn restored_snapshot_continues_identically() {
        let mut ea = irvea();
        let pending = ea.start().unwrap();
        let mut copy = ea.snapshot().restore().unwrap();

        let payload = json!({ "preference_data": [0.2, 0.2, 0.6, 0.6] });
        let answer = preference::dispatch(MethodFamily::Population, Some(3), &payload, &pending).unwrap();
        let a = ea.iterate(answer.clone()).unwrap();
        let b = copy.iterate(answer).unwrap();
        assert_eq!(a, b);
        assert_eq!(ea.population(), copy.population());
    }

    #[test]
    fn reference_point_pulls_the_population() {
        let mut ea = irvea();
        let pending = ea.start().unwrap();
        let target = [0.9, 0.1, 0.1, 0.1];
        let payload = json!({ "preference_data": target });
        for _ in 0..3 {
            let answer = preference::dispatch(MethodFamily::Population, Some(3), &payload, &pending).unwrap();
            ea.iterate(answer).unwrap();
        }
        let pop = ea.population().unwrap();
        let mean_f1: f64 = pop.objectives.iter().map(|f| f[0]).sum::<f64>() / pop.objectives.len() as f64;
        let mean_f2: f64 = pop.objectives.iter().map(|f| f[1]).sum::<f64>() / pop.objectives.len() as f64;
        assert!(mean_f1 > mean_f2, "f1 {mean_f1} f2 {mean_f2}");
    }

    #[test]
    fn out_of_population_index_is_rejected() {
        let mut ea = irvea();
        ea.start().unwrap();
        let pending = ea.set_interaction_type("Preferred solutions").unwrap();
        let payload = json!({ "preference_data": [99] });
        let answer = preference::dispatch(MethodFamily::Population, Some(1), &payload, &pending).unwrap();
        assert!(matches!(ea.iterate(answer), Err(Error::Engine(_))));
    }

    #[test]
    fn non_interactive_variant_ignores_preferences() {
        let mut ea =
            EvolutionaryMethod::new(&fixtures::dtlz2_problem(), &config(), EvolutionaryVariant::Nsga3, false).unwrap();
        let pending = ea.start().unwrap();
        let payload = json!({ "preference_data": [99] });
        let answer = preference::dispatch(MethodFamily::Population, Some(1), &payload, &pending).unwrap();
        assert!(ea.iterate(answer).is_ok());
    }

    #[test]
    fn interaction_type_must_be_known() {
        let mut ea = irvea();
        ea.start().unwrap();
        assert_eq!(ea.interaction_types().unwrap().len(), 4);
        let pending = ea.set_interaction_type("Preferred ranges").unwrap();
        assert_eq!(pending.contents()[0]["interaction_type"], "Preferred ranges");
        assert!(matches!(ea.set_interaction_type("Telepathy"), Err(Error::InvalidPreference(_))));
    }

    #[test]
    fn interaction_type_gates_the_preference() {
        let mut ea = irvea();
        ea.start().unwrap();
        let untouched = ea.clone();

        let pending = ea.set_interaction_type("Preferred ranges").unwrap();
        let flags: Vec<bool> = (0..4)
            .map(|i| pending.contents()[i]["active"].as_bool().unwrap())
            .collect();
        assert_eq!(flags, [false, false, false, true]);

        let payload = json!({ "preference_data": [0.5, 0.5, 0.5, 0.5] });
        let answer = preference::dispatch(MethodFamily::Population, Some(3), &payload, &pending).unwrap();
        assert!(matches!(ea.iterate(answer), Err(Error::Engine(_))));
        assert_eq!(ea.population(), untouched.population());

        let ranges = json!({ "preference_data": [[0.0, 0.5], [0.0, 0.5], [0.0, 0.5], [0.0, 1.0]] });
        let answer = preference::dispatch(MethodFamily::Population, Some(4), &ranges, &pending).unwrap();
        assert!(ea.iterate(answer).is_ok());

        // Unsteered advance is accepted in every mode.
        assert!(ea.iterate(Answer::Advance).is_ok());
    }

    #[test]
    fn tables_are_refused() {
        let err = EvolutionaryMethod::new(&fixtures::discrete_problem(), &config(), EvolutionaryVariant::Rvea, true)
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleProblemType(_)));
    }
}
