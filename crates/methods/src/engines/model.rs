//! Problem view shared by the engines. Converts between the problem's own
//! sense and minimization form, evaluates benchmarks, and builds the
//! candidate sets scalarizing engines choose from.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use st_domain::error::Result;
use st_domain::problem::{ProblemPayload, ProblemRecord};

use super::benchmarks;
use super::scalarize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemModel {
    pub record: ProblemRecord,
    /// Ideal in minimization form.
    pub ideal: Vec<f64>,
    /// Nadir in minimization form.
    pub nadir: Vec<f64>,
}

/// Objective rows in minimization form with their decision vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub objectives: Vec<Vec<f64>>,
    /// Empty when the problem carries no decision vectors.
    pub variables: Vec<Vec<f64>>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    pub fn all(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }

    pub fn variables_of(&self, i: usize) -> Option<&Vec<f64>> {
        self.variables.get(i)
    }
}

impl ProblemModel {
    pub fn new(record: &ProblemRecord) -> Result<Self> {
        record.validate()?;
        let signs: Vec<f64> = record.minimize.iter().map(|s| f64::from(*s)).collect();
        let flip = |v: &[f64]| v.iter().zip(&signs).map(|(x, s)| x * s).collect::<Vec<_>>();
        Ok(Self {
            ideal: flip(&record.ideal),
            nadir: flip(&record.nadir),
            record: record.clone(),
        })
    }

    pub fn n_objectives(&self) -> usize {
        self.record.n_objectives()
    }

    pub fn names(&self) -> &[String] {
        &self.record.objective_names
    }

    /// Own sense to minimization form. The conversion is its own inverse.
    pub fn to_min(&self, own: &[f64]) -> Vec<f64> {
        own.iter()
            .zip(&self.record.minimize)
            .map(|(v, s)| v * f64::from(*s))
            .collect()
    }

    pub fn to_own(&self, min: &[f64]) -> Vec<f64> {
        self.to_min(min)
    }

    pub fn own_ideal(&self) -> Vec<f64> {
        self.record.ideal.clone()
    }

    pub fn own_nadir(&self) -> Vec<f64> {
        self.record.nadir.clone()
    }

    pub fn weights(&self) -> Vec<f64> {
        scalarize::range_weights(&self.ideal, &self.nadir)
    }

    pub fn n_variables(&self) -> usize {
        match &self.record.payload {
            ProblemPayload::Benchmark { n_variables, .. } => *n_variables,
            ProblemPayload::Table { variables, .. } => variables.first().map(Vec::len).unwrap_or(0),
        }
    }

    /// Evaluate a decision vector in minimization form. Tables have no
    /// objective functions and yield `None`.
    pub fn evaluate(&self, x: &[f64]) -> Option<Vec<f64>> {
        match &self.record.payload {
            ProblemPayload::Benchmark { benchmark, .. } => {
                let own = benchmarks::evaluate(*benchmark, x, self.n_objectives());
                Some(self.to_min(&own))
            }
            ProblemPayload::Table { .. } => None,
        }
    }

    /// The set a scalarizing engine chooses from: the table rows, or a
    /// seeded sample of the benchmark's Pareto front.
    pub fn candidates(&self, samples: usize, seed: u64) -> CandidateSet {
        match &self.record.payload {
            ProblemPayload::Table {
                objectives,
                variables,
            } => CandidateSet {
                objectives: objectives.iter().map(|row| self.to_min(row)).collect(),
                variables: variables.clone(),
            },
            ProblemPayload::Benchmark {
                benchmark,
                n_variables,
            } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let positions = benchmarks::position_variables(*benchmark, self.n_objectives());
                let mut set = CandidateSet::default();
                for _ in 0..samples.max(1) {
                    let t: Vec<f64> = (0..positions).map(|_| rng.gen::<f64>()).collect();
                    let x = benchmarks::pareto_point(*benchmark, &t, *n_variables);
                    let own = benchmarks::evaluate(*benchmark, &x, self.n_objectives());
                    set.objectives.push(self.to_min(&own));
                    set.variables.push(x);
                }
                set
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximized_objectives_are_flipped() {
        let model = ProblemModel::new(&fixtures::discrete_problem()).unwrap();
        assert_eq!(model.ideal, vec![0.0, 0.0, 0.0]);
        assert_eq!(model.nadir, vec![1.0, 1.0, 1.0]);
        assert_eq!(model.to_own(&model.to_min(&[0.2, -0.3, 0.5])), vec![0.2, -0.3, 0.5]);
    }

    #[test]
    fn benchmark_candidates_are_seeded() {
        let model = ProblemModel::new(&fixtures::dtlz2_problem()).unwrap();
        let a = model.candidates(20, 1);
        let b = model.candidates(20, 1);
        let c = model.candidates(20, 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 20);
        assert_eq!(a.variables[0].len(), 8);
    }

    #[test]
    fn tables_cannot_be_evaluated() {
        let model = ProblemModel::new(&fixtures::discrete_problem()).unwrap();
        assert!(model.evaluate(&[0.0]).is_none());
        assert_eq!(model.candidates(5, 0).len(), 67);
    }
}
