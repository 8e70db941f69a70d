//! Problem model as exposed by the problem store.
//!
//! Objective values (rows, ideal, nadir) are stored in the problem's own
//! sense. `minimize[i]` is `1` for a minimized objective and `-1` for a
//! maximized one; engines multiply by it to work in minimization form.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Structural type of a problem. Methods declare which kinds they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProblemKind {
    /// Defined by objective functions over continuous variables.
    Analytical,
    /// An enumerable table of pre-computed objective vectors.
    Discrete,
}

impl std::fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analytical => write!(f, "Analytical"),
            Self::Discrete => write!(f, "Discrete"),
        }
    }
}

/// Built-in analytical test problems. Every variable is bounded to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Benchmark {
    Dtlz1,
    Dtlz2,
    Zdt1,
}

/// What the engines work on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProblemPayload {
    Benchmark {
        benchmark: Benchmark,
        n_variables: usize,
    },
    Table {
        objectives: Vec<Vec<f64>>,
        /// Decision vectors matching `objectives` row for row. May be empty.
        #[serde(default)]
        variables: Vec<Vec<f64>>,
    },
}

/// A problem owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub id: u64,
    pub owner: String,
    pub name: String,
    pub kind: ProblemKind,
    pub objective_names: Vec<String>,
    pub ideal: Vec<f64>,
    pub nadir: Vec<f64>,
    pub minimize: Vec<i8>,
    pub payload: ProblemPayload,
}

impl ProblemRecord {
    pub fn n_objectives(&self) -> usize {
        self.objective_names.len()
    }

    /// Check the record is internally consistent.
    pub fn validate(&self) -> Result<()> {
        let k = self.n_objectives();
        if k < 2 {
            return Err(Error::Config(format!(
                "problem {}: at least two objectives are required, got {k}",
                self.id
            )));
        }
        for (field, len) in [
            ("ideal", self.ideal.len()),
            ("nadir", self.nadir.len()),
            ("minimize", self.minimize.len()),
        ] {
            if len != k {
                return Err(Error::Config(format!(
                    "problem {}: `{field}` has {len} entries, expected {k}",
                    self.id
                )));
            }
        }
        if self.minimize.iter().any(|s| *s != 1 && *s != -1) {
            return Err(Error::Config(format!(
                "problem {}: `minimize` entries must be 1 or -1",
                self.id
            )));
        }

        match (&self.kind, &self.payload) {
            (ProblemKind::Analytical, ProblemPayload::Benchmark { benchmark, n_variables }) => {
                let min_vars = match benchmark {
                    Benchmark::Zdt1 => 2,
                    Benchmark::Dtlz1 | Benchmark::Dtlz2 => k,
                };
                if *n_variables < min_vars {
                    return Err(Error::Config(format!(
                        "problem {}: {benchmark:?} needs at least {min_vars} variables",
                        self.id
                    )));
                }
                if *benchmark == Benchmark::Zdt1 && k != 2 {
                    return Err(Error::Config(format!(
                        "problem {}: zdt1 has exactly two objectives",
                        self.id
                    )));
                }
            }
            (ProblemKind::Discrete, ProblemPayload::Table { objectives, variables }) => {
                if objectives.is_empty() {
                    return Err(Error::Config(format!(
                        "problem {}: discrete problem has no rows",
                        self.id
                    )));
                }
                if let Some(i) = objectives.iter().position(|row| row.len() != k) {
                    return Err(Error::Config(format!(
                        "problem {}: objective row {i} does not have {k} values",
                        self.id
                    )));
                }
                if !variables.is_empty() && variables.len() != objectives.len() {
                    return Err(Error::Config(format!(
                        "problem {}: {} decision rows for {} objective rows",
                        self.id,
                        variables.len(),
                        objectives.len()
                    )));
                }
            }
            (kind, _) => {
                return Err(Error::Config(format!(
                    "problem {}: payload does not match kind {kind}",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn table_problem() -> ProblemRecord {
        ProblemRecord {
            id: 1,
            owner: "u1".into(),
            name: "table".into(),
            kind: ProblemKind::Discrete,
            objective_names: vec!["f1".into(), "f2".into()],
            ideal: vec![0.0, 0.0],
            nadir: vec![1.0, 1.0],
            minimize: vec![1, 1],
            payload: ProblemPayload::Table {
                objectives: vec![vec![0.0, 1.0], vec![1.0, 0.0]],
                variables: vec![],
            },
        }
    }

    #[test]
    fn valid_table_passes() {
        assert!(table_problem().validate().is_ok());
    }

    #[test]
    fn ragged_row_is_rejected() {
        let mut p = table_problem();
        p.payload = ProblemPayload::Table {
            objectives: vec![vec![0.0, 1.0], vec![1.0]],
            variables: vec![],
        };
        let err = p.validate().unwrap_err().to_string();
        assert!(err.contains("row 1"), "{err}");
    }

    #[test]
    fn minimize_must_be_signs() {
        let mut p = table_problem();
        p.minimize = vec![1, 0];
        assert!(p.validate().is_err());
    }

    #[test]
    fn kind_payload_mismatch_is_rejected() {
        let mut p = table_problem();
        p.kind = ProblemKind::Analytical;
        assert!(p.validate().is_err());
    }

    #[test]
    fn payload_is_tagged_in_json() {
        let json = serde_json::json!({
            "type": "benchmark",
            "benchmark": "dtlz2",
            "n_variables": 5
        });
        let payload: ProblemPayload = serde_json::from_value(json).unwrap();
        assert_eq!(
            payload,
            ProblemPayload::Benchmark {
                benchmark: Benchmark::Dtlz2,
                n_variables: 5
            }
        );
    }
}
