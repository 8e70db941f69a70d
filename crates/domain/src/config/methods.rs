use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Interactive methods
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tuning shared by the method engines and the session controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodsConfig {
    /// Total number of steps a navigation takes from the nadir to the front.
    #[serde(default = "d_navigation_steps")]
    pub navigation_steps: u32,

    /// Number of issued navigation steps remembered per session.
    #[serde(default = "d_history_capacity")]
    pub history_capacity: usize,

    /// How step-back payloads sent by the client are treated.
    #[serde(default)]
    pub history_policy: HistoryPolicy,

    /// Population size of the evolutionary engines.
    #[serde(default = "d_population_size")]
    pub population_size: usize,

    /// Generations run by an evolutionary engine per `iterate` call.
    #[serde(default = "d_generations")]
    pub generations_per_iteration: usize,

    /// Points sampled from an analytical problem when a scalarizing method
    /// needs a candidate set.
    #[serde(default = "d_candidate_samples")]
    pub candidate_samples: usize,

    /// Base seed for every engine random stream.
    #[serde(default = "d_seed")]
    pub seed: u64,

    /// Upper bound on a single `start` or `iterate` call.
    #[serde(default = "d_timeout")]
    pub iterate_timeout_secs: u64,
}

impl Default for MethodsConfig {
    fn default() -> Self {
        Self {
            navigation_steps: d_navigation_steps(),
            history_capacity: d_history_capacity(),
            history_policy: HistoryPolicy::default(),
            population_size: d_population_size(),
            generations_per_iteration: d_generations(),
            candidate_samples: d_candidate_samples(),
            seed: d_seed(),
            iterate_timeout_secs: d_timeout(),
        }
    }
}

/// Step-back trust model for navigation methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// The client's resent step is taken as-is.
    #[default]
    Trust,
    /// The resent step must match the server-side ring buffer.
    Verify,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_navigation_steps() -> u32 {
    40
}
fn d_history_capacity() -> usize {
    64
}
fn d_population_size() -> usize {
    48
}
fn d_generations() -> usize {
    10
}
fn d_candidate_samples() -> usize {
    200
}
fn d_seed() -> u64 {
    0x5EED
}
fn d_timeout() -> u64 {
    30
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: MethodsConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.navigation_steps, 40);
        assert_eq!(cfg.history_policy, HistoryPolicy::Trust);
        assert_eq!(cfg.iterate_timeout_secs, 30);
    }

    #[test]
    fn history_policy_parses_snake_case() {
        let cfg: MethodsConfig = toml::from_str(r#"history_policy = "verify""#).unwrap();
        assert_eq!(cfg.history_policy, HistoryPolicy::Verify);
    }
}
