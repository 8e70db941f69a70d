use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `sessions/methods.json` and `problems.json`.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./data/state")
}
