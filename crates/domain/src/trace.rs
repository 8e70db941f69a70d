use serde::Serialize;

/// Structured trace events emitted across all Steer crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        owner: String,
        session_id: String,
        method: String,
        problem_id: u64,
        replaced: bool,
    },
    SessionStarted {
        owner: String,
        method: String,
    },
    SessionIterated {
        owner: String,
        method: String,
        iteration: u64,
        finished: bool,
        duration_ms: u64,
    },
    IterationFailed {
        owner: String,
        method: String,
        reason: String,
    },
    NavigationStepBack {
        owner: String,
        step_number: u32,
    },
    InteractionTypeChanged {
        owner: String,
        interaction_type: String,
    },
    SessionDeleted {
        owner: String,
        session_id: String,
    },
    StoreFlushed {
        sessions: usize,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "st_event");
    }
}
