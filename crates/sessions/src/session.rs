//! The per-owner method session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use st_domain::error::{Error, Result};
use st_methods::{MethodFamily, MethodSnapshot, PendingRequests};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Iterating,
    Finished,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Iterating => "iterating",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A method session owned by exactly one user.
///
/// The record is never edited in place by callers: [`started`](Self::started),
/// [`iterated`](Self::iterated) and [`refreshed`](Self::refreshed) each return
/// a new record carrying a new snapshot and a new pending request together,
/// which the store then swaps in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSession {
    pub id: String,
    pub owner: String,
    pub method: String,
    pub family: MethodFamily,
    pub problem_id: u64,
    pub state: SessionState,
    /// Versioned [`MethodSnapshot`], kept opaque so a bad snapshot only
    /// breaks its own session.
    pub algorithm_state: Value,
    #[serde(default)]
    pub last_request: Option<PendingRequests>,
    pub minimize: Vec<i8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub iterations: u64,
}

/// What `GET /method/create` reports.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub method: String,
    pub family: MethodFamily,
    pub state: SessionState,
    pub problem_id: u64,
    pub iterations: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MethodSession {
    /// Fresh session that has not been started yet.
    pub fn new(
        owner: &str,
        method: &str,
        problem_id: u64,
        minimize: Vec<i8>,
        snapshot: &MethodSnapshot,
    ) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_owned(),
            method: method.to_owned(),
            family: snapshot.family,
            problem_id,
            state: SessionState::NotStarted,
            algorithm_state: snapshot.to_value()?,
            last_request: None,
            minimize,
            created_at: now,
            updated_at: now,
            iterations: 0,
        })
    }

    /// Parse the stored engine state.
    pub fn snapshot(&self) -> Result<MethodSnapshot> {
        let snapshot = MethodSnapshot::from_value(&self.algorithm_state)?;
        if snapshot.family != self.family {
            return Err(Error::Serialization(format!(
                "session {} is a {} session but holds a {} snapshot",
                self.id, self.family, snapshot.family
            )));
        }
        Ok(snapshot)
    }

    /// The request the client is expected to answer.
    pub fn pending(&self) -> Result<&PendingRequests> {
        self.last_request.as_ref().ok_or(Error::NoPendingRequest)
    }

    /// Record produced by a successful `start`.
    pub fn started(&self, snapshot: &MethodSnapshot, pending: PendingRequests) -> Result<Self> {
        self.exchange(snapshot, pending, 0)
    }

    /// Record produced by a successful `iterate`.
    pub fn iterated(&self, snapshot: &MethodSnapshot, pending: PendingRequests) -> Result<Self> {
        self.exchange(snapshot, pending, 1)
    }

    /// Record produced when the engine reissued its requests without an
    /// iteration (interaction type switch).
    pub fn refreshed(&self, snapshot: &MethodSnapshot, pending: PendingRequests) -> Result<Self> {
        self.exchange(snapshot, pending, 0)
    }

    fn exchange(
        &self,
        snapshot: &MethodSnapshot,
        pending: PendingRequests,
        counted: u64,
    ) -> Result<Self> {
        let state = if pending.is_terminal() {
            SessionState::Finished
        } else {
            SessionState::Iterating
        };
        Ok(Self {
            state,
            algorithm_state: snapshot.to_value()?,
            last_request: Some(pending),
            updated_at: Utc::now(),
            iterations: self.iterations + counted,
            ..self.clone()
        })
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            method: self.method.clone(),
            family: self.family,
            state: self.state,
            problem_id: self.problem_id,
            iterations: self.iterations,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
