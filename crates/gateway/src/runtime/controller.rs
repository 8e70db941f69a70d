//! Session controller.
//!
//! Drives one method session per owner through
//! `NotStarted -> Iterating -> Finished`. Every operation follows the same
//! shape: take the owner's lock, load the record, restore a working copy of
//! the engine from its snapshot, run the engine on the blocking pool, and
//! only on success swap in a new record carrying the new snapshot and the
//! new pending request together. A failure at any step leaves the stored
//! session exactly as it was.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use st_domain::config::MethodsConfig;
use st_domain::error::{Error, Result};
use st_domain::problem::ProblemRecord;
use st_domain::trace::TraceEvent;
use st_methods::{dispatch, MethodFamily, MethodRegistry, MethodSnapshot, PendingRequests};
use st_sessions::{MethodSession, ProblemStore, SessionState, SessionStore, SessionSummary};

use crate::runtime::session_lock::SessionLockMap;

/// Outcome of [`SessionController::create`].
#[derive(Debug, Clone)]
pub struct Created {
    pub session_id: String,
    pub method: String,
    pub owner: String,
    /// Whether an earlier session of the owner was discarded.
    pub replaced: bool,
}

/// What one engine call produced.
struct Exchange {
    snapshot: MethodSnapshot,
    pending: PendingRequests,
    rendered: Value,
}

pub struct SessionController {
    registry: Arc<MethodRegistry>,
    sessions: Arc<SessionStore>,
    problems: Arc<dyn ProblemStore>,
    locks: Arc<SessionLockMap>,
    config: MethodsConfig,
    /// Bound on each engine call.
    timeout: Duration,
}

impl SessionController {
    pub fn new(
        registry: Arc<MethodRegistry>,
        sessions: Arc<SessionStore>,
        problems: Arc<dyn ProblemStore>,
        locks: Arc<SessionLockMap>,
        config: MethodsConfig,
    ) -> Self {
        Self {
            registry,
            sessions,
            problems,
            locks,
            timeout: Duration::from_secs(config.iterate_timeout_secs),
            config,
        }
    }

    /// Override the engine call bound taken from `iterate_timeout_secs`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // ── create ──────────────────────────────────────────────────────

    /// Build a fresh session for `owner`, replacing any session they had.
    pub async fn create(&self, owner: &str, problem_id: u64, method: &str) -> Result<Created> {
        let spec = self.registry.get(method)?;
        let problem = self
            .problems
            .get(owner, problem_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Problem with id {problem_id} not found")))?;

        // The registry refuses problem kinds the method does not accept.
        let snapshot = self.construct(method, problem.clone()).await?;
        let session = MethodSession::new(owner, spec.name, problem.id, problem.minimize, &snapshot)?;
        let session_id = session.id.clone();

        let _permit = self.locks.acquire(owner).await?;
        let replaced = self.sessions.upsert(session)?;

        TraceEvent::SessionCreated {
            owner: owner.to_owned(),
            session_id: session_id.clone(),
            method: spec.name.to_owned(),
            problem_id,
            replaced,
        }
        .emit();

        Ok(Created {
            session_id,
            method: spec.name.to_owned(),
            owner: owner.to_owned(),
            replaced,
        })
    }

    async fn construct(&self, method: &str, problem: ProblemRecord) -> Result<MethodSnapshot> {
        let registry = self.registry.clone();
        let config = self.config.clone();
        let method = method.to_owned();
        self.blocking("create", move || {
            let (_, engine) = registry.construct(&method, &problem, &config)?;
            Ok(engine.snapshot())
        })
        .await
    }

    // ── start ───────────────────────────────────────────────────────

    /// Run the engine's first step and return the rendered request(s).
    pub async fn start(&self, owner: &str) -> Result<Value> {
        let _permit = self.locks.acquire(owner).await?;
        let session = self.sessions.require(owner)?;
        if session.state != SessionState::NotStarted {
            return Err(Error::InvalidState("Method has already been started.".into()));
        }

        let family = session.family;
        let snapshot = session.snapshot()?;
        let exchange = self
            .blocking("start", move || {
                let mut engine = snapshot.restore()?;
                let pending = engine.start()?;
                Ok(Exchange {
                    rendered: family.render(&pending, engine.population().as_ref()),
                    snapshot: engine.snapshot(),
                    pending,
                })
            })
            .await?;

        let updated = session.started(&exchange.snapshot, exchange.pending)?;
        self.sessions.upsert(updated)?;

        TraceEvent::SessionStarted {
            owner: owner.to_owned(),
            method: session.method.clone(),
        }
        .emit();
        Ok(exchange.rendered)
    }

    // ── iterate ─────────────────────────────────────────────────────

    /// Answer the pending request and advance the method.
    pub async fn iterate(
        &self,
        owner: &str,
        payload: Value,
        preference_type: Option<i64>,
    ) -> Result<Value> {
        let started = Instant::now();
        let _permit = self.locks.acquire(owner).await?;
        let session = self.sessions.require(owner)?;
        let pending = session.pending()?.clone();
        if session.state != SessionState::Iterating {
            return Err(Error::InvalidState(format!(
                "Method is {}; only a started method can be iterated.",
                session.state
            )));
        }

        let family = session.family;
        let answer = dispatch(family, preference_type, &payload, &pending)?;
        let stepping_back = family == MethodFamily::Navigation
            && payload.get("go_to_previous").and_then(Value::as_bool) == Some(true);

        let snapshot = session.snapshot()?;
        let result = self
            .blocking("iterate", move || {
                let mut engine = snapshot.restore()?;
                let pending = engine.iterate(answer)?;
                Ok(Exchange {
                    rendered: family.render(&pending, engine.population().as_ref()),
                    snapshot: engine.snapshot(),
                    pending,
                })
            })
            .await;

        let exchange = match result {
            Ok(exchange) => exchange,
            Err(Error::Engine(message)) => {
                TraceEvent::IterationFailed {
                    owner: owner.to_owned(),
                    method: session.method.clone(),
                    reason: message.clone(),
                }
                .emit();
                return Err(Error::Iteration {
                    message,
                    last_request: pending.contents(),
                });
            }
            Err(e) => return Err(e),
        };

        let updated = session.iterated(&exchange.snapshot, exchange.pending)?;
        let finished = updated.state == SessionState::Finished;
        let iteration = updated.iterations;
        self.sessions.upsert(updated)?;

        if stepping_back {
            let step_number = exchange.rendered["response"]["step_number"]
                .as_u64()
                .unwrap_or_default() as u32;
            TraceEvent::NavigationStepBack {
                owner: owner.to_owned(),
                step_number,
            }
            .emit();
        }
        TraceEvent::SessionIterated {
            owner: owner.to_owned(),
            method: session.method.clone(),
            iteration,
            finished,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        Ok(exchange.rendered)
    }

    // ── summary / delete ────────────────────────────────────────────

    pub fn summary(&self, owner: &str) -> Result<SessionSummary> {
        Ok(self.sessions.require(owner)?.summary())
    }

    pub async fn delete(&self, owner: &str) -> Result<()> {
        let _permit = self.locks.acquire(owner).await?;
        let session_id = self
            .sessions
            .remove(owner)?
            .ok_or_else(|| Error::NotFound(format!("no method session for owner {owner}")))?;
        TraceEvent::SessionDeleted {
            owner: owner.to_owned(),
            session_id,
        }
        .emit();
        Ok(())
    }

    // ── interaction types ───────────────────────────────────────────

    pub fn interaction_types(&self, owner: &str) -> Result<Value> {
        let session = self.sessions.require(owner)?;
        let engine = session.snapshot()?.restore()?;
        let types = engine.interaction_types().ok_or_else(|| {
            Error::InvalidState(format!(
                "{} has no interaction types",
                session.method
            ))
        })?;
        let current = session
            .last_request
            .as_ref()
            .and_then(current_interaction_type);
        Ok(json!({ "interaction_types": types, "current": current }))
    }

    /// Switch the active interaction type and reissue the pending requests.
    pub async fn set_interaction_type(&self, owner: &str, interaction_type: &str) -> Result<Value> {
        let _permit = self.locks.acquire(owner).await?;
        let session = self.sessions.require(owner)?;
        if session.state != SessionState::Iterating {
            return Err(Error::InvalidState(format!(
                "Method is {}; the interaction type can only change while iterating.",
                session.state
            )));
        }

        let family = session.family;
        let snapshot = session.snapshot()?;
        let requested = interaction_type.to_owned();
        let exchange = self
            .blocking("set_interaction_type", move || {
                let mut engine = snapshot.restore()?;
                let pending = engine.set_interaction_type(&requested)?;
                Ok(Exchange {
                    rendered: family.render(&pending, engine.population().as_ref()),
                    snapshot: engine.snapshot(),
                    pending,
                })
            })
            .await?;

        let updated = session.refreshed(&exchange.snapshot, exchange.pending)?;
        self.sessions.upsert(updated)?;

        TraceEvent::InteractionTypeChanged {
            owner: owner.to_owned(),
            interaction_type: interaction_type.to_owned(),
        }
        .emit();
        Ok(exchange.rendered)
    }

    // ── helpers ─────────────────────────────────────────────────────

    /// Run engine work on the blocking pool under the configured timeout.
    async fn blocking<T, F>(&self, operation: &str, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        match tokio::time::timeout(self.timeout, tokio::task::spawn_blocking(work)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_panic() => {
                tracing::error!(operation, "engine panicked");
                Err(Error::Engine(format!("{operation} failed inside the engine")))
            }
            Ok(Err(e)) => Err(Error::Other(format!("{operation} task failed: {e}"))),
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                tracing::warn!(operation, timeout_ms, "engine call timed out");
                Err(Error::Timeout(format!(
                    "{operation} did not finish within {timeout_ms}ms"
                )))
            }
        }
    }
}

fn current_interaction_type(pending: &PendingRequests) -> Option<Value> {
    match pending {
        PendingRequests::Tuple(requests) => requests
            .first()
            .and_then(|r| r.content.get("interaction_type"))
            .cloned(),
        PendingRequests::Single(_) => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
