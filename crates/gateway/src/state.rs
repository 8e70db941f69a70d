use std::sync::Arc;

use chrono::{DateTime, Utc};

use st_domain::config::Config;
use st_methods::MethodRegistry;
use st_sessions::{ProblemStore, SessionStore};

use crate::api::auth::TokenTable;
use crate::runtime::{SessionController, SessionLockMap};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, method registry, session controller
/// - **Persistence**: session and problem stores
/// - **Runtime**: per-owner locks
/// - **Security**: token digests (startup-computed)
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub registry: Arc<MethodRegistry>,
    pub controller: Arc<SessionController>,

    // ── Persistence ───────────────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    pub problems: Arc<dyn ProblemStore>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub session_locks: Arc<SessionLockMap>,
    pub started_at: DateTime<Utc>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// Owner token digests. Empty = dev mode (owner from `X-Owner`).
    pub tokens: Arc<TokenTable>,
}
