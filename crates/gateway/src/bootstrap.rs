//! AppState construction and background-task spawning extracted from `main.rs`.

use std::sync::Arc;

use anyhow::Context;

use st_domain::config::{Config, ConfigSeverity};
use st_methods::MethodRegistry;
use st_sessions::{JsonProblemStore, ProblemStore, SessionStore};

use crate::api::auth::TokenTable;
use crate::runtime::{SessionController, SessionLockMap};
use crate::state::AppState;

/// Validate config, open the stores from disk and read tokens from the
/// environment. This is the boot path used by `serve`.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    check_config(&config)?;

    let problems: Arc<dyn ProblemStore> = Arc::new(
        JsonProblemStore::new(&config.store.state_path).context("loading problem store")?,
    );
    let tokens = TokenTable::from_env(&config.auth).context("reading API tokens")?;

    assemble(config, problems, tokens)
}

/// Wire every component around the given problem store and token table.
/// Tests call this directly with an in-memory problem store.
pub fn assemble(
    config: Arc<Config>,
    problems: Arc<dyn ProblemStore>,
    tokens: TokenTable,
) -> anyhow::Result<AppState> {
    // ── Session store ────────────────────────────────────────────────
    let sessions = Arc::new(
        SessionStore::new(&config.store.state_path).context("initializing session store")?,
    );

    // ── Method registry ──────────────────────────────────────────────
    let registry = Arc::new(MethodRegistry::builtin());
    tracing::info!(methods = registry.names().len(), "method registry ready");

    // ── Session locks (per-owner concurrency) ────────────────────────
    let session_locks = Arc::new(SessionLockMap::new());

    // ── Controller ───────────────────────────────────────────────────
    let controller = Arc::new(SessionController::new(
        registry.clone(),
        sessions.clone(),
        problems.clone(),
        session_locks.clone(),
        config.methods.clone(),
    ));
    tracing::info!(
        navigation_steps = config.methods.navigation_steps,
        history_policy = ?config.methods.history_policy,
        timeout_secs = config.methods.iterate_timeout_secs,
        "session controller ready"
    );

    Ok(AppState {
        config,
        registry,
        controller,
        sessions,
        problems,
        session_locks,
        started_at: chrono::Utc::now(),
        tokens: Arc::new(tokens),
    })
}

fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// Spawn the long-running background tokio tasks (session flush, lock
/// pruning).
///
/// Call this **after** [`build_app_state`] when running the HTTP server.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Periodic session flush ───────────────────────────────────────
    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                let sessions = sessions.clone();
                match tokio::task::spawn_blocking(move || sessions.flush()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "session store flush failed"),
                    Err(e) => tracing::warn!(error = %e, "session store flush task failed"),
                }
            }
        });
    }

    // ── Periodic lock pruning ────────────────────────────────────────
    {
        let session_locks: Arc<SessionLockMap> = state.session_locks.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                let pruned = session_locks.prune_idle();
                if pruned > 0 {
                    tracing::debug!(pruned, "idle owner locks pruned");
                }
            }
        });
    }
    tracing::info!("background tasks spawned");
}
