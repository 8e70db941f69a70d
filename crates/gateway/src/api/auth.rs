//! Identity middleware.
//!
//! Resolves the calling owner once per request and stores it as an
//! [`Owner`] request extension.
//! - Tokens come from the env var named by `auth.tokens_env` (default
//!   `STEER_API_TOKENS`) as comma-separated `owner:token` pairs. They are
//!   read **once at startup** and only their SHA-256 digests are kept.
//! - A request must carry `Authorization: Bearer <token>`. The digest is
//!   compared against every configured digest in constant time.
//! - With no tokens configured the server runs in dev mode: the owner is
//!   taken from the `X-Owner` header, falling back to `auth.dev_owner`.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use st_domain::config::AuthConfig;
use st_domain::error::{Error, Result};

use crate::api::error::ApiError;
use crate::state::AppState;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

/// Token digests keyed by owner.
pub struct TokenTable {
    entries: Vec<(String, [u8; 32])>,
    dev_owner: String,
}

impl TokenTable {
    /// Read the configured env var. Unset or empty means dev mode.
    pub fn from_env(auth: &AuthConfig) -> Result<Self> {
        let raw = std::env::var(&auth.tokens_env).unwrap_or_default();
        let table = Self::parse(&raw, &auth.dev_owner)?;
        if table.is_dev_mode() {
            tracing::warn!(
                env = %auth.tokens_env,
                "no API tokens configured, running in dev mode (owner from X-Owner header)"
            );
        } else {
            tracing::info!(owners = table.entries.len(), "API tokens loaded");
        }
        Ok(table)
    }

    /// Parse `owner:token[,owner:token...]`.
    pub fn parse(raw: &str, dev_owner: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (owner, token) = pair
                .split_once(':')
                .ok_or_else(|| Error::Config("token entries must be owner:token pairs".into()))?;
            let (owner, token) = (owner.trim(), token.trim());
            if owner.is_empty() || token.is_empty() {
                return Err(Error::Config("token entries need both an owner and a token".into()));
            }
            entries.push((owner.to_owned(), digest(token)));
        }
        Ok(Self {
            entries,
            dev_owner: dev_owner.to_owned(),
        })
    }

    pub fn is_dev_mode(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owner holding `token`, if any. Every entry is checked so the time
    /// taken does not depend on which one matches.
    pub fn resolve(&self, token: &str) -> Option<&str> {
        let provided = digest(token);
        let mut found = None;
        for (owner, expected) in &self.entries {
            if bool::from(provided.as_slice().ct_eq(expected.as_slice())) {
                found = Some(owner.as_str());
            }
        }
        found
    }
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Axum middleware attaching the [`Owner`] extension. Attach via
/// `axum::middleware::from_fn_with_state`.
pub async fn identify(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let headers = req.headers();
    let owner = if state.tokens.is_dev_mode() {
        headers
            .get("x-owner")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&state.tokens.dev_owner)
            .to_owned()
    } else {
        let provided = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");
        match state.tokens.resolve(provided) {
            Some(owner) => owner.to_owned(),
            None => {
                return ApiError::from(Error::Auth("invalid or missing API token".into()))
                    .into_response()
            }
        }
    };

    req.extensions_mut().insert(Owner(owner));
    next.run(req).await
}
