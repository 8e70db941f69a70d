mod methods;
mod observability;
mod server;
mod store;

pub use methods::*;
pub use observability::*;
pub use server::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub methods: MethodsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding comma-separated `owner:token` pairs.
    /// If the env var is unset or empty the server runs in dev mode and
    /// takes the owner from the `X-Owner` header.
    #[serde(default = "d_tokens_env")]
    pub tokens_env: String,
    /// Owner used in dev mode when the request carries no `X-Owner` header.
    #[serde(default = "d_dev_owner")]
    pub dev_owner: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tokens_env: d_tokens_env(),
            dev_owner: d_dev_owner(),
        }
    }
}

fn d_tokens_env() -> String {
    "STEER_API_TOKENS".into()
}
fn d_dev_owner() -> String {
    "dev".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut error = |field: &str, message: &str| {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: field.into(),
                message: message.into(),
            })
        };

        if self.server.port == 0 {
            error("server.port", "port must be greater than 0");
        }
        if self.server.host.is_empty() {
            error("server.host", "host must not be empty");
        }
        if self.methods.navigation_steps < 2 {
            error(
                "methods.navigation_steps",
                "a navigation needs at least two steps",
            );
        }
        if self.methods.population_size < 4 {
            error(
                "methods.population_size",
                "population_size must be at least 4",
            );
        }
        if self.methods.candidate_samples == 0 {
            error(
                "methods.candidate_samples",
                "candidate_samples must be greater than 0",
            );
        }
        if self.methods.iterate_timeout_secs == 0 {
            error(
                "methods.iterate_timeout_secs",
                "iterate_timeout_secs must be greater than 0",
            );
        }

        if self.methods.history_policy == HistoryPolicy::Verify && self.methods.history_capacity == 0
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "methods.history_capacity".into(),
                message: "history_policy = \"verify\" with capacity 0 accepts every step-back".into(),
            });
        }

        // CORS: warn if wildcard is used.
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)".into(),
            });
        }

        errors
    }
}
