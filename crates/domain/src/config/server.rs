use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Per-IP token-bucket rate limiting configuration.
    /// When `None` (the default), rate limiting is disabled, which suits local
    /// development.  Set `requests_per_second` and `burst_size` in production.
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "127.0.0.1".into(),
            cors: CorsConfig::default(),
            rate_limit: None,
        }
    }
}

/// Per-IP token-bucket rate limiting configuration.
///
/// `requests_per_second` controls the replenishment rate, while `burst_size`
/// sets the maximum number of requests a single IP can send in a quick burst
/// before being throttled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// One token is added every `1 / requests_per_second` seconds.
    pub requests_per_second: u64,
    /// Maximum tokens in the bucket.  A client can send this many requests
    /// in a burst before the limiter kicks in.
    pub burst_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (NOT recommended).
    /// Defaults to localhost-only.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_port() -> u16 {
    5000
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:*".into(),
        "http://127.0.0.1:*".into(),
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_default_has_no_rate_limit() {
        let cfg = ServerConfig::default();
        assert!(cfg.rate_limit.is_none());
    }

    #[test]
    fn server_config_parses_without_rate_limit() {
        let toml_str = r#"
            port = 8080
            host = "0.0.0.0"
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "0.0.0.0");
        assert!(cfg.rate_limit.is_none());
    }

    #[test]
    fn server_config_parses_with_rate_limit() {
        let toml_str = r#"
            port = 5000
            host = "127.0.0.1"

            [rate_limit]
            requests_per_second = 50
            burst_size = 100
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        let rl = cfg.rate_limit.expect("rate_limit should be Some");
        assert_eq!(rl.requests_per_second, 50);
        assert_eq!(rl.burst_size, 100);
    }

    #[test]
    fn server_config_empty_toml_uses_all_defaults() {
        let cfg: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.host, "127.0.0.1");
        assert!(cfg.rate_limit.is_none());
        assert_eq!(cfg.cors.allowed_origins.len(), 2);
    }
}
