use st_domain::config::{Config, ConfigSeverity, HistoryPolicy};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_empty());
}

#[test]
fn full_config_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8000

[auth]
tokens_env = "MY_TOKENS"

[store]
state_path = "/var/lib/steer"

[methods]
navigation_steps = 100
history_policy = "verify"
population_size = 20
seed = 7
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.auth.tokens_env, "MY_TOKENS");
    assert_eq!(config.auth.dev_owner, "dev");
    assert_eq!(config.store.state_path.to_str(), Some("/var/lib/steer"));
    assert_eq!(config.methods.navigation_steps, 100);
    assert_eq!(config.methods.history_policy, HistoryPolicy::Verify);
    assert_eq!(config.methods.generations_per_iteration, 10);
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn one_step_navigation_is_an_error() {
    let mut config = Config::default();
    config.methods.navigation_steps = 1;
    let issues = config.validate();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, ConfigSeverity::Error);
    assert_eq!(issues[0].field, "methods.navigation_steps");
}

#[test]
fn cors_wildcard_is_a_warning() {
    let mut config = Config::default();
    config.server.cors.allowed_origins = vec!["*".into()];
    let issues = config.validate();
    assert!(issues.iter().all(|i| i.severity == ConfigSeverity::Warning));
    assert_eq!(issues.len(), 1);
}
