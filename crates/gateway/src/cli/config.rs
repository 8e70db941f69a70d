use st_domain::config::{Config, ConfigSeverity};

/// Validate the config and print every issue. Returns `false` when any
/// issue is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    for issue in &issues {
        println!("{issue}");
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    println!(
        "\n{errors} error(s), {} warning(s) in {config_path}",
        issues.len() - errors
    );
    errors == 0
}

/// Render the resolved config (with every default filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<String> {
    toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default(), "defaults"));
    }

    #[test]
    fn shown_config_parses_back() {
        let shown = show(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&shown).unwrap();
        assert_eq!(parsed.methods.navigation_steps, 40);
        assert_eq!(parsed.server.port, 5000);
    }

    #[test]
    fn zero_steps_fail_validation() {
        let mut config = Config::default();
        config.methods.navigation_steps = 1;
        assert!(!validate(&config, "test"));
    }
}
