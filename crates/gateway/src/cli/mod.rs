pub mod config;
pub mod methods;

use clap::{Parser, Subcommand};

use st_domain::config::Config;

/// steerd: interactive multi-objective method sessions over HTTP.
#[derive(Debug, Parser)]
#[command(name = "steerd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// List the registered methods and the problem kinds they accept.
    Methods {
        /// Print as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `STEER_CONFIG` (or
/// `config.toml` by default). A missing file yields the defaults.
/// Returns the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("STEER_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["steerd"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_config_validate() {
        let cli = Cli::try_parse_from(["steerd", "config", "validate"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand::Validate))
        ));
    }

    #[test]
    fn parses_methods_json_flag() {
        let cli = Cli::try_parse_from(["steerd", "methods", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Methods { json: true })));
    }
}
