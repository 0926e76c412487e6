//! Command-line interface for morpion_server.

use clap::Parser;
use morpion_server::{ConfigError, ServerConfig};
use std::path::PathBuf;

/// Morpion - line-protocol tic-tac-toe server
#[derive(Parser, Debug)]
#[command(name = "morpion_server")]
#[command(about = "Tic-tac-toe server with matchmaking and a built-in opponent", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Port to listen on (overrides the config file)
    pub port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Builds the effective configuration: file (or defaults), then CLI overrides.
    pub fn load_config(&self) -> Result<ServerConfig, ConfigError> {
        let config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        Ok(match self.port {
            Some(port) => config.with_port(port),
            None => config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_port_overrides_default() {
        let cli = Cli::try_parse_from(["morpion_server", "4242"]).expect("valid arguments");
        let config = cli.load_config().expect("defaults load");
        assert_eq!(*config.port(), 4242);
    }

    #[test]
    fn test_no_arguments_uses_default_port() {
        let cli = Cli::try_parse_from(["morpion_server"]).expect("valid arguments");
        let config = cli.load_config().expect("defaults load");
        assert_eq!(*config.port(), morpion_server::DEFAULT_PORT);
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        assert!(Cli::try_parse_from(["morpion_server", "http"]).is_err());
    }
}
