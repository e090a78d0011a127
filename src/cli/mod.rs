//! CLI interface for taskd

pub mod commands;
mod output;

pub use output::*;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "taskd")]
#[command(version)]
#[command(about = "Task manager backend with bearer-token sessions", long_about = None)]
pub struct Cli {
    /// Path to taskd.toml (searched upward from the current directory by default)
    #[arg(short, long, global = true, env = "TASKD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default taskd.toml configuration file
    Init,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Remove expired tokens from every user
    Prune,

    /// List users and their active sessions
    Users {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["taskd", "serve", "--host", "127.0.0.1", "-p", "8080"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("127.0.0.1"));
                assert_eq!(port, Some(8080));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_global_config() {
        let cli = Cli::parse_from(["taskd", "prune", "--config", "/etc/taskd.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/taskd.toml")));
        assert!(matches!(cli.command, Commands::Prune));
    }
}
