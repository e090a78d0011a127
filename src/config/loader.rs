//! Configuration loading and environment variable interpolation

use crate::error::{Error, Result};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::Config;

pub const CONFIG_FILENAME: &str = "taskd.toml";

/// Load configuration from taskd.toml, or from `path` when given
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => find_config_file()?,
    };
    load_config_from_path(&config_path)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|_| {
        Error::Config(format!(
            "Config file {} not found. Run 'taskd init' first.",
            path.display()
        ))
    })?;
    let config = parse_config(&content)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Interpolate, parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config> {
    let content = interpolate_env_vars(content);
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Find the configuration file, searching upward from current directory
fn find_config_file() -> Result<PathBuf> {
    let mut current = env::current_dir()?;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(Error::Config(format!(
                "{} not found. Run 'taskd init' first.",
                CONFIG_FILENAME
            )));
        }
    }
}

/// Interpolate environment variables in the format ${VAR_NAME} or ${VAR_NAME:-default}
fn interpolate_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("Invalid regex pattern - this is a bug in the codebase");

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Generate a default configuration file content
pub fn default_config_content() -> &'static str {
    r#"# taskd configuration

[server]
host = "0.0.0.0"
port = 3000

[auth]
# Signing key for bearer tokens. Use at least 32 random bytes.
# Changing it logs every user out.
jwt_secret = "${JWT_SECRET}"
# Token lifetime in seconds (24h)
token_ttl_secs = 86400
# bcrypt work factor
bcrypt_cost = 8
# Retries when two requests update the same user's tokens at once
max_update_attempts = 5

[storage]
backend = "file"  # or "memory"
data_dir = "${TASKD_DATA_DIR:-./data}"
"#
}
