//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Shortest signing secret we accept, in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Work factor range bcrypt accepts
pub const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration for the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Token signing, lifetime and password hashing settings
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for bearer tokens. Rotating it invalidates every issued token.
    #[serde(default)]
    pub jwt_secret: String,

    /// How long an issued token stays valid
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// bcrypt work factor
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    /// Compare-and-set retries for token store updates
    #[serde(default = "default_max_update_attempts")]
    pub max_update_attempts: u32,
}

fn default_token_ttl_secs() -> u64 {
    24 * 3600
}

fn default_bcrypt_cost() -> u32 {
    8
}

fn default_max_update_attempts() -> u32 {
    5
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
            bcrypt_cost: default_bcrypt_cost(),
            max_update_attempts: default_max_update_attempts(),
        }
    }
}

// Keep the secret out of logs and panics.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("max_update_attempts", &self.max_update_attempts)
            .finish()
    }
}

impl AuthConfig {
    /// Build an auth config around an explicit secret, defaults elsewhere
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            ..Self::default()
        }
    }

    /// Token lifetime as a chrono duration
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs as i64)
    }

    /// Reject settings that would leave tokens unsigned, immortal or unhashable
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            return Err(Error::Config(
                "auth.jwt_secret is empty; set JWT_SECRET".to_string(),
            ));
        }
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(Error::Config(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.token_ttl_secs == 0 {
            return Err(Error::Config(
                "auth.token_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if !BCRYPT_COST_RANGE.contains(&self.bcrypt_cost) {
            return Err(Error::Config(format!(
                "auth.bcrypt_cost must be between {} and {}",
                BCRYPT_COST_RANGE.start(),
                BCRYPT_COST_RANGE.end()
            )));
        }
        if self.max_update_attempts == 0 {
            return Err(Error::Config(
                "auth.max_update_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where user documents live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Lost on restart; handy for tests and demos
    Memory,
    /// One JSON document per user under `data_dir`
    #[default]
    File,
}

impl Config {
    /// Validate every section that has constraints
    pub fn validate(&self) -> Result<()> {
        self.auth.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.token_ttl_secs, 86400);
        assert_eq!(config.auth.bcrypt_cost, 8);
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    fn test_empty_secret_rejected() {
        let auth = AuthConfig::default();
        assert!(matches!(auth.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_short_secret_rejected() {
        let auth = AuthConfig::with_secret("short");
        assert!(auth.validate().is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut auth = AuthConfig::with_secret(SECRET);
        auth.token_ttl_secs = 0;
        assert!(auth.validate().is_err());
    }

    #[test]
    fn test_bcrypt_cost_bounds() {
        let mut auth = AuthConfig::with_secret(SECRET);
        auth.bcrypt_cost = 3;
        assert!(auth.validate().is_err());
        auth.bcrypt_cost = 4;
        assert!(auth.validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let auth = AuthConfig::with_secret(SECRET);
        let printed = format!("{:?}", auth);
        assert!(!printed.contains(SECRET));
        assert!(printed.contains("<redacted>"));
    }
}
