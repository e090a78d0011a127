//! Password hashing and verification (bcrypt)
//!
//! Both operations are CPU bound and run on the blocking pool so a login
//! burst does not stall other requests.

use std::sync::Arc;

use crate::config::AuthConfig;
use crate::error::Result;

/// Plaintext used to build the decoy hash for unknown identities
const DECOY_PLAINTEXT: &str = "taskd-decoy-password";

/// Salted one-way hashing of user secrets with a fixed work factor
///
/// bcrypt only reads the first 72 bytes of its input, so longer plaintexts
/// are refused instead of being silently truncated.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    decoy: Arc<str>,
}

impl PasswordHasher {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        Self::with_cost(config.bcrypt_cost)
    }

    /// Fails if bcrypt rejects `cost`.
    ///
    /// The decoy hash is built here so every unknown-identity login costs
    /// exactly one verification.
    pub fn with_cost(cost: u32) -> Result<Self> {
        let decoy = bcrypt::hash(DECOY_PLAINTEXT, cost)?;
        Ok(Self {
            cost,
            decoy: Arc::from(decoy),
        })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext secret with a fresh salt.
    ///
    /// An error here must abort whatever save was about to happen.
    pub async fn hash(&self, plaintext: &str) -> Result<String> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;
        let hashed =
            tokio::task::spawn_blocking(move || bcrypt::non_truncating_hash(plaintext, cost))
                .await??;
        Ok(hashed)
    }

    /// Check a plaintext against a stored hash. Mismatches, malformed hashes,
    /// over-long plaintexts and internal failures all come back as `false`.
    pub async fn verify(&self, plaintext: &str, stored_hash: &str) -> bool {
        let plaintext = plaintext.to_string();
        let stored_hash = stored_hash.to_string();
        let checked = tokio::task::spawn_blocking(move || {
            bcrypt::non_truncating_verify(plaintext, &stored_hash)
        })
        .await;
        match checked {
            Ok(Ok(matched)) => matched,
            Ok(Err(bcrypt::BcryptError::Truncation(len))) => {
                tracing::debug!("Refused {}-byte password during verification", len);
                false
            }
            Ok(Err(e)) => {
                tracing::warn!("Stored password hash could not be checked: {}", e);
                false
            }
            Err(e) => {
                tracing::error!("Password verification task failed: {}", e);
                false
            }
        }
    }

    /// Spend the same effort as a real verification, for identities that do
    /// not exist. Always returns `false`.
    pub async fn verify_decoy(&self, plaintext: &str) -> bool {
        let plaintext = plaintext.to_string();
        let decoy = Arc::clone(&self.decoy);
        let _ = tokio::task::spawn_blocking(move || bcrypt::non_truncating_verify(plaintext, &decoy))
            .await;
        false
    }
}
