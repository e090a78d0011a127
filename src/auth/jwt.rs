//! JWT token handling

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::session::StoredToken;
use crate::config::AuthConfig;
use crate::error::{Error, Rejection, Result};

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at
    pub iat: i64,
    /// Expiration time, mirrors the stored expiry
    pub exp: i64,
    /// Token ID, keeps two tokens minted in the same second distinct
    pub jti: String,
}

impl Claims {
    /// Build claims for `user_id`, valid from `issued_at` until `expires_at`
    pub fn new(user_id: &str, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Signs and verifies bearer tokens with the server secret (HS256)
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl TokenSigner {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();

        // Authenticity is checked here; expiry is decided by the stored
        // timestamp so expired tokens still reach the pruner.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: config.token_ttl(),
        }
    }

    /// Mint a token for `user_id` expiring one lifetime after `now`
    pub fn issue(&self, user_id: &str, now: DateTime<Utc>) -> Result<StoredToken> {
        // Whole seconds so the stored expiry equals the embedded claim
        let expires_at = DateTime::<Utc>::from_timestamp((now + self.ttl).timestamp(), 0)
            .ok_or_else(|| Error::Other("Token expiry out of range".to_string()))?;
        let token = self.sign(&Claims::new(user_id, now, expires_at))?;
        Ok(StoredToken::new(token, expires_at))
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Check signature and structure, returning the embedded claims
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, Rejection> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token failed verification: {}", e);
                Rejection::InvalidToken
            })
    }
}
