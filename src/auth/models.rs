//! Authentication models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::session::TokenStore;
use crate::error::{Error, Result};

/// Longest username we accept
pub const MAX_USERNAME_LEN: usize = 64;

/// Shortest password we accept
pub const MIN_PASSWORD_LEN: usize = 8;

/// Longest password we accept, in bytes; bcrypt ignores anything past this
pub const MAX_PASSWORD_BYTES: usize = 72;

/// User document as persisted by the store
///
/// The plaintext password never lives here; `password_hash` is only ever
/// written by the account service when a new plaintext is supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier (uuid v4)
    pub id: String,
    /// Login handle, unique case-insensitively
    pub username: String,
    /// Contact address, unique case-insensitively
    pub email: String,
    /// bcrypt hash of the password
    pub password_hash: String,
    /// Active bearer tokens, in issuance order
    #[serde(default)]
    pub tokens: TokenStore,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// Document revision, bumped by the store on every successful save
    #[serde(default)]
    pub version: u64,
}

impl User {
    /// Create a new, not yet persisted user
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            tokens: TokenStore::default(),
            created_at: Utc::now(),
            version: 0,
        }
    }

    /// Whether `identity` names this user by username or email, ignoring case
    pub fn matches_identity(&self, identity: &str) -> bool {
        let identity = identity.trim();
        self.username.eq_ignore_ascii_case(identity) || self.email.eq_ignore_ascii_case(identity)
    }

    /// Safe-to-return view without the password hash or tokens
    pub fn to_public_view(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

/// User information in responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            user_name: user.username.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

/// A user that passed the token validator, plus the token it presented
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub user: User,
    pub token: String,
}

/// Registration payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

/// Login credentials; either the username or the email identifies the account
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

impl LoginRequest {
    /// The identity to look up, preferring the username when both are sent
    pub fn identity(&self) -> Option<&str> {
        self.user_name
            .as_deref()
            .or(self.email.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Login / registration response with token
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

/// Token refresh response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Fields a user may change on their own profile
///
/// Unknown keys are rejected rather than copied onto the document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserUpdate {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.user_name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

/// Email-only update used by the id-addressed account route
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailUpdate {
    pub email: String,
}

/// Trim and check a username
pub fn normalize_username(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("User name cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_USERNAME_LEN {
        return Err(Error::Validation(format!(
            "User name too long (max {} characters)",
            MAX_USERNAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim, lowercase and sanity-check an email address
pub fn normalize_email(raw: &str) -> Result<String> {
    let trimmed = raw.trim().to_lowercase();
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid || trimmed.chars().any(char::is_whitespace) {
        return Err(Error::Validation("Invalid email address".to_string()));
    }
    Ok(trimmed)
}

/// Check password length; the plaintext itself is never altered
pub fn check_password(raw: &str) -> Result<()> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if raw.len() > MAX_PASSWORD_BYTES {
        return Err(Error::Validation(format!(
            "Password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}
