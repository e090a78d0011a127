//! Error types for taskd

use thiserror::Error;

/// Why the token validator turned a request away.
///
/// These never leave the process: the HTTP layer collapses every variant
/// into the same 401 body.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No token was presented at all
    #[error("missing token")]
    MissingToken,
    /// Bad signature, malformed, or missing required claims
    #[error("invalid token")]
    InvalidToken,
    /// The `sub` claim names a user that no longer exists
    #[error("unknown subject")]
    UnknownSubject,
    /// Signature is fine but the token is not in the user's token store
    #[error("token not recognized")]
    TokenNotRecognized,
    /// Stored expiry has passed
    #[error("token expired")]
    TokenExpired,
    /// The store failed while we were looking things up (fail closed)
    #[error("storage failure")]
    Storage,
}

/// Which identity field collided on registration or profile update.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    #[error("User name")]
    Username,
    #[error("Email")]
    Email,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication failed: {0}")]
    Unauthorized(Rejection),

    #[error("{0} already in use")]
    DuplicateIdentity(IdentityField),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("Not authorized: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Document '{0}' was modified concurrently")]
    VersionConflict(String),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures of the document store rather than of the caller
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::VersionConflict(_) | Error::Io(_) | Error::Json(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Other(format!("Background task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
