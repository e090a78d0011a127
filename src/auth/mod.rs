//! Authentication and session management

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod session;

pub use jwt::{Claims, TokenSigner};
pub use middleware::{authenticate, extract_bearer_token, require_auth};
pub use models::{Authenticated, PublicUser, User};
pub use password::PasswordHasher;
pub use service::{AccountService, PruneReport};
pub use session::{StoredToken, TokenStore};
