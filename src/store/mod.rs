//! User document storage
//!
//! The account service only needs a handful of document operations. `save`
//! is a compare-and-set on [`User::version`]: a save built from a stale read
//! fails with [`Error::VersionConflict`] instead of overwriting a concurrent
//! change.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::User;
use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Error, IdentityField, Result};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by id
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Look up a user by username or email, case-insensitively
    async fn find_by_identity(&self, identity: &str) -> Result<Option<User>>;

    /// Persist a new user. Fails with `DuplicateIdentity` if the username or
    /// email is taken. Returns the stored document.
    async fn insert(&self, user: User) -> Result<User>;

    /// Replace an existing document if its version still matches. Returns
    /// the stored document with the bumped version.
    async fn save(&self, user: &User) -> Result<User>;

    /// Remove a user and everything it owns. Returns false if it was absent.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// All users, oldest first
    async fn list(&self) -> Result<Vec<User>>;
}

/// Open the backend selected in the configuration
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn UserStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory user store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::File => {
            tracing::info!("Using file user store at {}", config.data_dir.display());
            Ok(Arc::new(FileStore::open(&config.data_dir).await?))
        }
    }
}

/// Fail if `candidate` could be confused with any other user at login.
///
/// Login resolves a single identity against both usernames and emails, so
/// each of the candidate's identities must be free in both namespaces.
pub(crate) fn check_unique<'a>(
    others: impl IntoIterator<Item = &'a User>,
    candidate: &User,
) -> Result<()> {
    for other in others {
        if other.id == candidate.id {
            continue;
        }
        if other.matches_identity(&candidate.username) {
            return Err(Error::DuplicateIdentity(IdentityField::Username));
        }
        if other.matches_identity(&candidate.email) {
            return Err(Error::DuplicateIdentity(IdentityField::Email));
        }
    }
    Ok(())
}
