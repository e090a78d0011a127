//! File-backed user store: one JSON document per user

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use super::{check_unique, UserStore};
use crate::auth::User;
use crate::error::{Error, Result};

const USERS_DIR: &str = "users";

/// Stores `<data_dir>/users/<id>.json`.
///
/// Writes are serialised by a process-wide lock so the version check and the
/// write happen as one step; readers see either the old or the new file
/// because writes land through a rename.
pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or create) a store rooted at `data_dir`
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join(USERS_DIR);
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the user documents
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Option<PathBuf> {
        // Ids come from tokens and URLs; only uuids ever map to a file
        uuid::Uuid::parse_str(id)
            .ok()
            .map(|uuid| self.dir.join(format!("{}.json", uuid.hyphenated())))
    }

    async fn read_path(&self, path: &Path) -> Result<Option<User>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_all(&self) -> Result<Vec<User>> {
        let mut users = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            // A document deleted between listing and reading is simply gone
            if let Some(user) = self.read_path(&path).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn write(&self, user: &User) -> Result<()> {
        let path = self
            .path_for(&user.id)
            .ok_or_else(|| Error::Storage(format!("Invalid user id '{}'", user.id)))?;
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(user)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for FileStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        match self.path_for(id) {
            Some(path) => self.read_path(&path).await,
            None => Ok(None),
        }
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<User>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|user| user.matches_identity(identity)))
    }

    async fn insert(&self, mut user: User) -> Result<User> {
        let _guard = self.write_lock.lock().await;
        let existing = self.read_all().await?;
        if existing.iter().any(|other| other.id == user.id) {
            return Err(Error::Storage(format!("User '{}' already stored", user.id)));
        }
        check_unique(&existing, &user)?;

        user.version = 1;
        self.write(&user).await?;
        tracing::debug!("Stored new user document {}", user.id);
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<User> {
        let _guard = self.write_lock.lock().await;
        let current = self
            .find_by_id(&user.id)
            .await?
            .ok_or_else(|| Error::UserNotFound(user.id.clone()))?;
        if current.version != user.version {
            return Err(Error::VersionConflict(user.id.clone()));
        }
        check_unique(&self.read_all().await?, user)?;

        let mut stored = user.clone();
        stored.version += 1;
        self.write(&stored).await?;
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(path) = self.path_for(id) else {
            return Ok(false);
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<User>> {
        let mut users = self.read_all().await?;
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }
}
