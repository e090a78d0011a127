//! In-memory user store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{check_unique, UserStore};
use crate::auth::User;
use crate::error::{Error, Result};

/// Map of user documents behind a shared lock; clones share the same map
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.matches_identity(identity))
            .cloned())
    }

    async fn insert(&self, mut user: User) -> Result<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(Error::Storage(format!("User '{}' already stored", user.id)));
        }
        check_unique(users.values(), &user)?;
        user.version = 1;
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<User> {
        let mut users = self.users.write().await;
        let current = users
            .get(&user.id)
            .ok_or_else(|| Error::UserNotFound(user.id.clone()))?;
        if current.version != user.version {
            return Err(Error::VersionConflict(user.id.clone()));
        }
        check_unique(users.values(), user)?;

        let mut stored = user.clone();
        stored.version += 1;
        users.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.users.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }
}
