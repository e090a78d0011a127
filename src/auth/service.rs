//! Account and token lifecycle
//!
//! Every change to a user's token set goes through [`AccountService::update_user`],
//! which re-reads the document, applies the change and saves it with the
//! store's compare-and-set. A concurrent login and logout therefore retry
//! instead of silently dropping each other's tokens.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::auth::jwt::TokenSigner;
use crate::auth::models::{
    check_password, normalize_email, normalize_username, Authenticated, RegisterRequest, User,
    UserUpdate,
};
use crate::auth::password::PasswordHasher;
use crate::config::AuthConfig;
use crate::error::{Error, Rejection, Result};
use crate::store::UserStore;

/// Outcome of pruning one user's tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub user_id: String,
    pub username: String,
    pub removed: usize,
    pub remaining: usize,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    signer: TokenSigner,
    max_update_attempts: u32,
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, config: &AuthConfig) -> Result<Self> {
        Ok(Self {
            store,
            hasher: PasswordHasher::new(config)?,
            signer: TokenSigner::new(config),
            max_update_attempts: config.max_update_attempts.max(1),
        })
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    // ── Registration & credentials ──────────────────────────────────

    /// Create an account and log it in. Returns the stored user and its first token.
    pub async fn register(&self, req: RegisterRequest) -> Result<(User, String)> {
        let username = normalize_username(&req.user_name)?;
        let email = normalize_email(&req.email)?;
        check_password(&req.password)?;

        let password_hash = self.hasher.hash(&req.password).await?;
        let user = self
            .store
            .insert(User::new(username, email, password_hash))
            .await?;
        tracing::info!("Registered user {} ({})", user.username, user.id);

        let token = self.issue(&user.id).await?;
        let user = self.reload(&user.id).await?;
        Ok((user, token))
    }

    /// Resolve an identity (username or email) and check its password.
    ///
    /// Unknown identity, wrong password and lookup failures are all
    /// `InvalidCredentials`.
    pub async fn find_by_credentials(&self, identity: &str, password: &str) -> Result<User> {
        let user = match self.store.find_by_identity(identity).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.hasher.verify_decoy(password).await;
                return Err(Error::InvalidCredentials);
            }
            Err(e) => {
                tracing::warn!("User lookup failed during login: {}", e);
                return Err(Error::InvalidCredentials);
            }
        };

        if !self.hasher.verify(password, &user.password_hash).await {
            return Err(Error::InvalidCredentials);
        }
        Ok(user)
    }

    /// Check credentials and issue a fresh token
    pub async fn login(&self, identity: &str, password: &str) -> Result<(User, String)> {
        let user = self.find_by_credentials(identity, password).await?;
        let token = self.issue(&user.id).await?;
        tracing::info!("User {} logged in", user.id);
        let user = self.reload(&user.id).await?;
        Ok((user, token))
    }

    // ── Token issuance ──────────────────────────────────────────────

    /// Mint a token for `user_id` and append it to the user's token store.
    ///
    /// The token is only returned once it is persisted.
    pub async fn issue(&self, user_id: &str) -> Result<String> {
        let entry = self.signer.issue(user_id, Utc::now())?;
        let token = entry.token.clone();
        self.update_user(user_id, |user| {
            if !user.tokens.insert(entry.clone()) {
                return Err(Error::Other("Issued token collided with an existing one".to_string()));
            }
            Ok(true)
        })
        .await?;
        tracing::debug!("Issued token for user {}", user_id);
        Ok(token)
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Run a presented token through signature, subject, membership and
    /// expiry checks.
    ///
    /// An expired entry is pruned even though the token is rejected. Any
    /// other expired entries of the user are pruned on success as well.
    pub async fn validate(&self, raw: &str) -> std::result::Result<Authenticated, Rejection> {
        self.validate_at(raw, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        raw: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Authenticated, Rejection> {
        // Signature and structure
        let claims = self.signer.verify(raw)?;

        // Subject lookup
        let user = match self.store.find_by_id(&claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(Rejection::UnknownSubject),
            Err(e) => {
                tracing::warn!("User lookup failed during authentication: {}", e);
                return Err(Rejection::Storage);
            }
        };

        // Membership
        let Some(entry) = user.tokens.get(raw) else {
            return Err(Rejection::TokenNotRecognized);
        };

        // Expiry
        if entry.is_expired_at(now) {
            self.prune_quietly(&user.id, now).await;
            return Err(Rejection::TokenExpired);
        }

        let user = if user.tokens.expired_count(now) > 0 {
            let user_id = user.id.clone();
            let mut pruned = self.prune_quietly(&user_id, now).await.unwrap_or(user);
            // Whatever was persisted, hand back a view without expired entries
            pruned.tokens.prune(now);
            pruned
        } else {
            user
        };

        Ok(Authenticated {
            user,
            token: raw.to_string(),
        })
    }

    // ── Pruning ─────────────────────────────────────────────────────

    /// Remove expired tokens of one user. Writes only when something expired.
    pub async fn prune(&self, user_id: &str) -> Result<PruneReport> {
        self.prune_at(user_id, Utc::now()).await
    }

    pub async fn prune_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<PruneReport> {
        let mut removed = 0;
        let user = self
            .update_user(user_id, |user| {
                removed = user.tokens.prune(now);
                Ok(removed > 0)
            })
            .await?;
        if removed > 0 {
            tracing::debug!("Pruned {} expired token(s) for user {}", removed, user_id);
        }
        Ok(PruneReport {
            user_id: user.id.clone(),
            username: user.username.clone(),
            removed,
            remaining: user.tokens.len(),
        })
    }

    /// Prune every user in the store
    pub async fn prune_all(&self) -> Result<Vec<PruneReport>> {
        let now = Utc::now();
        let mut reports = Vec::new();
        for user in self.store.list().await? {
            match self.prune_at(&user.id, now).await {
                Ok(report) => reports.push(report),
                // Deleted while we were walking the list
                Err(Error::UserNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    /// Prune during validation; failures are logged and otherwise ignored
    async fn prune_quietly(&self, user_id: &str, now: DateTime<Utc>) -> Option<User> {
        let mut removed = 0;
        let result = self
            .update_user(user_id, |user| {
                removed = user.tokens.prune(now);
                Ok(removed > 0)
            })
            .await;
        match result {
            Ok(user) => {
                if removed > 0 {
                    tracing::debug!("Pruned {} expired token(s) for user {}", removed, user_id);
                }
                Some(user)
            }
            Err(e) => {
                tracing::warn!("Failed to persist pruned tokens for user {}: {}", user_id, e);
                None
            }
        }
    }

    // ── Revocation ──────────────────────────────────────────────────

    /// Revoke a single token
    pub async fn logout(&self, user_id: &str, token: &str) -> Result<()> {
        self.update_user(user_id, |user| Ok(user.tokens.remove(token)))
            .await?;
        tracing::info!("User {} logged out", user_id);
        Ok(())
    }

    /// Revoke every token of the user
    pub async fn logout_all(&self, user_id: &str) -> Result<usize> {
        let mut removed = 0;
        self.update_user(user_id, |user| {
            removed = user.tokens.clear();
            Ok(removed > 0)
        })
        .await?;
        tracing::info!("User {} logged out of {} session(s)", user_id, removed);
        Ok(removed)
    }

    /// Swap the presented token for a new one in a single update
    pub async fn refresh(&self, user_id: &str, token: &str) -> Result<String> {
        let entry = self.signer.issue(user_id, Utc::now())?;
        let new_token = entry.token.clone();
        self.update_user(user_id, |user| {
            if !user.tokens.remove(token) {
                // Revoked by a concurrent logout
                return Err(Error::Unauthorized(Rejection::TokenNotRecognized));
            }
            user.tokens.insert(entry.clone());
            Ok(true)
        })
        .await?;
        tracing::debug!("Refreshed token for user {}", user_id);
        Ok(new_token)
    }

    // ── Profile ─────────────────────────────────────────────────────

    /// Apply an allow-listed profile update.
    ///
    /// The password hash is recomputed only when a new password is supplied.
    pub async fn update_profile(&self, user_id: &str, update: UserUpdate) -> Result<User> {
        if update.is_empty() {
            return self.reload(user_id).await;
        }
        let username = update.user_name.as_deref().map(normalize_username).transpose()?;
        let email = update.email.as_deref().map(normalize_email).transpose()?;
        let password_hash = match update.password.as_deref() {
            Some(plaintext) => {
                check_password(plaintext)?;
                Some(self.hasher.hash(plaintext).await?)
            }
            None => None,
        };

        let user = self
            .update_user(user_id, |user| {
                let mut changed = false;
                if let Some(username) = &username {
                    changed |= user.username != *username;
                    user.username = username.clone();
                }
                if let Some(email) = &email {
                    changed |= user.email != *email;
                    user.email = email.clone();
                }
                if let Some(hash) = &password_hash {
                    user.password_hash = hash.clone();
                    changed = true;
                }
                Ok(changed)
            })
            .await?;
        tracing::info!("Updated profile of user {}", user_id);
        Ok(user)
    }

    /// Change the email of `target_id`, which must be the acting user
    pub async fn update_email(&self, actor_id: &str, target_id: &str, email: &str) -> Result<User> {
        self.require_owner(actor_id, target_id, "update").await?;
        let update = UserUpdate {
            email: Some(email.to_string()),
            ..UserUpdate::default()
        };
        self.update_profile(target_id, update).await
    }

    // ── Deletion ────────────────────────────────────────────────────

    /// Delete an account together with all of its tokens
    pub async fn delete(&self, user_id: &str) -> Result<User> {
        let user = self.reload(user_id).await?;
        if !self.store.delete(user_id).await? {
            return Err(Error::UserNotFound(user_id.to_string()));
        }
        tracing::info!("Deleted user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Delete `target_id`, which must be the acting user
    pub async fn delete_account(&self, actor_id: &str, target_id: &str) -> Result<User> {
        self.require_owner(actor_id, target_id, "delete").await?;
        self.delete(target_id).await
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn reload(&self, user_id: &str) -> Result<User> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))
    }

    async fn require_owner(&self, actor_id: &str, target_id: &str, action: &str) -> Result<()> {
        let target = self.reload(target_id).await?;
        if target.id != actor_id {
            return Err(Error::Forbidden(format!("cannot {} this user", action)));
        }
        Ok(())
    }

    /// Read-modify-write a user document with compare-and-set retries.
    ///
    /// `mutate` runs against a fresh copy on every attempt and returns whether
    /// it changed anything; unchanged documents are not written.
    pub async fn update_user<F>(&self, user_id: &str, mut mutate: F) -> Result<User>
    where
        F: FnMut(&mut User) -> Result<bool>,
    {
        for attempt in 1..=self.max_update_attempts {
            let mut user = self.reload(user_id).await?;
            if !mutate(&mut user)? {
                return Ok(user);
            }
            match self.store.save(&user).await {
                Ok(saved) => return Ok(saved),
                Err(Error::VersionConflict(_)) => {
                    tracing::debug!(
                        "Concurrent update of user {} (attempt {}/{}), retrying",
                        user_id,
                        attempt,
                        self.max_update_attempts
                    );
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::VersionConflict(user_id.to_string()))
    }
}
