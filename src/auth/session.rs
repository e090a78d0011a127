//! Per-user token store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One issued bearer token and its authoritative expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    /// The raw signed token, exactly as handed to the client
    pub token: String,
    /// When the token stops authenticating; pruning keys off this
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(token: String, expires_at: DateTime<Utc>) -> Self {
        Self { token, expires_at }
    }

    /// Expired tokens are the ones whose expiry is at or before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Active tokens of a single user
///
/// Behaves as a set keyed by the raw token value. Order is issuance order
/// but carries no meaning for validity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenStore(Vec<StoredToken>);

impl TokenStore {
    /// Append a token. Returns false, leaving the store untouched, if the
    /// same raw value is already present.
    pub fn insert(&mut self, entry: StoredToken) -> bool {
        if self.get(&entry.token).is_some() {
            return false;
        }
        self.0.push(entry);
        true
    }

    /// Find the entry for a raw token, comparing in constant time
    pub fn get(&self, raw: &str) -> Option<&StoredToken> {
        // Scan every entry so timing does not reveal where a match sits
        let mut found = None;
        for entry in &self.0 {
            if constant_time_eq(entry.token.as_bytes(), raw.as_bytes()) && found.is_none() {
                found = Some(entry);
            }
        }
        found
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.get(raw).is_some()
    }

    /// Remove one token. Returns whether anything was removed.
    pub fn remove(&mut self, raw: &str) -> bool {
        let before = self.0.len();
        self.0
            .retain(|entry| !constant_time_eq(entry.token.as_bytes(), raw.as_bytes()));
        self.0.len() != before
    }

    /// Drop every token. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.0.len();
        self.0.clear();
        removed
    }

    /// Remove every entry expired at `now`. Returns how many were removed;
    /// a second call with the same `now` always returns 0.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.0.len();
        self.0.retain(|entry| !entry.is_expired_at(now));
        before - self.0.len()
    }

    /// Number of entries that `prune(now)` would remove
    pub fn expired_count(&self, now: DateTime<Utc>) -> usize {
        self.0.iter().filter(|entry| entry.is_expired_at(now)).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredToken> {
        self.0.iter()
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
