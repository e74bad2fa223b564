use std::collections::HashSet;

use tokio::sync::RwLock;
use tracing::debug;

/// The set of currently-valid refresh tokens.
///
/// This is the only shared-mutable state in the token service. Rotation is
/// enforced through [`RefreshTokenStore::take`]: the lookup and the delete
/// happen under one write lock, so of two concurrent refresh calls with the
/// same token exactly one observes it as valid.
#[derive(Debug, Default)]
pub struct RefreshTokenStore {
    tokens: RwLock<HashSet<String>>,
}

impl RefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly issued refresh token as valid
    pub async fn register(&self, token: &str) {
        self.tokens.write().await.insert(token.to_string());
    }

    /// Atomically claim a token: returns `true` if it was present and is now
    /// removed. A second call with the same value returns `false`.
    pub async fn take(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token)
    }

    /// Remove a token without caring whether it was present (logout is
    /// idempotent).
    pub async fn remove(&self, token: &str) {
        let removed = self.tokens.write().await.remove(token);
        if !removed {
            debug!("logout for a refresh token that was not registered");
        }
    }

    pub async fn contains(&self, token: &str) -> bool {
        self.tokens.read().await.contains(token)
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }
}
