use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::store::RefreshTokenStore;
use crate::auth::tokens::{AccessClaims, TokenPair, TokenService};
use crate::auth::users::{PublicUser, UserDirectory};
use crate::error::{AuthError, AuthResult};

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

/// Snapshot of network metrics served by the role-gated endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_calls: u64,
    pub active_connections: u64,
    pub avg_latency: String,
    pub error_rate: String,
    pub timestamp: chrono::DateTime<Utc>,
}

impl NetworkStats {
    fn sample() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            total_calls: rng.gen_range(1_200_000..1_300_000),
            active_connections: rng.gen_range(8_000..12_000),
            avg_latency: format!("{}ms", rng.gen_range(18..45)),
            error_rate: format!("{:.2}%", rng.gen_range(0.01..0.35)),
            timestamp: Utc::now(),
        }
    }
}

/// The token service: issues, refreshes, validates, and revokes bearer
/// credentials, and gates the two protected resources by role.
///
/// All token errors are terminal for the calling request; clients are
/// expected to refresh and retry exactly once.
#[derive(Debug)]
pub struct AuthService {
    directory: UserDirectory,
    tokens: TokenService,
    refresh_store: RefreshTokenStore,
}

impl AuthService {
    pub fn new(directory: UserDirectory, tokens: TokenService) -> Self {
        Self {
            directory,
            tokens,
            refresh_store: RefreshTokenStore::new(),
        }
    }

    /// Verify credentials and issue a token pair. The refresh token is
    /// registered as valid.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<LoginOutcome> {
        let user = match self.directory.authenticate(username, password) {
            Ok(user) => user,
            Err(err) => {
                warn!(username, "login rejected: {}", err.code());
                return Err(err);
            }
        };

        let tokens = self.tokens.issue_pair(user)?;
        self.refresh_store.register(&tokens.refresh_token).await;

        info!(username = %user.username, role = %user.role, "login succeeded");

        Ok(LoginOutcome {
            user: user.public(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// The presented token is claimed atomically before anything else, so it
    /// can never be redeemed twice: the second of two concurrent calls with
    /// the same value fails with `InvalidRefreshToken`. A token that fails
    /// signature verification has already been purged by the claim.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        if !self.refresh_store.take(refresh_token).await {
            warn!("refresh rejected: token not in the valid set");
            return Err(AuthError::InvalidRefreshToken);
        }

        let claims = self.tokens.decode_refresh(refresh_token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidRefreshToken)?;
        let user = self
            .directory
            .by_id(user_id)
            .ok_or(AuthError::InvalidRefreshToken)?;

        let tokens = self.tokens.issue_pair(user)?;
        self.refresh_store.register(&tokens.refresh_token).await;

        debug!(username = %user.username, "refresh token rotated");

        Ok(tokens)
    }

    /// Drop a refresh token from the valid set. Unknown tokens are a no-op.
    pub async fn logout(&self, refresh_token: &str) {
        self.refresh_store.remove(refresh_token).await;
        debug!("refresh token revoked");
    }

    /// Pure signature + expiry check; no store involved
    pub fn validate(&self, access_token: &str) -> AuthResult<AccessClaims> {
        self.tokens.validate_access(access_token)
    }

    /// Resolve a bearer token into the public user it represents
    pub fn authorize(&self, access_token: &str) -> AuthResult<PublicUser> {
        let claims = self.validate(access_token)?;
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::TokenInvalid("Malformed subject claim".to_string()))?;

        Ok(PublicUser {
            id,
            username: claims.username,
            email: claims.email,
            role: claims.role,
        })
    }

    /// Protected resource: the caller's own profile
    pub fn profile(&self, access_token: &str) -> AuthResult<PublicUser> {
        self.authorize(access_token)
    }

    /// Protected, role-gated resource: network statistics
    pub fn network_stats(&self, access_token: &str) -> AuthResult<(NetworkStats, PublicUser)> {
        let user = self.authorize(access_token)?;
        if !user.role.can_view_network_stats() {
            warn!(username = %user.username, role = %user.role, "network stats denied");
            return Err(AuthError::InsufficientPermissions);
        }

        Ok((NetworkStats::sample(), user))
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn refresh_store(&self) -> &RefreshTokenStore {
        &self.refresh_store
    }
}
