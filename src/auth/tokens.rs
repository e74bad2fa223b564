use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::users::{Role, User};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Prefix expected on the `Authorization` header
pub const BEARER_PREFIX: &str = "Bearer ";

/// Discriminates access tokens from refresh tokens so one can never be
/// presented in place of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims carried by an access token. Validity is determined purely by
/// signature and `exp`; nothing here is ever stored server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    pub token_type: TokenKind,
}

/// Claims carried by a refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject (user id)
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub token_type: TokenKind,
}

/// An access/refresh token pair as returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Issues and validates HS256-signed tokens.
///
/// Access and refresh tokens are signed with separate secrets. Validation
/// uses zero leeway so `exp` is exact.
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: Duration::seconds(config.access_ttl_seconds as i64),
            refresh_ttl: Duration::seconds(config.refresh_ttl_seconds as i64),
        }
    }

    /// Issue a fresh access/refresh pair for a user
    pub fn issue_pair(&self, user: &User) -> AuthResult<TokenPair> {
        let now = Utc::now();

        let access_claims = AccessClaims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
            token_type: TokenKind::Access,
        };

        let refresh_claims = RefreshClaims {
            sub: user.id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            token_type: TokenKind::Refresh,
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = encode(&header, &access_claims, &self.access_encoding)
            .map_err(|e| AuthError::Internal(format!("Access token encoding failed: {}", e)))?;
        let refresh_token = encode(&header, &refresh_claims, &self.refresh_encoding)
            .map_err(|e| AuthError::Internal(format!("Refresh token encoding failed: {}", e)))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds() as u64,
        })
    }

    /// Validate an access token, distinguishing expiry from other failures
    pub fn validate_access(&self, token: &str) -> AuthResult<AccessClaims> {
        let token_data = decode::<AccessClaims>(token, &self.access_decoding, &validation())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::TokenInvalid("Invalid signature".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AuthError::TokenInvalid("Malformed token".to_string())
                }
                _ => AuthError::TokenInvalid(e.to_string()),
            })?;

        let claims = token_data.claims;
        if claims.token_type != TokenKind::Access {
            return Err(AuthError::TokenInvalid("Not an access token".to_string()));
        }

        Ok(claims)
    }

    /// Decode a refresh token. Any failure collapses to `InvalidRefreshToken`;
    /// callers never learn why a refresh token was rejected.
    pub fn decode_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        let token_data = decode::<RefreshClaims>(token, &self.refresh_decoding, &validation())
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let claims = token_data.claims;
        if claims.token_type != TokenKind::Refresh {
            return Err(AuthError::InvalidRefreshToken);
        }

        Ok(claims)
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }
}

/// Strip the `Bearer ` prefix from an `Authorization` header value
pub fn extract_bearer_token(auth_header: &str) -> AuthResult<&str> {
    auth_header.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
        AuthError::TokenInvalid("Malformed Authorization header".to_string())
    })
}
