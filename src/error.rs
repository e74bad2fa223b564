use std::fmt;

use thiserror::Error;

/// Error type shared by the token service and the relay protocol.
///
/// Token-service variants map onto HTTP responses via [`AuthError::http_status`];
/// relay variants (`RequestTimeout`, `UnknownOrigin`, `RemoteUnavailable`) are
/// local to a participant and never travel over the wire.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    #[error("Insufficient permissions for this resource")]
    InsufficientPermissions,

    #[error("No authenticated session available")]
    NotAuthenticated,

    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout { request_id: String, timeout_ms: u64 },

    #[error("Message from unknown origin '{0}' rejected")]
    UnknownOrigin(String),

    #[error("Remote authority did not answer the status request")]
    RemoteUnavailable,

    /// A proxied call failed upstream; the upstream HTTP status is preserved
    /// so callers can distinguish 401 from 403 from 5xx.
    #[error("Upstream request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Stable identifier for logs and API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenInvalid(_) => "TOKEN_INVALID",
            AuthError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AuthError::NotAuthenticated => "NOT_AUTHENTICATED",
            AuthError::RequestTimeout { .. } => "REQUEST_TIMEOUT",
            AuthError::UnknownOrigin(_) => "UNKNOWN_ORIGIN",
            AuthError::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            AuthError::Upstream { .. } => "UPSTREAM_FAILED",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this error when surfaced by the token service.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidRefreshToken
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_)
            | AuthError::NotAuthenticated => 401,

            AuthError::InsufficientPermissions | AuthError::UnknownOrigin(_) => 403,

            AuthError::RequestTimeout { .. } | AuthError::RemoteUnavailable => 504,

            AuthError::Upstream { status, .. } => *status,

            AuthError::Internal(_) => 500,
        }
    }

    /// Whether the failure is on our side rather than the caller's.
    pub fn is_server_error(&self) -> bool {
        matches!(self, AuthError::Internal(_))
    }
}

/// Create an internal error from anything displayable.
pub fn internal(err: impl fmt::Display) -> AuthError {
    AuthError::Internal(err.to_string())
}
