use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{PublicUser, Role};
use crate::relay::http_client::HttpMethod;

/// Non-secret user descriptor carried by status updates.
///
/// This is the only user information that ever crosses the relay boundary;
/// tokens never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<&PublicUser> for UserInfo {
    fn from(user: &PublicUser) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Relay-visible authentication state: a yes/no plus the non-secret user
/// descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub is_authenticated: bool,
    pub user: Option<UserInfo>,
}

impl AuthStatus {
    pub fn unauthenticated() -> Self {
        Self {
            is_authenticated: false,
            user: None,
        }
    }
}

/// Options for a proxied API call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// The relay wire protocol as a tagged union.
///
/// Tags and field names match the wire format (`type` + `payload`, camelCase
/// fields). Dispatch is an exhaustive match; a payload with an unknown
/// `type` fails deserialization instead of being silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMessage {
    #[serde(rename_all = "camelCase")]
    RequestAuthStatus { timestamp: i64 },

    #[serde(rename_all = "camelCase")]
    AuthStatusUpdate {
        is_authenticated: bool,
        user: Option<UserInfo>,
        timestamp: i64,
    },

    #[serde(rename_all = "camelCase")]
    ApiRequest {
        endpoint: String,
        #[serde(default)]
        options: RequestOptions,
        request_id: String,
    },

    #[serde(rename_all = "camelCase")]
    ApiResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        status: u16,
        request_id: String,
    },

    #[serde(rename_all = "camelCase")]
    AuthLogout { timestamp: i64 },
}

impl RelayMessage {
    /// Wire tag of this message, for logging and bus statistics
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::RequestAuthStatus { .. } => "REQUEST_AUTH_STATUS",
            RelayMessage::AuthStatusUpdate { .. } => "AUTH_STATUS_UPDATE",
            RelayMessage::ApiRequest { .. } => "API_REQUEST",
            RelayMessage::ApiResponse { .. } => "API_RESPONSE",
            RelayMessage::AuthLogout { .. } => "AUTH_LOGOUT",
        }
    }
}

/// A message together with the origin that sent it.
///
/// The origin plays the role `event.origin` plays for `postMessage`:
/// participants check it against their allow-list before dispatching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: String,
    pub message: RelayMessage,
}

/// Current time as Unix milliseconds, the timestamp unit of the wire format
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
