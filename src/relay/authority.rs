use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::auth::tokens::BEARER_PREFIX;
use crate::auth::PublicUser;
use crate::config::RelayConfig;
use crate::error::{AuthError, AuthResult};
use crate::relay::bus::MessageBus;
use crate::relay::http_client::{HttpClient, HttpMethod, HttpReply};
use crate::relay::message::{now_ms, AuthStatus, Envelope, RelayMessage, RequestOptions, UserInfo};

/// The live credential held by the authority. It never leaves this struct
/// except as the `Authorization` header of the authority's own HTTP calls.
#[derive(Clone)]
struct Session {
    access_token: String,
    refresh_token: String,
    user: UserInfo,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn expires_soon(&self, margin: Duration) -> bool {
        self.expires_at - Utc::now() <= margin
    }
}

/// Token service response carrying a token grant. Login responses include
/// the user; refresh responses do not.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenGrant {
    #[serde(default)]
    user: Option<PublicUser>,
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Configuration for an [`Authority`]
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Origin this authority publishes under
    pub origin: String,
    /// Base URL of the token service API, e.g. `http://localhost:3002/api`
    pub api_base: String,
    /// Origins accepted from the bus
    pub allowed_origins: Vec<String>,
    /// Refresh the credential when it is within this margin of expiry
    pub refresh_margin_seconds: u64,
    /// Fallback access-token lifetime when a grant carries no `expiresIn`
    pub access_ttl_hint_seconds: u64,
}

impl AuthorityConfig {
    pub fn new(origin: impl Into<String>, api_base: impl Into<String>, relay: &RelayConfig) -> Self {
        Self {
            origin: origin.into(),
            api_base: api_base.into(),
            allowed_origins: relay.allowed_origins.clone(),
            refresh_margin_seconds: relay.refresh_margin_seconds,
            access_ttl_hint_seconds: 900,
        }
    }
}

/// Outcome of a proxied HTTP call, before it becomes an `API_RESPONSE`
struct ProxyOutcome {
    success: bool,
    data: Option<serde_json::Value>,
    error: Option<String>,
    status: u16,
}

/// The relay participant holding the credential.
///
/// Answers status queries, executes proxied API calls on behalf of
/// requesters, and broadcasts results. Outbound broadcasts carry auth
/// status and response bodies only; the raw token goes exclusively into
/// the `Authorization` header of the authority's own HTTP requests.
pub struct Authority {
    origin: String,
    allowed_origins: HashSet<String>,
    api_base: String,
    bus: MessageBus,
    http: Arc<dyn HttpClient>,
    session: RwLock<Option<Session>>,
    refresh_margin: Duration,
    access_ttl_hint: u64,
}

impl Authority {
    pub fn new(bus: MessageBus, http: Arc<dyn HttpClient>, config: AuthorityConfig) -> Self {
        Self {
            origin: config.origin,
            allowed_origins: config.allowed_origins.into_iter().collect(),
            api_base: config.api_base,
            bus,
            http,
            session: RwLock::new(None),
            refresh_margin: Duration::seconds(config.refresh_margin_seconds as i64),
            access_ttl_hint: config.access_ttl_hint_seconds,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Current relay-visible status
    pub async fn status(&self) -> AuthStatus {
        match self.session.read().await.as_ref() {
            Some(session) => AuthStatus {
                is_authenticated: true,
                user: Some(session.user.clone()),
            },
            None => AuthStatus::unauthenticated(),
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Authenticate against the token service and take ownership of the
    /// issued credential, then broadcast the new status.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<UserInfo> {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        })
        .to_string();

        let reply = self
            .http
            .send(
                HttpMethod::Post,
                &format!("{}/auth/login", self.api_base),
                json_headers(),
                Some(body),
            )
            .await?;

        if !reply.is_success() {
            warn!(username, status = reply.status(), "authority login failed");
            return Err(match reply.status() {
                401 => AuthError::InvalidCredentials,
                status => AuthError::Upstream {
                    status,
                    message: error_message(&reply),
                },
            });
        }

        let grant: TokenGrant = reply.json()?;
        let user = grant
            .user
            .as_ref()
            .map(UserInfo::from)
            .ok_or_else(|| AuthError::Internal("Login response missing user".to_string()))?;

        self.install_session(grant, user.clone()).await;
        info!(username = %user.username, role = %user.role, "authority session established");

        self.broadcast_status().await;
        Ok(user)
    }

    /// Revoke the held refresh token, clear the session, and notify peers.
    /// The token service call is best-effort; local state is cleared either
    /// way.
    pub async fn logout(&self) {
        let refresh_token = self
            .session
            .write()
            .await
            .take()
            .map(|session| session.refresh_token);

        if let Some(token) = refresh_token {
            let body = serde_json::json!({ "refreshToken": token }).to_string();
            if let Err(err) = self
                .http
                .send(
                    HttpMethod::Post,
                    &format!("{}/auth/logout", self.api_base),
                    json_headers(),
                    Some(body),
                )
                .await
            {
                warn!(error = %err, "logout call to token service failed");
            }
        }

        let _ = self
            .bus
            .publish(&self.origin, RelayMessage::AuthLogout { timestamp: now_ms() })
            .await;
        self.broadcast_status().await;
        info!("authority logged out");
    }

    /// Process one envelope from the bus
    pub async fn handle_envelope(&self, envelope: &Envelope) {
        if let Err(err) = self.check_origin(&envelope.origin) {
            // Rejected silently: logged, never surfaced to any caller.
            warn!(code = err.code(), "{}", err);
            return;
        }

        match &envelope.message {
            RelayMessage::RequestAuthStatus { .. } => {
                debug!(origin = %envelope.origin, "status requested");
                self.broadcast_status().await;
            }
            RelayMessage::ApiRequest {
                endpoint,
                options,
                request_id,
            } => {
                debug!(origin = %envelope.origin, endpoint, request_id, "proxied call requested");
                let outcome = self.execute_proxy(endpoint, options).await;
                let message = RelayMessage::ApiResponse {
                    success: outcome.success,
                    data: outcome.data,
                    error: outcome.error,
                    status: outcome.status,
                    request_id: request_id.clone(),
                };
                if let Err(err) = self.bus.publish(&self.origin, message).await {
                    error!(request_id, error = %err, "failed to publish API response");
                }
            }
            RelayMessage::AuthLogout { .. } => {
                // Our own logout broadcast comes back on the bus; peers'
                // notifications clear the credential here.
                if envelope.origin == self.origin {
                    return;
                }
                let cleared = self.session.write().await.take().is_some();
                if cleared {
                    info!(origin = %envelope.origin, "credential cleared after logout notification");
                }
                self.broadcast_status().await;
            }
            RelayMessage::AuthStatusUpdate { .. } | RelayMessage::ApiResponse { .. } => {
                trace!("requester-bound message ignored");
            }
        }
    }

    /// Consume the bus until it closes
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut receiver = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => this.handle_envelope(&envelope).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "authority lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn check_origin(&self, origin: &str) -> AuthResult<()> {
        if self.allowed_origins.contains(origin) {
            Ok(())
        } else {
            Err(AuthError::UnknownOrigin(origin.to_string()))
        }
    }

    async fn install_session(&self, grant: TokenGrant, user: UserInfo) {
        let expires_in = grant.expires_in.unwrap_or(self.access_ttl_hint);
        let session = Session {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            user,
            expires_at: Utc::now() + Duration::seconds(expires_in as i64),
        };
        *self.session.write().await = Some(session);
    }

    async fn broadcast_status(&self) {
        let status = self.status().await;
        let message = RelayMessage::AuthStatusUpdate {
            is_authenticated: status.is_authenticated,
            user: status.user,
            timestamp: now_ms(),
        };
        if let Err(err) = self.bus.publish(&self.origin, message).await {
            error!(error = %err, "failed to publish status update");
        }
    }

    /// Return a usable access token, refreshing first when the held one is
    /// near expiry.
    async fn ensure_fresh_token(&self) -> AuthResult<String> {
        let needs_refresh = match self.session.read().await.as_ref() {
            None => return Err(AuthError::NotAuthenticated),
            Some(session) => session.expires_soon(self.refresh_margin),
        };

        if needs_refresh {
            self.refresh_session().await?;
        }

        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
            .ok_or(AuthError::NotAuthenticated)
    }

    /// Rotate the held credential. A rejected refresh clears the session and
    /// broadcasts the unauthenticated status, so peers fail closed with us.
    async fn refresh_session(&self) -> AuthResult<()> {
        let (refresh_token, user) = match self.session.read().await.as_ref() {
            Some(session) => (session.refresh_token.clone(), session.user.clone()),
            None => return Err(AuthError::NotAuthenticated),
        };

        let body = serde_json::json!({ "refreshToken": refresh_token }).to_string();
        let result = self
            .http
            .send(
                HttpMethod::Post,
                &format!("{}/auth/refresh", self.api_base),
                json_headers(),
                Some(body),
            )
            .await;

        match result {
            Ok(reply) if reply.is_success() => {
                let grant: TokenGrant = reply.json()?;
                self.install_session(grant, user).await;
                debug!("authority credential refreshed");
                Ok(())
            }
            Ok(reply) => {
                warn!(status = reply.status(), "credential refresh rejected, clearing session");
                *self.session.write().await = None;
                self.broadcast_status().await;
                Err(AuthError::InvalidRefreshToken)
            }
            Err(err) => {
                warn!(error = %err, "credential refresh unreachable, clearing session");
                *self.session.write().await = None;
                self.broadcast_status().await;
                Err(err)
            }
        }
    }

    async fn execute_proxy(&self, endpoint: &str, options: &RequestOptions) -> ProxyOutcome {
        let token = match self.ensure_fresh_token().await {
            Ok(token) => token,
            Err(err) => {
                return ProxyOutcome {
                    success: false,
                    data: None,
                    error: Some(err.to_string()),
                    status: 401,
                }
            }
        };

        let url = format!("{}{}", self.api_base, endpoint);
        let mut headers = options.headers.clone().unwrap_or_default();
        headers.insert(
            "Authorization".to_string(),
            format!("{}{}", BEARER_PREFIX, token),
        );
        if options.body.is_some() {
            headers
                .entry("Content-Type".to_string())
                .or_insert_with(|| "application/json".to_string());
        }

        match self
            .http
            .send(options.method, &url, headers, options.body.clone())
            .await
        {
            Ok(reply) => {
                let status = reply.status();
                if reply.is_success() {
                    ProxyOutcome {
                        success: true,
                        data: Some(reply.json_value()),
                        error: None,
                        status,
                    }
                } else {
                    debug!(endpoint, status, "proxied call failed upstream");
                    ProxyOutcome {
                        success: false,
                        data: None,
                        error: Some(error_message(&reply)),
                        status,
                    }
                }
            }
            Err(err) => {
                error!(endpoint, error = %err, "proxied call transport failure");
                ProxyOutcome {
                    success: false,
                    data: None,
                    error: Some(err.to_string()),
                    status: 502,
                }
            }
        }
    }
}

fn json_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers
}

/// Pull the `error` field out of a JSON error body, falling back to a
/// status-line message.
fn error_message(reply: &HttpReply) -> String {
    reply
        .json::<serde_json::Value>()
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|e| e.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("Request failed with status {}", reply.status()))
}
