use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::{AuthError, AuthResult};
use crate::relay::bus::MessageBus;
use crate::relay::message::{now_ms, AuthStatus, Envelope, RelayMessage, RequestOptions};

/// Requester lifecycle: created, waiting for the first status answer, or
/// ready. The status timeout collapses `AwaitingStatus` into
/// `Ready { authenticated: false }` so consumers fail closed.
#[derive(Debug, Clone, PartialEq)]
pub enum RequesterState {
    Loading,
    AwaitingStatus,
    Ready(AuthStatus),
}

/// Identifier handed out by [`Requester::subscribe_status`]
pub type ListenerId = Uuid;

type StatusListener = Box<dyn Fn(&AuthStatus) + Send + Sync>;

/// Result of a successfully proxied call: preserved status plus body
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub status: u16,
    pub data: serde_json::Value,
}

/// A continuation waiting for its `API_RESPONSE`. Removed on completion or
/// timeout; a late response finds no entry and is ignored.
struct PendingRequest {
    sender: oneshot::Sender<AuthResult<ProxyReply>>,
    created_at: std::time::Instant,
}

/// Configuration for a [`Requester`]
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    /// Origin this requester publishes under
    pub origin: String,
    /// Origins accepted from the bus
    pub allowed_origins: Vec<String>,
    /// Fail-closed window for the initial status answer
    pub status_timeout: Duration,
    /// Deadline for each proxied call
    pub request_timeout: Duration,
}

impl RequesterConfig {
    pub fn new(origin: impl Into<String>, relay: &RelayConfig) -> Self {
        Self {
            origin: origin.into(),
            allowed_origins: relay.allowed_origins.clone(),
            status_timeout: Duration::from_millis(relay.status_timeout_ms),
            request_timeout: Duration::from_millis(relay.request_timeout_ms),
        }
    }
}

/// A relay participant that never sees the credential.
///
/// It learns the authentication status from broadcasts and executes API
/// calls by proxy: each call gets a unique request id, a pending-table
/// entry, and a deadline. Status changes are observable through an explicit
/// listener registry instead of ambient globals.
pub struct Requester {
    origin: String,
    allowed_origins: HashSet<String>,
    bus: MessageBus,
    state: watch::Sender<RequesterState>,
    pending: DashMap<String, PendingRequest>,
    listeners: DashMap<ListenerId, StatusListener>,
    status_timeout: Duration,
    request_timeout: Duration,
}

impl Requester {
    pub fn new(bus: MessageBus, config: RequesterConfig) -> Self {
        let (state, _) = watch::channel(RequesterState::Loading);
        Self {
            origin: config.origin,
            allowed_origins: config.allowed_origins.into_iter().collect(),
            bus,
            state,
            pending: DashMap::new(),
            listeners: DashMap::new(),
            status_timeout: config.status_timeout,
            request_timeout: config.request_timeout,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn state(&self) -> RequesterState {
        self.state.borrow().clone()
    }

    /// Current status. Before the first answer arrives this reads as
    /// unauthenticated.
    pub fn status(&self) -> AuthStatus {
        match self.state() {
            RequesterState::Ready(status) => status,
            RequesterState::Loading | RequesterState::AwaitingStatus => {
                AuthStatus::unauthenticated()
            }
        }
    }

    /// Register a callback invoked on every status change
    pub fn subscribe_status(
        &self,
        listener: impl Fn(&AuthStatus) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = Uuid::new_v4();
        self.listeners.insert(id, Box::new(listener));
        debug!(listener_id = %id, "status listener registered");
        id
    }

    /// Remove a status listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(&id).is_some();
        if !removed {
            debug!(listener_id = %id, "attempted to unsubscribe unknown listener");
        }
        removed
    }

    /// Number of in-flight proxied calls
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ask the authority for the current status and arm the fail-closed
    /// timer: if no answer arrives within the window, the requester settles
    /// on `Ready(unauthenticated)`.
    pub async fn request_status(self: &Arc<Self>) {
        self.state.send_replace(RequesterState::AwaitingStatus);
        let _ = self
            .bus
            .publish(
                &self.origin,
                RelayMessage::RequestAuthStatus { timestamp: now_ms() },
            )
            .await;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(this.status_timeout).await;
            if this.state() == RequesterState::AwaitingStatus {
                debug!(origin = %this.origin, "status request timed out, failing closed");
                this.apply_status(AuthStatus::unauthenticated());
            }
        });
    }

    /// Wait until the state machine has settled, however it settled. Returns
    /// `RemoteUnavailable` when even the fail-closed transition never fires
    /// (no run loop attached).
    pub async fn wait_until_ready(&self) -> AuthResult<AuthStatus> {
        let mut receiver = self.state.subscribe();
        let wait = self.status_timeout * 2;
        let ready = timeout(
            wait,
            receiver.wait_for(|state| matches!(state, RequesterState::Ready(_))),
        )
        .await;

        match ready {
            Ok(Ok(state)) => match &*state {
                RequesterState::Ready(status) => Ok(status.clone()),
                _ => Err(AuthError::RemoteUnavailable),
            },
            _ => Err(AuthError::RemoteUnavailable),
        }
    }

    /// Execute an API call through the authority.
    ///
    /// Requires an authenticated status. Exactly one terminal outcome per
    /// call: the matching response resolves it, or the deadline rejects it
    /// with `RequestTimeout` and removes the pending entry so a late
    /// response becomes a no-op.
    pub async fn proxy_call(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> AuthResult<ProxyReply> {
        match self.state() {
            RequesterState::Ready(status) if status.is_authenticated => {}
            _ => return Err(AuthError::NotAuthenticated),
        }

        let request_id = Uuid::new_v4().to_string();
        let (sender, receiver) = oneshot::channel();
        self.pending.insert(
            request_id.clone(),
            PendingRequest {
                sender,
                created_at: std::time::Instant::now(),
            },
        );

        debug!(endpoint, request_id = %request_id, "sending proxied API request");
        let _ = self
            .bus
            .publish(
                &self.origin,
                RelayMessage::ApiRequest {
                    endpoint: endpoint.to_string(),
                    options,
                    request_id: request_id.clone(),
                },
            )
            .await;

        match timeout(self.request_timeout, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                // Sender dropped without a response; the entry is already gone.
                Err(AuthError::Internal("Response channel closed".to_string()))
            }
            Err(_) => {
                self.pending.remove(&request_id);
                warn!(request_id = %request_id, "proxied call timed out");
                Err(AuthError::RequestTimeout {
                    request_id,
                    timeout_ms: self.request_timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Process one envelope from the bus
    pub fn handle_envelope(&self, envelope: &Envelope) {
        if let Err(err) = self.check_origin(&envelope.origin) {
            // Rejected silently: logged, never surfaced to any caller.
            warn!(code = err.code(), "{}", err);
            return;
        }

        match &envelope.message {
            RelayMessage::AuthStatusUpdate {
                is_authenticated,
                user,
                ..
            } => {
                trace!(origin = %envelope.origin, authenticated = is_authenticated, "status update received");
                self.apply_status(AuthStatus {
                    is_authenticated: *is_authenticated,
                    user: user.clone(),
                });
            }
            RelayMessage::ApiResponse {
                success,
                data,
                error,
                status,
                request_id,
            } => {
                self.complete_pending(request_id, *success, data.clone(), error.clone(), *status);
            }
            RelayMessage::RequestAuthStatus { .. }
            | RelayMessage::ApiRequest { .. }
            | RelayMessage::AuthLogout { .. } => {
                trace!("authority-bound message ignored");
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
                    Ok(envelope) => this.handle_envelope(&envelope),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "requester lagged behind the bus");
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

    fn apply_status(&self, status: AuthStatus) {
        self.state.send_replace(RequesterState::Ready(status.clone()));
        for listener in self.listeners.iter() {
            listener.value()(&status);
        }
    }

    fn complete_pending(
        &self,
        request_id: &str,
        success: bool,
        data: Option<serde_json::Value>,
        error: Option<String>,
        status: u16,
    ) {
        let Some((_, pending)) = self.pending.remove(request_id) else {
            debug!(request_id, "response for unknown or already-settled request ignored");
            return;
        };

        trace!(
            request_id,
            elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
            "completing proxied call"
        );

        let outcome = if success {
            Ok(ProxyReply {
                status,
                data: data.unwrap_or(serde_json::Value::Null),
            })
        } else {
            Err(AuthError::Upstream {
                status,
                message: error.unwrap_or_else(|| "API request failed".to_string()),
            })
        };

        // The caller may have timed out already; a failed send is the
        // late-response no-op.
        let _ = pending.sender.send(outcome);
    }
}
