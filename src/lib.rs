pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod relay;

#[cfg(test)]
mod tests;

// Re-export core components
pub use crate::auth::{AuthService, TokenService, UserDirectory};
pub use crate::config::Config;
pub use crate::error::{AuthError, AuthResult};
pub use crate::relay::{Authority, Envelope, MessageBus, RelayMessage, Requester};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
