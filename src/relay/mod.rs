//! The cross-context authentication relay.
//!
//! One authority holds the credential; any number of requesters learn the
//! authentication status and execute API calls by proxy over a shared
//! broadcast bus. Raw tokens never appear in bus traffic.

pub mod authority;
pub mod bus;
pub mod http_client;
pub mod message;
pub mod requester;

pub use authority::{Authority, AuthorityConfig};
pub use bus::{BusStats, MessageBus};
pub use http_client::{HttpClient, HttpMethod, HttpReply, ReqwestHttpClient};
pub use message::{now_ms, AuthStatus, Envelope, RelayMessage, RequestOptions, UserInfo};
pub use requester::{ListenerId, ProxyReply, Requester, RequesterConfig, RequesterState};
