//! Token service HTTP API

pub mod handlers;
pub mod server;

pub use server::{router, start_server, AppState};
