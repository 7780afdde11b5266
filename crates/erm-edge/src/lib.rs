//! Connection to edge-core.
//!
//! edge-core serves its gateway resource manager API as JSON-RPC 2.0 over a
//! websocket on a local Unix socket (`ws://localhost/1/grm`). [`EdgeClient`]
//! implements [`erm_core::RpcChannel`] on top of it.

pub mod client;
pub mod error;
pub mod message;

pub use client::EdgeClient;
pub use error::EdgeClientError;
