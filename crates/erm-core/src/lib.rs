//! Core of the edge resource manager.
//!
//! Exposes configured edge capabilities to edge-core as LWM2M resources under
//! a single object id, one object instance per capability:
//!
//! ```text
//! {object_id}/{instance}/1  name          read-only
//! {object_id}/{instance}/2  enable flag   read-only
//! {object_id}/{instance}/3  config file   read-write, base64
//! ```
//!
//! [`ResourceManager`] registers that tree over an [`RpcChannel`] and then
//! writes config files whenever edge-core writes resource 3.

pub mod agent;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod registrar;
pub mod rpc;
pub mod testing;
pub mod tree;

pub use agent::ResourceManager;
pub use config::{AgentConfig, EdgeResource, ResourceManagerConfig};
pub use error::AgentError;
pub use rpc::{ErrorObject, PeerRequest, PeerResponse, RpcChannel, RpcError};
pub use tree::{ResourceAddress, ResourceKind, ResourceTree};
