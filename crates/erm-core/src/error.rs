use std::path::PathBuf;

use thiserror::Error;

use crate::rpc::RpcError;
use crate::tree::ResourceAddress;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("registration of {address} failed: {source}")]
    Registration {
        address: ResourceAddress,
        #[source]
        source: RpcError,
    },

    #[error("could not read config file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write config file {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("value is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("malformed peer request: {0}")]
    ProtocolParse(String),

    #[error("resource {0} is not writable")]
    UnsupportedOperation(ResourceAddress),

    #[error("invalid configuration: {0}")]
    Config(String),
}
