use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Announces this process to edge-core as a gateway resource manager.
pub const METHOD_ANNOUNCE: &str = "gw_resource_manager_register";
pub const METHOD_ADD_RESOURCE: &str = "add_resource";
pub const METHOD_WRITE_RESOURCE_VALUE: &str = "write_resource_value";
/// The only peer-initiated method the agent acts on.
pub const METHOD_WRITE: &str = "write";

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A request initiated by edge-core.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PeerRequest {
    /// Correlation token; echoed back verbatim in the response.
    #[serde(default)]
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_params() -> Self {
        Self::new(INVALID_PARAMS, "Invalid params.")
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found.")
    }

    pub fn internal_error() -> Self {
        Self::new(INTERNAL_ERROR, "Internal error.")
    }
}

/// Outcome sent back for a peer request.
pub type PeerResponse = Result<serde_json::Value, ErrorObject>;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("channel closed")]
    Closed,

    #[error("peer returned error {code}: {message}")]
    Remote { code: i64, message: String },
}

impl From<ErrorObject> for RpcError {
    fn from(err: ErrorObject) -> Self {
        RpcError::Remote {
            code: err.code,
            message: err.message,
        }
    }
}

/// Outbound half of the connection to edge-core.
///
/// Peer-initiated requests arrive separately, as a
/// `tokio::sync::mpsc::Receiver<PeerRequest>` handed out by the transport.
///
/// Uses Pin<Box<dyn Future>> for dyn-compatibility.
pub trait RpcChannel: Send + Sync {
    /// Call a method on edge-core and wait for its result.
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, RpcError>> + Send + 'a>>;

    /// Answer a peer-initiated request.
    fn respond<'a>(
        &'a self,
        id: serde_json::Value,
        response: PeerResponse,
    ) -> Pin<Box<dyn Future<Output = Result<(), RpcError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_params_serializes_as_structured_error() {
        let json = serde_json::to_value(ErrorObject::invalid_params()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"code": -32602, "message": "Invalid params."})
        );
    }

    #[test]
    fn parses_write_request() {
        let req: PeerRequest = serde_json::from_str(
            r#"{"id":"abc","jsonrpc":"2.0","method":"write","params":{"uri":{"objectId":100,"objectInstanceId":0,"resourceId":3},"value":"aGk="}}"#,
        )
        .unwrap();
        assert_eq!(req.id, serde_json::json!("abc"));
        assert_eq!(req.method, METHOD_WRITE);
        assert_eq!(req.params["value"], "aGk=");
    }

    #[test]
    fn params_default_to_null() {
        let req: PeerRequest = serde_json::from_str(r#"{"id":1,"method":"ping"}"#).unwrap();
        assert!(req.params.is_null());
    }

    #[test]
    fn remote_error_keeps_code() {
        let err = RpcError::from(ErrorObject::new(-32000, "Resource already exists"));
        assert!(matches!(err, RpcError::Remote { code: -32000, .. }));
        assert!(err.to_string().contains("Resource already exists"));
    }
}
