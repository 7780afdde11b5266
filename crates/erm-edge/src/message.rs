//! JSON-RPC 2.0 text frames exchanged with edge-core.

use erm_core::{ErrorObject, PeerRequest, PeerResponse};

use crate::error::EdgeClientError;

const JSONRPC_VERSION: &str = "2.0";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// edge-core is calling us.
    Request(PeerRequest),
    /// Answer to one of our own calls.
    Response {
        id: u64,
        result: Result<serde_json::Value, ErrorObject>,
    },
}

pub fn call_frame(id: u64, method: &str, params: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

pub fn response_frame(id: serde_json::Value, response: PeerResponse) -> String {
    match response {
        Ok(result) => serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "result": result,
        }),
        Err(error) => serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "error": error,
        }),
    }
    .to_string()
}

pub fn classify(text: &str) -> Result<Incoming, EdgeClientError> {
    let mut frame: serde_json::Value = serde_json::from_str(text)?;

    if frame.get("method").is_some() {
        return Ok(Incoming::Request(serde_json::from_value(frame)?));
    }

    let id = frame
        .get("id")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| EdgeClientError::InvalidFrame(format!("response without numeric id: {text}")))?;

    let result = match frame.get_mut("error").map(serde_json::Value::take) {
        Some(error) => Err(serde_json::from_value(error.clone())
            .unwrap_or_else(|_| ErrorObject::new(erm_core::rpc::INTERNAL_ERROR, error.to_string()))),
        None => Ok(frame
            .get_mut("result")
            .map(serde_json::Value::take)
            .unwrap_or_default()),
    };
    Ok(Incoming::Response { id, result })
}
