//! In-memory [`RpcChannel`] that records traffic instead of talking to
//! edge-core. Used by the unit and integration tests of the workspace.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::rpc::{PeerResponse, RpcChannel, RpcError};
use crate::tree::ResourceAddress;

/// One outbound call as seen by the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: serde_json::Value,
}

impl RecordedCall {
    fn resource(&self) -> &serde_json::Value {
        &self.params["objects"][0]["objectInstances"][0]["resources"][0]
    }

    /// Address of an `add_resource` / `write_resource_value` call.
    pub fn address(&self) -> Option<ResourceAddress> {
        let object = &self.params["objects"][0];
        let id = |v: &serde_json::Value| v.as_u64().and_then(|n| u32::try_from(n).ok());
        Some(ResourceAddress::new(
            id(&object["objectId"])?,
            id(&object["objectInstances"][0]["objectInstanceId"])?,
            id(&self.resource()["resourceId"])?,
        ))
    }

    pub fn value(&self) -> Option<&str> {
        self.resource()["value"].as_str()
    }

    pub fn operations(&self) -> Option<u64> {
        self.resource()["operations"].as_u64()
    }
}

struct FailRule {
    method: String,
    address: Option<ResourceAddress>,
}

/// Records every call and response; answers calls with `"ok"` unless a
/// failure rule matches.
#[derive(Default)]
pub struct RecordingChannel {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<Vec<(serde_json::Value, PeerResponse)>>,
    rules: Vec<FailRule>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call of `method`.
    pub fn fail_method(mut self, method: &str) -> Self {
        self.rules.push(FailRule {
            method: method.into(),
            address: None,
        });
        self
    }

    /// Fail calls of `method` addressed to `address`.
    pub fn fail_at(mut self, method: &str, address: ResourceAddress) -> Self {
        self.rules.push(FailRule {
            method: method.into(),
            address: Some(address),
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn responses(&self) -> Vec<(serde_json::Value, PeerResponse)> {
        self.responses.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn should_fail(&self, call: &RecordedCall) -> bool {
        self.rules.iter().any(|rule| {
            rule.method == call.method
                && rule.address.is_none_or(|addr| call.address() == Some(addr))
        })
    }
}

impl RpcChannel for RecordingChannel {
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, RpcError>> + Send + 'a>> {
        Box::pin(async move {
            let call = RecordedCall {
                method: method.to_string(),
                params,
            };
            let fail = self.should_fail(&call);
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
            if fail {
                return Err(RpcError::Remote {
                    code: -32000,
                    message: format!("{method} rejected"),
                });
            }
            Ok(serde_json::json!("ok"))
        })
    }

    fn respond<'a>(
        &'a self,
        id: serde_json::Value,
        response: PeerResponse,
    ) -> Pin<Box<dyn Future<Output = Result<(), RpcError>> + Send + 'a>> {
        Box::pin(async move {
            self.responses
                .lock()
                .map_err(|e| RpcError::Transport(e.to_string()))?
                .push((id, response));
            Ok(())
        })
    }
}
