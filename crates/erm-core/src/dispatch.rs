use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bridge;
use crate::error::AgentError;
use crate::rpc::{ErrorObject, METHOD_WRITE, PeerRequest, PeerResponse, RpcChannel};
use crate::tree::{ResourceAddress, ResourceInstance, ResourceKind, ResourceTree};

/// Consumes peer-initiated requests one at a time, in arrival order.
///
/// Only `write` requests addressed to the registered tree do anything. By
/// default requests the agent cannot act on get no response at all, which is
/// what edge-core has always seen; `strict` answers them with JSON-RPC errors
/// instead.
pub struct DispatchLoop {
    channel: Arc<dyn RpcChannel>,
    tree: Arc<ResourceTree>,
    strict: bool,
}

impl DispatchLoop {
    pub fn new(channel: Arc<dyn RpcChannel>, tree: Arc<ResourceTree>, strict: bool) -> Self {
        Self {
            channel,
            tree,
            strict,
        }
    }

    /// Serve until the transport drops its end of the request stream.
    pub async fn run(&self, mut requests: mpsc::Receiver<PeerRequest>) -> Result<(), AgentError> {
        tracing::info!(
            object_id = self.tree.object_id(),
            instances = self.tree.len(),
            "Waiting for requests from edge-core"
        );
        while let Some(request) = requests.recv().await {
            self.handle(request).await;
        }
        Err(AgentError::Connection(
            "request stream from edge-core closed".into(),
        ))
    }

    /// Process a single request, responding if it calls for one.
    pub async fn handle(&self, request: PeerRequest) {
        tracing::debug!(
            id = %request.id,
            method = %request.method,
            "Got request from edge-core"
        );
        let Some(response) = self.process(&request).await else {
            return;
        };
        if let Err(e) = self.channel.respond(request.id.clone(), response).await {
            tracing::error!(id = %request.id, error = %e, "Failed to respond to edge-core");
        }
    }

    async fn process(&self, request: &PeerRequest) -> Option<PeerResponse> {
        if request.method != METHOD_WRITE {
            tracing::debug!(method = %request.method, "Unhandled request");
            return self.strict_error(ErrorObject::method_not_found());
        }

        let address = match parse_uri(&request.params) {
            Ok(address) => address,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding write request");
                return self.strict_error(ErrorObject::invalid_params());
            }
        };

        let Some((instance, kind)) = self.tree.lookup(address) else {
            tracing::debug!(%address, "Write addressed to unknown resource");
            return self.strict_error(ErrorObject::invalid_params());
        };

        match self.apply_write(instance, kind, address, &request.params).await {
            Ok(()) => Some(Ok(serde_json::json!("ok"))),
            Err(AgentError::UnsupportedOperation(address)) => {
                tracing::warn!(%address, resource = %kind, "Rejected write to read-only resource");
                Some(Err(ErrorObject::invalid_params()))
            }
            Err(e @ AgentError::ProtocolParse(_)) => {
                tracing::warn!(%address, error = %e, "Malformed write request");
                self.strict_error(ErrorObject::invalid_params())
            }
            Err(e) => {
                tracing::error!(%address, error = %e, "Config write failed");
                self.strict_error(ErrorObject::internal_error())
            }
        }
    }

    async fn apply_write(
        &self,
        instance: &ResourceInstance,
        kind: ResourceKind,
        address: ResourceAddress,
        params: &serde_json::Value,
    ) -> Result<(), AgentError> {
        if !kind.registration_operations().allows_write() {
            return Err(AgentError::UnsupportedOperation(address));
        }

        let path = instance.resource.config_file_path.as_deref().ok_or_else(|| {
            AgentError::Config(format!("{} has no config_filepath", instance.resource.name))
        })?;
        let value = params
            .get("value")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| AgentError::ProtocolParse("write has no string value".into()))?;

        tracing::debug!(name = %instance.resource.name, path = %path.display(), "Writing config file");
        bridge::write_decoded(path, value).await?;
        tracing::info!(%address, path = %path.display(), "Config file updated by edge-core");
        Ok(())
    }

    fn strict_error(&self, error: ErrorObject) -> Option<PeerResponse> {
        self.strict.then_some(Err(error))
    }
}

/// Extract the `params.uri` triple of a write request.
pub fn parse_uri(params: &serde_json::Value) -> Result<ResourceAddress, AgentError> {
    let uri = params
        .get("uri")
        .filter(|uri| uri.is_object())
        .ok_or_else(|| AgentError::ProtocolParse("write has no uri".into()))?;

    Ok(ResourceAddress::new(
        uri_component(uri, "objectId")?,
        uri_component(uri, "objectInstanceId")?,
        uri_component(uri, "resourceId")?,
    ))
}

// edge-core may encode ids as JSON floats; accept them when integral.
fn uri_component(uri: &serde_json::Value, key: &str) -> Result<u32, AgentError> {
    let value = &uri[key];
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u64)
        })
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| AgentError::ProtocolParse(format!("uri.{key} is not a valid id: {value}")))
}
