use std::sync::Arc;

use crate::bridge;
use crate::error::AgentError;
use crate::rpc::{METHOD_ADD_RESOURCE, METHOD_ANNOUNCE, METHOD_WRITE_RESOURCE_VALUE, RpcChannel, RpcError};
use crate::tree::{InitialValue, ResourceAddress, ResourceDescriptor, ResourceEntry, ResourceTree};

/// What happened during a registration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub registered: Vec<ResourceAddress>,
    pub failed: Vec<ResourceAddress>,
    pub values_written: usize,
    pub failed_writes: Vec<ResourceAddress>,
    /// Config resources whose payload was cut to the size ceiling.
    pub truncated: Vec<ResourceAddress>,
}

/// Declares the resource tree to edge-core and seeds its values.
///
/// Every resource is attempted in configuration order. A failure only skips
/// the value write for that one resource; nothing is rolled back.
pub struct Registrar {
    channel: Arc<dyn RpcChannel>,
    tree: Arc<ResourceTree>,
}

impl Registrar {
    pub fn new(channel: Arc<dyn RpcChannel>, tree: Arc<ResourceTree>) -> Self {
        Self { channel, tree }
    }

    /// Register this process with edge-core. Failure means there is nobody
    /// to talk to and is fatal for the run.
    pub async fn announce(&self, name: &str) -> Result<(), AgentError> {
        let response = self
            .channel
            .call(METHOD_ANNOUNCE, serde_json::json!({ "name": name }))
            .await
            .map_err(|e| AgentError::Connection(format!("{METHOD_ANNOUNCE} failed: {e}")))?;

        tracing::debug!(%response, "{METHOD_ANNOUNCE} response");
        tracing::info!(name, "Registered with edge-core");
        Ok(())
    }

    pub async fn register_all(&self) -> RegistrationSummary {
        let mut summary = RegistrationSummary::default();

        for instance in self.tree.instances() {
            tracing::debug!(
                instance = instance.instance_id,
                name = %instance.resource.name,
                "Registering edge resource"
            );
            for entry in &instance.entries {
                self.register_entry(entry, &instance.resource.name, &mut summary)
                    .await;
            }
        }

        summary
    }

    async fn register_entry(
        &self,
        entry: &ResourceEntry,
        name: &str,
        summary: &mut RegistrationSummary,
    ) {
        let address = entry.registration.address;
        if let Err(e) = self.add_resource(&entry.registration).await {
            tracing::error!(%address, error = %e, "Failed to add resource");
            summary.failed.push(address);
            return;
        }
        summary.registered.push(address);

        let value = match &entry.initial_value {
            InitialValue::Encoded(value) => value.clone(),
            InitialValue::ConfigFile(None) => {
                tracing::debug!(%address, name, "No config file configured, keeping placeholder");
                return;
            }
            InitialValue::ConfigFile(Some(path)) => match bridge::read_encoded(path).await {
                Ok(mut encoded) => {
                    let original_len = encoded.len();
                    if bridge::truncate_payload(&mut encoded) {
                        tracing::warn!(
                            %address,
                            path = %path.display(),
                            original_len,
                            limit = bridge::MAX_ENCODED_PAYLOAD,
                            "Config payload too large for edge-core, truncating"
                        );
                        summary.truncated.push(address);
                    }
                    encoded
                }
                Err(e) => {
                    tracing::error!(%address, name, error = %e, "Could not read config file");
                    return;
                }
            },
        };

        match self.write_value(&entry.registration.with_value(value)).await {
            Ok(()) => summary.values_written += 1,
            Err(e) => {
                tracing::error!(%address, error = %e, "Failed to write resource value");
                summary.failed_writes.push(address);
            }
        }
    }

    async fn add_resource(&self, descriptor: &ResourceDescriptor) -> Result<(), AgentError> {
        let response = self
            .channel
            .call(METHOD_ADD_RESOURCE, descriptor.to_params())
            .await
            .map_err(|source| AgentError::Registration {
                address: descriptor.address,
                source,
            })?;
        tracing::debug!(%response, "{METHOD_ADD_RESOURCE} response");
        tracing::info!(address = %descriptor.address, "LWM2M resource added");
        Ok(())
    }

    async fn write_value(&self, descriptor: &ResourceDescriptor) -> Result<(), RpcError> {
        let response = self
            .channel
            .call(METHOD_WRITE_RESOURCE_VALUE, descriptor.to_params())
            .await?;
        tracing::debug!(%response, "{METHOD_WRITE_RESOURCE_VALUE} response");
        tracing::info!(address = %descriptor.address, "LWM2M resource value written");
        Ok(())
    }
}
