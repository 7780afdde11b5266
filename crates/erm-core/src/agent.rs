use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::ResourceManagerConfig;
use crate::dispatch::DispatchLoop;
use crate::error::AgentError;
use crate::registrar::{RegistrationSummary, Registrar};
use crate::rpc::{PeerRequest, RpcChannel};
use crate::tree::ResourceTree;

/// Owns one run of the agent: announce, register the tree, then serve writes.
pub struct ResourceManager {
    config: ResourceManagerConfig,
    tree: Arc<ResourceTree>,
    channel: Arc<dyn RpcChannel>,
}

impl ResourceManager {
    pub fn new(
        config: ResourceManagerConfig,
        channel: Arc<dyn RpcChannel>,
    ) -> Result<Self, AgentError> {
        let config = config.validated()?;
        let tree = Arc::new(ResourceTree::build(&config));
        Ok(Self {
            config,
            tree,
            channel,
        })
    }

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    /// Announce and register. Only a failed announce is an error.
    pub async fn register(&self) -> Result<RegistrationSummary, AgentError> {
        let registrar = Registrar::new(self.channel.clone(), self.tree.clone());
        registrar.announce(&self.config.registration_name).await?;

        let summary = registrar.register_all().await;
        tracing::info!(
            registered = summary.registered.len(),
            failed = summary.failed.len(),
            values_written = summary.values_written,
            truncated = summary.truncated.len(),
            "Resource registration finished"
        );
        Ok(summary)
    }

    /// Register, then process peer requests until the stream ends.
    ///
    /// Dispatch starts regardless of how many registrations failed.
    pub async fn run(&self, requests: mpsc::Receiver<PeerRequest>) -> Result<(), AgentError> {
        self.register().await?;
        DispatchLoop::new(
            self.channel.clone(),
            self.tree.clone(),
            self.config.strict_responses,
        )
        .run(requests)
        .await
    }
}
