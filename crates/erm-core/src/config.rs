use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AgentError;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/edge.sock";
pub const DEFAULT_API_PATH: &str = "/1/grm";
pub const DEFAULT_REGISTRATION_NAME: &str = "edge_resource_manager";

/// Top-level configuration document.
///
/// Older deployments ship this as YAML (`izuma-base-config.yaml`); TOML is
/// accepted as well when the file extension says so.
#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub edge_capabilities: Option<ResourceManagerConfig>,
    #[serde(default)]
    pub config_end: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceManagerConfig {
    #[serde(rename = "edge_core_socketpath", default = "default_socket_path")]
    pub edge_core_socket_path: PathBuf,
    #[serde(default = "default_api_path")]
    pub edge_core_api_path: String,
    #[serde(default = "default_registration_name")]
    pub registration_name: String,
    #[serde(rename = "lwm2m_objectid", default)]
    pub config_object_id: i64,
    #[serde(default)]
    pub edge_resources: Vec<EdgeResource>,
    /// Answer every correlated peer request, including the ones edge-core
    /// historically never got a reply for.
    #[serde(default)]
    pub strict_responses: bool,
}

/// One configured edge capability. Its position in `edge_resources` is its
/// LWM2M object instance id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EdgeResource {
    pub name: String,
    #[serde(default)]
    pub enable: bool,
    #[serde(rename = "config_filepath", default)]
    pub config_file_path: Option<PathBuf>,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}
fn default_api_path() -> String {
    DEFAULT_API_PATH.into()
}
fn default_registration_name() -> String {
    DEFAULT_REGISTRATION_NAME.into()
}

impl AgentConfig {
    pub fn from_file(path: &Path) -> Result<Self, AgentError> {
        tracing::info!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            _ => Self::from_yaml(&content)?,
        };

        if !config.config_end {
            tracing::warn!(
                path = %path.display(),
                "Did not see a \"config_end: true\" statement at end, possible bad parse"
            );
        }
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, AgentError> {
        serde_yaml::from_str(content)
            .map_err(|e| AgentError::Config(format!("failed to parse config: {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self, AgentError> {
        toml::from_str(content)
            .map_err(|e| AgentError::Config(format!("failed to parse config: {e}")))
    }

    /// Extract the `edge_capabilities` section and validate it.
    pub fn into_resource_manager(self) -> Result<ResourceManagerConfig, AgentError> {
        self.edge_capabilities
            .ok_or_else(|| AgentError::Config("no edge_capabilities section provided".into()))?
            .validated()
    }
}

impl ResourceManagerConfig {
    /// Fill in defaults for blank values and reject configurations the agent
    /// cannot run with.
    pub fn validated(mut self) -> Result<Self, AgentError> {
        if self.edge_core_socket_path.as_os_str().is_empty() {
            tracing::warn!(
                default = DEFAULT_SOCKET_PATH,
                "edge_core_socketpath not provided, using default"
            );
            self.edge_core_socket_path = default_socket_path();
        }
        if self.edge_core_api_path.is_empty() {
            self.edge_core_api_path = default_api_path();
        }
        if self.edge_resources.is_empty() {
            return Err(AgentError::Config("no edge resources provided".into()));
        }
        if self.config_object_id <= 0 {
            return Err(AgentError::Config("lwm2m_objectid not provided".into()));
        }
        if self.config_object_id > i64::from(u16::MAX) {
            return Err(AgentError::Config(format!(
                "lwm2m_objectid {} is out of range",
                self.config_object_id
            )));
        }

        for resource in &mut self.edge_resources {
            if resource
                .config_file_path
                .as_ref()
                .is_some_and(|p| p.as_os_str().is_empty())
            {
                resource.config_file_path = None;
            }
        }
        Ok(self)
    }

    /// The LWM2M object id all resources are registered under.
    ///
    /// Only meaningful after [`validated`](Self::validated).
    pub fn object_id(&self) -> u32 {
        u32::try_from(self.config_object_id).unwrap_or_default()
    }
}
