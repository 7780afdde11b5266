use std::fmt;
use std::path::PathBuf;

use crate::bridge;
use crate::config::{EdgeResource, ResourceManagerConfig};

/// Value type every resource is registered with.
pub const STRING_TYPE: &str = "string";

/// Placeholder registered for the config resource before the file is read.
pub const CONFIG_PLACEHOLDER: &str = "Config";

/// LWM2M object/instance/resource triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    pub object_id: u32,
    pub object_instance_id: u32,
    pub resource_id: u32,
}

impl ResourceAddress {
    pub fn new(object_id: u32, object_instance_id: u32, resource_id: u32) -> Self {
        Self {
            object_id,
            object_instance_id,
            resource_id,
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.object_id, self.object_instance_id, self.resource_id
        )
    }
}

/// The fixed set of resources exposed for every edge capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Resource 1: capability name.
    Name,
    /// Resource 2: enable flag, `"1"` or `"0"`.
    Enable,
    /// Resource 3: base64 config file contents.
    Config,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Name, ResourceKind::Enable, ResourceKind::Config];

    pub fn resource_id(self) -> u32 {
        match self {
            ResourceKind::Name => 1,
            ResourceKind::Enable => 2,
            ResourceKind::Config => 3,
        }
    }

    pub fn from_resource_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(ResourceKind::Name),
            2 => Some(ResourceKind::Enable),
            3 => Some(ResourceKind::Config),
            _ => None,
        }
    }

    /// Operations declared to edge-core when the resource is registered.
    pub fn registration_operations(self) -> Operations {
        match self {
            ResourceKind::Name | ResourceKind::Enable => Operations::READ,
            ResourceKind::Config => Operations::READ_WRITE,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Name => write!(f, "name"),
            ResourceKind::Enable => write!(f, "enable"),
            ResourceKind::Config => write!(f, "config"),
        }
    }
}

/// LWM2M operation mask as understood by edge-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operations(u8);

impl Operations {
    pub const READ: Operations = Operations(0x01);
    pub const WRITE: Operations = Operations(0x02);
    pub const READ_WRITE: Operations = Operations(0x03);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn allows_write(self) -> bool {
        self.0 & Self::WRITE.0 != 0
    }
}

/// A single resource as sent in `add_resource` / `write_resource_value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub address: ResourceAddress,
    pub operations: Operations,
    pub value_type: &'static str,
    pub value: String,
}

impl ResourceDescriptor {
    /// Descriptor for a value write at the same address. Value writes always
    /// carry the read-write mask.
    pub fn with_value(&self, value: String) -> Self {
        Self {
            address: self.address,
            operations: Operations::READ_WRITE,
            value_type: self.value_type,
            value,
        }
    }

    /// JSON-RPC params shared by `add_resource` and `write_resource_value`.
    pub fn to_params(&self) -> serde_json::Value {
        serde_json::json!({
            "objects": [{
                "objectId": self.address.object_id,
                "objectInstances": [{
                    "objectInstanceId": self.address.object_instance_id,
                    "resources": [{
                        "resourceId": self.address.resource_id,
                        "operations": self.operations.bits(),
                        "type": self.value_type,
                        "value": self.value,
                    }]
                }]
            }]
        })
    }
}

/// What gets written once a resource has been registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialValue {
    /// Already transport-encoded value.
    Encoded(String),
    /// Contents of a local file, read and encoded at registration time.
    ConfigFile(Option<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct ResourceEntry {
    pub kind: ResourceKind,
    pub registration: ResourceDescriptor,
    pub initial_value: InitialValue,
}

/// All resources belonging to one configured edge capability.
#[derive(Debug, Clone)]
pub struct ResourceInstance {
    pub instance_id: u32,
    pub resource: EdgeResource,
    pub entries: Vec<ResourceEntry>,
}

impl ResourceInstance {
    pub fn entry(&self, kind: ResourceKind) -> Option<&ResourceEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }
}

/// The registered address space, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct ResourceTree {
    object_id: u32,
    instances: Vec<ResourceInstance>,
}

impl ResourceTree {
    pub fn build(config: &ResourceManagerConfig) -> Self {
        Self::from_resources(config.object_id(), &config.edge_resources)
    }

    /// Assign instance ids `0..N` in configuration order.
    pub fn from_resources(object_id: u32, resources: &[EdgeResource]) -> Self {
        let instances = resources
            .iter()
            .zip(0u32..)
            .map(|(resource, instance_id)| ResourceInstance {
                instance_id,
                resource: resource.clone(),
                entries: ResourceKind::ALL
                    .iter()
                    .map(|&kind| build_entry(object_id, instance_id, resource, kind))
                    .collect(),
            })
            .collect();

        Self {
            object_id,
            instances,
        }
    }

    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    pub fn instances(&self) -> &[ResourceInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Find the configured resource at an exact address.
    pub fn lookup(&self, address: ResourceAddress) -> Option<(&ResourceInstance, ResourceKind)> {
        if address.object_id != self.object_id {
            return None;
        }
        let kind = ResourceKind::from_resource_id(address.resource_id)?;
        let instance = self
            .instances
            .get(usize::try_from(address.object_instance_id).ok()?)?;
        Some((instance, kind))
    }
}

fn build_entry(
    object_id: u32,
    instance_id: u32,
    resource: &EdgeResource,
    kind: ResourceKind,
) -> ResourceEntry {
    let (value, initial_value) = match kind {
        ResourceKind::Name => (
            resource.name.clone(),
            InitialValue::Encoded(bridge::encode(resource.name.as_bytes())),
        ),
        ResourceKind::Enable => {
            let flag = if resource.enable { "1" } else { "0" };
            (
                flag.to_string(),
                InitialValue::Encoded(bridge::encode(flag.as_bytes())),
            )
        }
        ResourceKind::Config => (
            CONFIG_PLACEHOLDER.to_string(),
            InitialValue::ConfigFile(resource.config_file_path.clone()),
        ),
    };

    ResourceEntry {
        kind,
        registration: ResourceDescriptor {
            address: ResourceAddress::new(object_id, instance_id, kind.resource_id()),
            operations: kind.registration_operations(),
            value_type: STRING_TYPE,
            value,
        },
        initial_value,
    }
}
