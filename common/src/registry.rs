use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on registry entries, independent of the addressable slot range.
pub const MAX_NODES: usize = 24;

pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

pub type NodeId = u16;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub voltage: f32,
    pub current: f32,
    pub relay: bool,
    pub online: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("node id {0} already exists")]
    DuplicateId(NodeId),
    #[error("registry is full ({MAX_NODES} nodes)")]
    CapacityExceeded,
    #[error("node id {0} not found")]
    NotFound(NodeId),
    #[error("node id {0} is taken by another entry")]
    IdCollision(NodeId),
    #[error("node id must be positive")]
    InvalidId,
}

/// Result of feeding an inbound telemetry report into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryUpdate {
    Updated,
    /// Unknown sender was admitted with a default label. Any radio peer can
    /// create an entry this way; the link carries no authentication.
    AutoAdded,
    /// Unknown sender and the registry is at capacity.
    Dropped,
}

#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
    next_id: NodeId,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            next_id: 1,
        }
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn next_id(&self) -> NodeId {
        self.next_id
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn find(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.find(id).map(|index| &self.nodes[index])
    }

    pub fn by_index(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn add(&mut self, id: NodeId, label: &str, relay: bool) -> Result<(), RegistryError> {
        if id == 0 {
            return Err(RegistryError::InvalidId);
        }
        if self.find(id).is_some() {
            return Err(RegistryError::DuplicateId(id));
        }
        if self.nodes.len() >= MAX_NODES {
            return Err(RegistryError::CapacityExceeded);
        }
        self.nodes.push(Node {
            id,
            label: label.to_string(),
            voltage: 0.0,
            current: 0.0,
            relay,
            online: true,
        });
        self.bump_next_id(id);
        Ok(())
    }

    pub fn auto_add(&mut self, label: &str) -> Result<NodeId, RegistryError> {
        let id = self.next_id;
        self.add(id, label, false)?;
        Ok(id)
    }

    /// Compacts the remaining entries, preserving their relative order.
    pub fn remove(&mut self, id: NodeId) -> Result<(), RegistryError> {
        let index = self.find(id).ok_or(RegistryError::NotFound(id))?;
        self.nodes.remove(index);
        Ok(())
    }

    pub fn update_telemetry(
        &mut self,
        id: NodeId,
        voltage: f32,
        current: f32,
        relay: bool,
    ) -> TelemetryUpdate {
        if id == 0 {
            return TelemetryUpdate::Dropped;
        }
        if let Some(index) = self.find(id) {
            let node = &mut self.nodes[index];
            node.voltage = voltage;
            node.current = current;
            node.relay = relay;
            node.online = true;
            return TelemetryUpdate::Updated;
        }
        if self.nodes.len() >= MAX_NODES {
            return TelemetryUpdate::Dropped;
        }
        self.nodes.push(Node {
            id,
            label: format!("Node {id}"),
            voltage,
            current,
            relay,
            online: true,
        });
        self.bump_next_id(id);
        TelemetryUpdate::AutoAdded
    }

    /// Returns `Some((old_id, new_id))` when the id actually changed so the
    /// caller can remap slot occupancy.
    pub fn edit(
        &mut self,
        id: NodeId,
        new_id: Option<NodeId>,
        new_label: Option<&str>,
    ) -> Result<Option<(NodeId, NodeId)>, RegistryError> {
        let index = self.find(id).ok_or(RegistryError::NotFound(id))?;

        let target_id = new_id.unwrap_or(id);
        if target_id == 0 {
            return Err(RegistryError::InvalidId);
        }
        if target_id != id && self.find(target_id).is_some() {
            return Err(RegistryError::IdCollision(target_id));
        }

        let node = &mut self.nodes[index];
        if let Some(label) = new_label {
            if !label.is_empty() {
                node.label = label.to_string();
            }
        }
        node.id = target_id;
        self.bump_next_id(target_id);

        if target_id != id {
            Ok(Some((id, target_id)))
        } else {
            Ok(None)
        }
    }

    pub fn to_file(&self) -> RegistryFile {
        RegistryFile {
            version: REGISTRY_SCHEMA_VERSION,
            next_id: self.next_id,
            entries: self
                .nodes
                .iter()
                .map(|node| NodeRecord {
                    id: node.id,
                    label: node.label.clone(),
                    voltage: node.voltage,
                    current: node.current,
                    relay: node.relay,
                })
                .collect(),
        }
    }

    pub fn from_file(file: &RegistryFile) -> Self {
        let mut registry = Self::new();
        registry.next_id = file.next_id.max(1);
        for record in file.entries.iter().take(MAX_NODES) {
            if record.id == 0 || registry.find(record.id).is_some() {
                continue;
            }
            registry.nodes.push(Node {
                id: record.id,
                label: record.label.clone(),
                voltage: record.voltage,
                current: record.current,
                relay: record.relay,
                online: true,
            });
            registry.bump_next_id(record.id);
        }
        registry
    }

    pub(crate) fn node_mut(&mut self, index: usize) -> &mut Node {
        &mut self.nodes[index]
    }

    fn bump_next_id(&mut self, id: NodeId) {
        if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub label: String,
    pub voltage: f32,
    pub current: f32,
    pub relay: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFile {
    pub version: u32,
    #[serde(rename = "nextId")]
    pub next_id: NodeId,
    pub entries: Vec<NodeRecord>,
}

impl Default for RegistryFile {
    fn default() -> Self {
        Self {
            version: REGISTRY_SCHEMA_VERSION,
            next_id: 1,
            entries: Vec::new(),
        }
    }
}
