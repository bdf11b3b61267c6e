//! Node as stored by a graph sink.

use serde::{Deserialize, Serialize};
use super::{PropertyMap, Value};

/// Property key holding the application id on every persisted node.
pub const ID_PROPERTY: &str = "id";

/// Opaque store-assigned node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted node: labels plus properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: Vec::new(),
            properties: PropertyMap::new(),
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Application id this node was merged on, if any.
    pub fn app_id(&self) -> Option<&str> {
        self.get(ID_PROPERTY).and_then(Value::as_str)
    }
}
