//! Relationships: store DTOs plus the two edge kinds the exporter produces.

use serde::{Deserialize, Serialize};
use super::{ApplicationId, NodeId, PropertyMap};

/// Containment, directed parent → child.
pub const CONTAINS: &str = "CONTAINS";

/// Spatial adjacency, logically undirected.
pub const CONNECTED_TO: &str = "CONNECTED_TO";

/// Marker property on CONNECTED_TO relationships: one stored direction
/// (smaller id → larger id) stands for both.
pub const UNDIRECTED_PROPERTY: &str = "undirected";

/// Opaque relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelId(pub u64);

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A persisted relationship (directed edge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelId,
    pub src: NodeId,
    pub dst: NodeId,
    pub rel_type: String,
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(id: RelId, src: NodeId, dst: NodeId, rel_type: impl Into<String>) -> Self {
        Self {
            id,
            src,
            dst,
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
        }
    }

    /// The "other" end of the relationship from the given node.
    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.src { Some(self.dst) }
        else if from == self.dst { Some(self.src) }
        else { None }
    }
}

/// CONTAINS edge against ids, not live objects.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainsEdge {
    pub parent: ApplicationId,
    pub child: ApplicationId,
}

impl ContainsEdge {
    pub fn new(parent: impl Into<ApplicationId>, child: impl Into<ApplicationId>) -> Self {
        Self { parent: parent.into(), child: child.into() }
    }
}

/// Unordered CONNECTED_TO pair, stored with the smaller id first.
///
/// Construction is the only way to get one, so `(a, b)` and `(b, a)` are the
/// same value and `(a, a)` cannot exist.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectedPair {
    low: ApplicationId,
    high: ApplicationId,
}

impl ConnectedPair {
    /// Canonical pair, `None` for a self-pair.
    pub fn new(a: impl Into<ApplicationId>, b: impl Into<ApplicationId>) -> Option<Self> {
        let (a, b) = (a.into(), b.into());
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> &ApplicationId {
        &self.low
    }

    pub fn high(&self) -> &ApplicationId {
        &self.high
    }

    pub fn contains(&self, id: &ApplicationId) -> bool {
        &self.low == id || &self.high == id
    }

    pub fn other(&self, id: &ApplicationId) -> Option<&ApplicationId> {
        if &self.low == id { Some(&self.high) }
        else if &self.high == id { Some(&self.low) }
        else { None }
    }
}
