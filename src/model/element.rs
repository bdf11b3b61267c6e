//! Typed nodes emitted by the traverser.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{ApplicationId, Mesh, PropertyMap};

/// Child id list; most containers hold a handful of children.
pub type ChildIds = SmallVec<[ApplicationId; 4]>;

/// Organizational / containment element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalNode {
    pub id: ApplicationId,
    pub name: String,
    pub type_name: String,
    /// Child ids in source order. Empty for leaves.
    pub children: ChildIds,
    /// Flattened source parameters.
    pub properties: PropertyMap,
}

impl LogicalNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Element carrying a mesh usable for collision testing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryNode {
    pub id: ApplicationId,
    pub name: String,
    pub type_name: String,
    pub mesh: Mesh,
}

/// One element of the traversal output. Exactly one variant per object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedNode {
    Logical(LogicalNode),
    Geometry(GeometryNode),
}

impl TypedNode {
    pub fn id(&self) -> &ApplicationId {
        match self {
            TypedNode::Logical(n) => &n.id,
            TypedNode::Geometry(n) => &n.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TypedNode::Logical(n) => &n.name,
            TypedNode::Geometry(n) => &n.name,
        }
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self, TypedNode::Geometry(_))
    }
}
