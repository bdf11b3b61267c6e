//! # Model
//!
//! Plain data shared by every stage: source objects, typed traversal output,
//! meshes, and the node/relationship DTOs a sink persists.
//!
//! Design rule: this module is pure data. No I/O, no state, no async.

pub mod id;
pub mod raw;
pub mod mesh;
pub mod element;
pub mod node;
pub mod relationship;
pub mod value;
pub mod property_map;

pub use id::ApplicationId;
pub use raw::{RawObject, RawMesh};
pub use mesh::{Aabb, Mesh, MeshDefect};
pub use element::{ChildIds, LogicalNode, GeometryNode, TypedNode};
pub use node::{Node, NodeId, ID_PROPERTY};
pub use relationship::{
    Relationship, RelId, Direction, ContainsEdge, ConnectedPair,
    CONTAINS, CONNECTED_TO, UNDIRECTED_PROPERTY,
};
pub use value::Value;
pub use property_map::{PropertyMap, flatten_parameters};
