//! # dualgraph-rs: Dual-Graph Export of Hierarchical Building Models
//!
//! Walks the object hierarchy of a building model from a root and exports it
//! to a property graph store as two complementary views:
//!
//! - the **logical graph**: containment (`CONTAINS`) between logical
//!   elements such as collections, levels and rooms, down to the geometry
//!   they hold;
//! - the **geometry graph**: spatial adjacency (`CONNECTED_TO`) between
//!   every pair of geometry elements whose closed meshes collide.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `ObjectSource` in, `GraphSink` out; the core knows
//!    neither transport nor store
//! 2. **DAG, not tree**: every object is visited once by application id, no
//!    matter how many parents reference it
//! 3. **Failures are data**: a bad object lands in the `FailureReport`, it
//!    never aborts the run
//! 4. **One collision world**: all meshes are indexed once and queried in bulk
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dualgraph::{MemorySink, Pipeline, PipelineConfig};
//! use dualgraph::source::load_json_path;
//!
//! # async fn example() -> dualgraph::Result<()> {
//! let doc = load_json_path("model.json")?;
//! let sink = MemorySink::new();
//!
//! let report = Pipeline::new(PipelineConfig::default())
//!     .run(&doc.source, "site-root", &sink)
//!     .await?;
//!
//! println!("{} failures", report.failures.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Sinks
//!
//! | Sink | Description |
//! |------|-------------|
//! | `MemorySink` | In-memory property graph for tests and embedding |
//! | `CypherSink` | `MERGE` script for Neo4j-compatible stores |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod failure;
pub mod source;
pub mod traverse;
pub mod graph;
pub mod intersect;
pub mod sink;
pub mod tx;
pub mod config;
pub mod pipeline;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    ApplicationId, RawObject, RawMesh, Mesh, Aabb,
    LogicalNode, GeometryNode, TypedNode,
    Node, Relationship, Value, PropertyMap,
    NodeId, RelId, Direction, ContainsEdge, ConnectedPair,
    CONTAINS, CONNECTED_TO,
};

// ============================================================================
// Re-exports: Stages
// ============================================================================

pub use failure::{FailureKind, FailureRecord, FailureReport, ProcessingError};
pub use source::{ObjectSource, MemorySource};
pub use traverse::{traverse, traverse_parallel, classify, CancelFlag, Traversal, TraversalStats};
pub use graph::{
    assemble, BuildOutput, GeometryGraph, GeometryRegistry, GraphBuilder, LogicalGraph,
};
pub use intersect::{find_intersections, IntersectionOptions, IntersectionOutcome, IntersectionStats};

// ============================================================================
// Re-exports: Sinks, transactions, pipeline
// ============================================================================

pub use sink::{GraphSink, SinkConfig, MemorySink, CypherSink, WriteOptions};
pub use tx::{Transaction, TxMode, TxId};
pub use config::PipelineConfig;
pub use pipeline::{Pipeline, RunReport, PipelineStats, Stage};

// ============================================================================
// Error Types
// ============================================================================

/// Run-level errors. Anything that only concerns one object is a
/// [`ProcessingError`] in the [`FailureReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Source error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
