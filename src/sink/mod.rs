//! # Graph Sink
//!
//! The contract between the exporter and whatever property graph store
//! receives the two views.
//!
//! ## Implementations
//!
//! | Sink | Module | Description |
//! |------|--------|-------------|
//! | `MemorySink` | `memory` | In-memory property graph for tests and embedding |
//! | `CypherSink` | `cypher` | Renders `MERGE` statements into a script |
//!
//! ## Persisted shape
//!
//! ```text
//! (:LogicalNode  {id, name, type, ..parameters}) -[:CONTAINS]->     (child)
//! (:GeometryNode {id, name})                     -[:CONNECTED_TO {undirected: true}]-> (:GeometryNode)
//! ```
//!
//! Nodes are merged on their `id` property, so re-writing the same snapshot
//! leaves the store unchanged.

pub mod memory;
pub mod cypher;

use std::fs::File;
use std::io::BufWriter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::graph::{GeometryGraph, LogicalGraph};
use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::Result;

pub use memory::MemorySink;
pub use cypher::CypherSink;

/// Default label of logical nodes.
pub const LOGICAL_LABEL: &str = "LogicalNode";

/// Default label of geometry nodes.
pub const GEOMETRY_LABEL: &str = "GeometryNode";

/// Property key for the node name.
pub const NAME_PROPERTY: &str = "name";

/// Property key for the source type name of logical nodes.
pub const TYPE_PROPERTY: &str = "type";

// ============================================================================
// Write options / stats
// ============================================================================

/// How the two views are mapped onto labels and properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub logical_label: String,
    pub geometry_label: String,
    /// Add flattened source parameters to logical nodes.
    pub include_parameters: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            logical_label: LOGICAL_LABEL.into(),
            geometry_label: GEOMETRY_LABEL.into(),
            include_parameters: false,
        }
    }
}

/// What one write call staged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteStats {
    pub nodes: u64,
    pub relationships: u64,
}

impl std::ops::AddAssign for WriteStats {
    fn add_assign(&mut self, other: Self) {
        self.nodes += other.nodes;
        self.relationships += other.relationships;
    }
}

/// Properties persisted for a logical node.
///
/// Parameters go in first so they can never shadow `id`, `name` or `type`.
pub fn logical_properties(node: &LogicalNode, include_parameters: bool) -> PropertyMap {
    let mut props = if include_parameters { node.properties.clone() } else { PropertyMap::new() };
    props.insert(ID_PROPERTY.into(), Value::from(node.id.as_str()));
    props.insert(NAME_PROPERTY.into(), Value::from(node.name.as_str()));
    props.insert(TYPE_PROPERTY.into(), Value::from(node.type_name.as_str()));
    props
}

/// Properties persisted for a geometry node.
pub fn geometry_properties(id: &ApplicationId, name: &str) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(ID_PROPERTY.into(), Value::from(id.as_str()));
    props.insert(NAME_PROPERTY.into(), Value::from(name));
    props
}

// ============================================================================
// GraphSink trait
// ============================================================================

/// The universal sink contract.
///
/// Relationship endpoints are application ids; the sink resolves them to its
/// own node identities when the transaction commits, so nodes and
/// relationships may be staged in any order within one transaction.
#[async_trait]
pub trait GraphSink: Send + Sync {
    /// The transaction type for this sink.
    type Tx: Transaction;

    // ========================================================================
    // Transactions
    // ========================================================================

    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Apply every staged write, or none of them.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Discard every staged write.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create or update the node whose `id` property matches `props["id"]`,
    /// adding `label` to it.
    async fn merge_node(&self, tx: &mut Self::Tx, label: &str, props: PropertyMap) -> Result<()>;

    /// Create or update the `rel_type` relationship from `src` to `dst`.
    async fn create_relationship(
        &self,
        tx: &mut Self::Tx,
        src: &ApplicationId,
        dst: &ApplicationId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<()>;

    // ========================================================================
    // Provided
    // ========================================================================

    /// Stage every logical node and CONTAINS edge.
    async fn write_logical_graph(
        &self,
        tx: &mut Self::Tx,
        graph: &LogicalGraph,
        options: &WriteOptions,
    ) -> Result<WriteStats> {
        let mut stats = WriteStats::default();
        for node in graph.nodes() {
            let props = logical_properties(node, options.include_parameters);
            self.merge_node(tx, &options.logical_label, props).await?;
            stats.nodes += 1;
        }
        for edge in graph.edges() {
            self.create_relationship(tx, &edge.parent, &edge.child, CONTAINS, PropertyMap::new())
                .await?;
            stats.relationships += 1;
        }
        tracing::debug!(nodes = stats.nodes, relationships = stats.relationships, "staged logical graph");
        Ok(stats)
    }

    /// Stage every geometry node and one CONNECTED_TO edge per pair,
    /// directed from the smaller id to the larger.
    async fn write_geometry_graph(
        &self,
        tx: &mut Self::Tx,
        graph: &GeometryGraph,
        options: &WriteOptions,
    ) -> Result<WriteStats> {
        let mut stats = WriteStats::default();
        for node in graph.nodes() {
            let props = geometry_properties(&node.id, &node.name);
            self.merge_node(tx, &options.geometry_label, props).await?;
            stats.nodes += 1;
        }
        for pair in graph.edges() {
            let mut props = PropertyMap::new();
            props.insert(UNDIRECTED_PROPERTY.into(), Value::Bool(true));
            self.create_relationship(tx, pair.low(), pair.high(), CONNECTED_TO, props).await?;
            stats.relationships += 1;
        }
        tracing::debug!(nodes = stats.nodes, relationships = stats.relationships, "staged geometry graph");
        Ok(stats)
    }
}

// ============================================================================
// Sink configuration
// ============================================================================

/// Which sink to open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// In-memory property graph (no persistence)
    #[default]
    Memory,

    /// Cypher script written to a file
    CypherScript { path: std::path::PathBuf },
}

impl SinkConfig {
    pub fn open(&self) -> Result<OpenedSink> {
        match self {
            SinkConfig::Memory => Ok(OpenedSink::Memory(MemorySink::new())),
            SinkConfig::CypherScript { path } => {
                let file = File::create(path)?;
                tracing::info!(path = %path.display(), "writing Cypher script");
                Ok(OpenedSink::CypherScript(CypherSink::new(BufWriter::new(file))))
            }
        }
    }
}

/// A sink chosen at runtime from a [`SinkConfig`].
pub enum OpenedSink {
    Memory(MemorySink),
    CypherScript(CypherSink<BufWriter<File>>),
}

impl OpenedSink {
    pub fn as_memory(&self) -> Option<&MemorySink> {
        match self {
            OpenedSink::Memory(sink) => Some(sink),
            OpenedSink::CypherScript(_) => None,
        }
    }
}

/// Transaction of an [`OpenedSink`].
pub enum OpenedTx {
    Memory(memory::MemoryTx),
    CypherScript(cypher::CypherTx),
}

impl Transaction for OpenedTx {
    fn mode(&self) -> TxMode {
        match self {
            OpenedTx::Memory(tx) => tx.mode(),
            OpenedTx::CypherScript(tx) => tx.mode(),
        }
    }

    fn id(&self) -> TxId {
        match self {
            OpenedTx::Memory(tx) => tx.id(),
            OpenedTx::CypherScript(tx) => tx.id(),
        }
    }

    fn pending(&self) -> usize {
        match self {
            OpenedTx::Memory(tx) => tx.pending(),
            OpenedTx::CypherScript(tx) => tx.pending(),
        }
    }
}

fn mismatched() -> crate::Error {
    crate::Error::TxError("transaction belongs to a different sink".into())
}

#[async_trait]
impl GraphSink for OpenedSink {
    type Tx = OpenedTx;

    async fn begin_tx(&self, mode: TxMode) -> Result<OpenedTx> {
        Ok(match self {
            OpenedSink::Memory(sink) => OpenedTx::Memory(sink.begin_tx(mode).await?),
            OpenedSink::CypherScript(sink) => OpenedTx::CypherScript(sink.begin_tx(mode).await?),
        })
    }

    async fn commit_tx(&self, tx: OpenedTx) -> Result<()> {
        match (self, tx) {
            (OpenedSink::Memory(sink), OpenedTx::Memory(tx)) => sink.commit_tx(tx).await,
            (OpenedSink::CypherScript(sink), OpenedTx::CypherScript(tx)) => sink.commit_tx(tx).await,
            _ => Err(mismatched()),
        }
    }

    async fn rollback_tx(&self, tx: OpenedTx) -> Result<()> {
        match (self, tx) {
            (OpenedSink::Memory(sink), OpenedTx::Memory(tx)) => sink.rollback_tx(tx).await,
            (OpenedSink::CypherScript(sink), OpenedTx::CypherScript(tx)) => sink.rollback_tx(tx).await,
            _ => Err(mismatched()),
        }
    }

    async fn merge_node(&self, tx: &mut OpenedTx, label: &str, props: PropertyMap) -> Result<()> {
        match (self, tx) {
            (OpenedSink::Memory(sink), OpenedTx::Memory(tx)) => sink.merge_node(tx, label, props).await,
            (OpenedSink::CypherScript(sink), OpenedTx::CypherScript(tx)) => {
                sink.merge_node(tx, label, props).await
            }
            _ => Err(mismatched()),
        }
    }

    async fn create_relationship(
        &self,
        tx: &mut OpenedTx,
        src: &ApplicationId,
        dst: &ApplicationId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<()> {
        match (self, tx) {
            (OpenedSink::Memory(sink), OpenedTx::Memory(tx)) => {
                sink.create_relationship(tx, src, dst, rel_type, props).await
            }
            (OpenedSink::CypherScript(sink), OpenedTx::CypherScript(tx)) => {
                sink.create_relationship(tx, src, dst, rel_type, props).await
            }
            _ => Err(mismatched()),
        }
    }
}
