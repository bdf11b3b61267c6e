//! In-memory graph sink.
//!
//! The reference implementation of `GraphSink`: a small property graph held
//! in HashMaps behind one `RwLock`, with a label index, an application-id
//! index and per-node relationship adjacency.
//!
//! Writes are staged on the `MemoryTx` and applied on commit under the write
//! lock, so readers see either none or all of a transaction.
//! Rollback just drops the staged batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};
use super::GraphSink;

// ============================================================================
// MemorySink
// ============================================================================

/// In-memory property graph.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    state: RwLock<MemoryState>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
    next_tx_id: AtomicU64,
}

/// Every map sits behind the one lock, so there is no lock order to get wrong.
#[derive(Default)]
struct MemoryState {
    nodes: HashMap<NodeId, Node>,
    relationships: HashMap<RelId, Relationship>,
    /// node_id → list of relationship IDs
    adjacency: HashMap<NodeId, Vec<RelId>>,
    /// label → node IDs
    label_index: HashMap<String, Vec<NodeId>>,
    /// application id → node ID
    app_index: HashMap<ApplicationId, NodeId>,
}

impl MemoryState {
    fn relationships_of(
        &self,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> impl Iterator<Item = &Relationship> + '_ {
        let rel_type = rel_type.map(str::to_owned);
        self.adjacency
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.relationships.get(rid))
            .filter(move |rel| match dir {
                Direction::Outgoing => rel.src == node,
                Direction::Incoming => rel.dst == node,
                Direction::Both => true,
            })
            .filter(move |rel| rel_type.as_deref().is_none_or(|t| rel.rel_type == t))
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Reads (committed state only)
    // ========================================================================

    pub fn node_count(&self) -> usize {
        self.inner.state.read().nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.inner.state.read().relationships.len()
    }

    pub fn node(&self, id: NodeId) -> Option<Node> {
        self.inner.state.read().nodes.get(&id).cloned()
    }

    pub fn node_by_app_id(&self, id: &str) -> Option<Node> {
        let state = self.inner.state.read();
        let node_id = state.app_index.get(id)?;
        state.nodes.get(node_id).cloned()
    }

    pub fn nodes_by_label(&self, label: &str) -> Vec<Node> {
        let state = self.inner.state.read();
        state
            .label_index
            .get(label)
            .map(|ids| ids.iter().filter_map(|id| state.nodes.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .inner
            .state
            .read()
            .label_index
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(label, _)| label.clone())
            .collect();
        labels.sort();
        labels
    }

    pub fn relationships_by_type(&self, rel_type: &str) -> Vec<Relationship> {
        let mut rels: Vec<Relationship> = self
            .inner
            .state
            .read()
            .relationships
            .values()
            .filter(|r| r.rel_type == rel_type)
            .cloned()
            .collect();
        rels.sort_by_key(|r| r.id.0);
        rels
    }

    /// All relationships of a node, optionally filtered by direction and type.
    pub fn get_relationships(
        &self,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Vec<Relationship> {
        let state = self.inner.state.read();
        state.relationships_of(node, dir, rel_type).cloned().collect()
    }

    /// Application ids at the other end of `node`'s relationships.
    pub fn neighbours(&self, app_id: &str, dir: Direction, rel_type: Option<&str>) -> Vec<ApplicationId> {
        let state = self.inner.state.read();
        let Some(&node) = state.app_index.get(app_id) else {
            return Vec::new();
        };
        let mut out: Vec<ApplicationId> = state
            .relationships_of(node, dir, rel_type)
            .filter_map(|rel| rel.other_node(node))
            .filter_map(|other| state.nodes.get(&other)?.app_id().map(ApplicationId::from))
            .collect();
        out.sort();
        out
    }

    // ========================================================================
    // Commit
    // ========================================================================

    fn apply(&self, ops: Vec<StagedOp>) -> Result<()> {
        let mut guard = self.inner.state.write();
        let state = &mut *guard;

        // Validate every endpoint before touching anything.
        let staged: hashbrown::HashSet<&ApplicationId> = ops
            .iter()
            .filter_map(|op| match op {
                StagedOp::MergeNode { app_id, .. } => Some(app_id),
                StagedOp::Relate { .. } => None,
            })
            .collect();
        for op in &ops {
            if let StagedOp::Relate { src, dst, rel_type, .. } = op {
                for end in [src, dst] {
                    if !staged.contains(end) && !state.app_index.contains_key(end) {
                        return Err(Error::Sink(format!("{rel_type} endpoint {end} is not a node")));
                    }
                }
            }
        }
        drop(staged);

        let (merges, relates): (Vec<_>, Vec<_>) =
            ops.into_iter().partition(|op| matches!(op, StagedOp::MergeNode { .. }));

        for op in merges {
            let StagedOp::MergeNode { app_id, label, props } = op else { continue };
            let id = match state.app_index.get(&app_id) {
                Some(&id) => id,
                None => {
                    let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed) + 1);
                    state.nodes.insert(id, Node::new(id));
                    state.adjacency.insert(id, Vec::new());
                    state.app_index.insert(app_id, id);
                    id
                }
            };
            let Some(node) = state.nodes.get_mut(&id) else { continue };
            if !node.has_label(&label) {
                node.labels.push(label.clone());
                state.label_index.entry(label).or_default().push(id);
            }
            node.properties.extend(props);
        }

        for op in relates {
            let StagedOp::Relate { src, dst, rel_type, props } = op else { continue };
            let (Some(&src), Some(&dst)) = (state.app_index.get(&src), state.app_index.get(&dst)) else {
                continue;
            };

            let existing = state.adjacency.get(&src).and_then(|ids| {
                ids.iter().copied().find(|rid| {
                    state
                        .relationships
                        .get(rid)
                        .is_some_and(|r| r.src == src && r.dst == dst && r.rel_type == rel_type)
                })
            });
            if let Some(rid) = existing {
                if let Some(rel) = state.relationships.get_mut(&rid) {
                    rel.properties.extend(props);
                }
                continue;
            }

            let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed) + 1);
            let mut rel = Relationship::new(id, src, dst, rel_type);
            rel.properties = props;
            state.relationships.insert(id, rel);
            state.adjacency.entry(src).or_default().push(id);
            if src != dst {
                state.adjacency.entry(dst).or_default().push(id);
            }
        }
        Ok(())
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

enum StagedOp {
    MergeNode { app_id: ApplicationId, label: String, props: PropertyMap },
    Relate { src: ApplicationId, dst: ApplicationId, rel_type: String, props: PropertyMap },
}

/// In-memory transaction: an ordered batch of staged writes.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    ops: Vec<StagedOp>,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
    fn pending(&self) -> usize { self.ops.len() }
}

fn writable(tx: &MemoryTx) -> Result<()> {
    if tx.is_read_only() {
        return Err(Error::TxError(format!("{} is read-only", tx.id)));
    }
    Ok(())
}

// ============================================================================
// GraphSink impl
// ============================================================================

#[async_trait]
impl GraphSink for MemorySink {
    type Tx = MemoryTx;

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed) + 1);
        Ok(MemoryTx { id, mode, ops: Vec::new() })
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        let staged = tx.ops.len();
        self.apply(tx.ops)?;
        tracing::debug!(tx = %tx.id, staged, "memory sink commit");
        Ok(())
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        tracing::debug!(tx = %tx.id, discarded = tx.ops.len(), "memory sink rollback");
        Ok(())
    }

    async fn merge_node(&self, tx: &mut MemoryTx, label: &str, props: PropertyMap) -> Result<()> {
        writable(tx)?;
        let app_id = props
            .get(ID_PROPERTY)
            .and_then(Value::as_str)
            .map(ApplicationId::from)
            .ok_or_else(|| Error::Sink(format!("{label} node without `{ID_PROPERTY}` property")))?;
        tx.ops.push(StagedOp::MergeNode { app_id, label: label.to_string(), props });
        Ok(())
    }

    async fn create_relationship(
        &self,
        tx: &mut MemoryTx,
        src: &ApplicationId,
        dst: &ApplicationId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<()> {
        writable(tx)?;
        tx.ops.push(StagedOp::Relate {
            src: src.clone(),
            dst: dst.clone(),
            rel_type: rel_type.to_string(),
            props,
        });
        Ok(())
    }
}
