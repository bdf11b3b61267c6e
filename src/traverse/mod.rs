//! # DAG Traverser
//!
//! Walks the object hierarchy from a root and yields one typed node per
//! reachable object.
//!
//! ```text
//! root ──fetch──▶ classify ──▶ TypedNode::Logical | TypedNode::Geometry
//!   │                │
//!   └─ children ◀────┘   (pushed even when the object is skipped or fails)
//! ```
//!
//! The hierarchy is a DAG: a child can hang under several parents. The
//! visited-set is keyed by application id, so every id is fetched and
//! emitted at most once no matter how many parents reference it.

pub mod parallel;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::failure::{FailureReport, ProcessingError};
use crate::model::{
    flatten_parameters, ApplicationId, GeometryNode, LogicalNode, RawObject, TypedNode,
};
use crate::model::raw::merge_meshes;
use crate::source::ObjectSource;
use crate::{Error, Result};

pub use parallel::{traverse_parallel, ParallelTraversal};

/// Type names excluded from the output stream.
pub type SkipSet = HashSet<String>;

/// Cooperative cancellation, polled between objects.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalStats {
    /// Distinct ids taken off the work list.
    pub visited: u64,
    pub logical: u64,
    pub geometry: u64,
    /// Objects filtered out by type name.
    pub skipped: u64,
    /// Objects recorded in the failure report.
    pub failed: u64,
}

// ============================================================================
// Classification
// ============================================================================

/// Turn one raw object into a typed node.
///
/// Pure function of the object's own fields:
/// mesh payload ⇒ geometry; otherwise logical, with the child ids if any.
pub fn classify(object: &RawObject) -> std::result::Result<TypedNode, ProcessingError> {
    let type_name = object
        .type_name
        .clone()
        .ok_or(ProcessingError::MissingField("type"))?;
    let name = object.name.clone().unwrap_or_else(|| type_name.clone());

    if let Some(parts) = &object.mesh {
        return Ok(TypedNode::Geometry(GeometryNode {
            id: object.application_id.clone(),
            name,
            type_name,
            mesh: merge_meshes(parts)?,
        }));
    }

    Ok(TypedNode::Logical(LogicalNode {
        id: object.application_id.clone(),
        name,
        type_name,
        children: object.children().iter().cloned().collect(),
        properties: object
            .parameters
            .as_ref()
            .map(flatten_parameters)
            .unwrap_or_default(),
    }))
}

// ============================================================================
// Sequential traversal
// ============================================================================

/// Lazy depth-first walk.
///
/// Yields `Ok(node)` per emitted object. Per-object problems go into the
/// failure report and the walk moves on; an adapter error or cancellation is
/// yielded once as `Err` and ends the sequence. Single pass, not
/// restartable: call [`Traversal::into_failures`] after draining it.
pub struct Traversal<S> {
    source: S,
    /// (id, parent that referenced it)
    stack: Vec<(ApplicationId, Option<ApplicationId>)>,
    visited: HashSet<ApplicationId>,
    skip: SkipSet,
    cancel: Option<CancelFlag>,
    failures: FailureReport,
    stats: TraversalStats,
    done: bool,
}

/// Start a walk from `root`, filtering out the given type names.
pub fn traverse<S, I>(source: S, root: impl Into<ApplicationId>, skip_type_names: I) -> Traversal<S>
where
    S: ObjectSource,
    I: IntoIterator,
    I::Item: Into<String>,
{
    Traversal::new(source, root).skip_types(skip_type_names)
}

impl<S: ObjectSource> Traversal<S> {
    pub fn new(source: S, root: impl Into<ApplicationId>) -> Self {
        Self {
            source,
            stack: vec![(root.into(), None)],
            visited: HashSet::new(),
            skip: SkipSet::new(),
            cancel: None,
            failures: FailureReport::new(),
            stats: TraversalStats::default(),
            done: false,
        }
    }

    pub fn skip_types<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.skip.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn failures(&self) -> &FailureReport {
        &self.failures
    }

    pub fn stats(&self) -> TraversalStats {
        self.stats
    }

    /// Report accumulated so far; complete once the iterator is drained.
    pub fn into_failures(self) -> FailureReport {
        self.failures
    }

    pub fn into_parts(self) -> (FailureReport, TraversalStats) {
        (self.failures, self.stats)
    }

    fn finish_with(&mut self, error: Error) -> Option<Result<TypedNode>> {
        self.done = true;
        self.stack.clear();
        Some(Err(error))
    }
}

impl<S: ObjectSource> Iterator for Traversal<S> {
    type Item = Result<TypedNode>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                return self.finish_with(Error::Cancelled);
            }

            let (id, parent) = self.stack.pop()?;
            if !self.visited.insert(id.clone()) {
                continue;
            }
            self.stats.visited += 1;

            let object = match self.source.fetch(&id) {
                Ok(Some(object)) => object,
                Ok(None) => match parent {
                    Some(parent) => {
                        self.stats.failed += 1;
                        self.failures.record_processing(
                            id,
                            None,
                            &ProcessingError::MissingObject { parent },
                        );
                        continue;
                    }
                    None => return self.finish_with(Error::NotFound(format!("root object {id}"))),
                },
                Err(e) => return self.finish_with(e),
            };

            // Reverse so children come off the stack in source order.
            for child in object.children().iter().rev() {
                if !self.visited.contains(child) {
                    self.stack.push((child.clone(), Some(id.clone())));
                }
            }

            if object
                .type_name
                .as_ref()
                .is_some_and(|t| self.skip.contains(t.as_str()))
            {
                tracing::debug!(id = %id, "skipped by type");
                self.stats.skipped += 1;
                continue;
            }

            match classify(&object) {
                Ok(node) => {
                    if node.is_geometry() {
                        self.stats.geometry += 1;
                    } else {
                        self.stats.logical += 1;
                    }
                    tracing::debug!(id = %id, geometry = node.is_geometry(), "emitted");
                    return Some(Ok(node));
                }
                Err(e) => {
                    self.stats.failed += 1;
                    self.failures.record_processing(id, Some(object), &e);
                }
            }
        }
    }
}
