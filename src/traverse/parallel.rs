//! Level-synchronous parallel walk.
//!
//! Each breadth-first level is fetched and classified on the rayon pool.
//! The visited-set is a single mutex-guarded set: when two branches race on
//! the same id, exactly one wins the insert and emits it.

use hashbrown::HashSet;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::failure::{FailureRecord, FailureReport, FailureKind, ProcessingError};
use crate::model::{ApplicationId, TypedNode};
use crate::source::ObjectSource;
use crate::{Error, Result};
use super::{classify, CancelFlag, SkipSet, TraversalStats};

/// Materialized result of a parallel walk.
#[derive(Debug, Default)]
pub struct ParallelTraversal {
    pub nodes: Vec<TypedNode>,
    pub failures: FailureReport,
    pub stats: TraversalStats,
}

enum Visit {
    /// Lost the race for this id.
    Seen,
    Skipped { children: Vec<(ApplicationId, ApplicationId)> },
    Emitted { node: TypedNode, children: Vec<(ApplicationId, ApplicationId)> },
    Failed {
        id: ApplicationId,
        record: FailureRecord,
        children: Vec<(ApplicationId, ApplicationId)>,
    },
}

/// Walk every object reachable from `root` using the rayon pool.
///
/// Produces the same node set, classifications and failures as the
/// sequential [`super::traverse`]; only the emission order differs.
pub fn traverse_parallel<S, I>(
    source: &S,
    root: impl Into<ApplicationId>,
    skip_type_names: I,
    cancel: Option<&CancelFlag>,
) -> Result<ParallelTraversal>
where
    S: ObjectSource + ?Sized,
    I: IntoIterator,
    I::Item: Into<String>,
{
    let skip: SkipSet = skip_type_names.into_iter().map(Into::into).collect();
    let visited: Mutex<HashSet<ApplicationId>> = Mutex::new(HashSet::new());
    let mut out = ParallelTraversal::default();

    let mut frontier: Vec<(ApplicationId, Option<ApplicationId>)> = vec![(root.into(), None)];
    let mut depth = 0usize;

    while !frontier.is_empty() {
        let visits = frontier
            .par_iter()
            .map(|(id, parent)| visit(source, id, parent.as_ref(), &skip, &visited, cancel))
            .collect::<Result<Vec<Visit>>>()?;

        tracing::debug!(depth, width = frontier.len(), "traversed level");
        depth += 1;

        let mut next = Vec::new();
        for v in visits {
            match v {
                Visit::Seen => continue,
                Visit::Skipped { children } => {
                    out.stats.visited += 1;
                    out.stats.skipped += 1;
                    next.extend(children.into_iter().map(|(c, p)| (c, Some(p))));
                }
                Visit::Emitted { node, children } => {
                    out.stats.visited += 1;
                    if node.is_geometry() {
                        out.stats.geometry += 1;
                    } else {
                        out.stats.logical += 1;
                    }
                    out.nodes.push(node);
                    next.extend(children.into_iter().map(|(c, p)| (c, Some(p))));
                }
                Visit::Failed { id, record, children } => {
                    out.stats.visited += 1;
                    out.stats.failed += 1;
                    out.failures.record(id, record);
                    next.extend(children.into_iter().map(|(c, p)| (c, Some(p))));
                }
            }
        }
        frontier = next;
    }

    Ok(out)
}

fn visit<S>(
    source: &S,
    id: &ApplicationId,
    parent: Option<&ApplicationId>,
    skip: &SkipSet,
    visited: &Mutex<HashSet<ApplicationId>>,
    cancel: Option<&CancelFlag>,
) -> Result<Visit>
where
    S: ObjectSource + ?Sized,
{
    if cancel.is_some_and(CancelFlag::is_cancelled) {
        return Err(Error::Cancelled);
    }
    if !visited.lock().insert(id.clone()) {
        return Ok(Visit::Seen);
    }

    let Some(object) = source.fetch(id)? else {
        let Some(parent) = parent else {
            return Err(Error::NotFound(format!("root object {id}")));
        };
        let error = ProcessingError::MissingObject { parent: parent.clone() };
        return Ok(Visit::Failed {
            id: id.clone(),
            record: FailureRecord {
                object: None,
                kind: FailureKind::Processing,
                message: error.to_string(),
            },
            children: Vec::new(),
        });
    };

    let children: Vec<(ApplicationId, ApplicationId)> = object
        .children()
        .iter()
        .map(|c| (c.clone(), id.clone()))
        .collect();

    if object.type_name.as_ref().is_some_and(|t| skip.contains(t.as_str())) {
        return Ok(Visit::Skipped { children });
    }

    Ok(match classify(&object) {
        Ok(node) => Visit::Emitted { node, children },
        Err(e) => Visit::Failed {
            id: id.clone(),
            record: FailureRecord {
                object: Some(object),
                kind: FailureKind::Processing,
                message: e.to_string(),
            },
            children,
        },
    })
}
