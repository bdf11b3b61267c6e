//! # Pipeline
//!
//! One run, each stage exactly once:
//!
//! ```text
//! Traverse ──▶ Build ──▶ Intersect ──▶ Assemble ──▶ Sink
//!  (source)    (logical graph,          (geometry    (one transaction,
//!               registry)                graph)       both views)
//! ```
//!
//! Per-object problems accumulate in the failure report and never stop the
//! run. An adapter error, cancellation, or a sink error does, and nothing is
//! retried.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::failure::{FailureKind, FailureReport};
use crate::graph::{assemble, BuildOutput, GeometryGraph, GraphBuilder, LogicalGraph};
use crate::intersect::{find_intersections, IntersectionStats};
use crate::model::{ApplicationId, ContainsEdge};
use crate::sink::{GraphSink, OpenedSink, WriteStats};
use crate::source::ObjectSource;
use crate::traverse::{traverse_parallel, CancelFlag, Traversal, TraversalStats};
use crate::tx::TxMode;
use crate::{Error, Result};

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Traverse,
    Build,
    Intersect,
    Assemble,
    Sink,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Traverse => "traverse",
            Stage::Build => "build",
            Stage::Intersect => "intersect",
            Stage::Assemble => "assemble",
            Stage::Sink => "sink",
        };
        f.write_str(name)
    }
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub traversal: TraversalStats,
    pub intersection: IntersectionStats,
    pub written: WriteStats,
    pub logical_nodes: u64,
    pub contains_edges: u64,
    pub dangling_edges: u64,
    pub geometry_nodes: u64,
    pub connected_edges: u64,
    pub processing_failures: u64,
    pub degenerate_meshes: u64,
    /// Wall time per stage in milliseconds.
    pub stage_millis: BTreeMap<Stage, i64>,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    pub logical: LogicalGraph,
    pub geometry: GeometryGraph,
    pub failures: FailureReport,
    pub stats: PipelineStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// CONTAINS edges dropped because their target was never emitted.
    pub fn dangling(&self) -> &[ContainsEdge] {
        self.logical.dangling()
    }

    /// No per-object failures and no dropped edges.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.logical.dangling().is_empty()
    }
}

/// Runs the stages against one source and one sink.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancelFlag,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, cancel: CancelFlag::new() }
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    fn checkpoint(&self, next: Stage) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::warn!(stage = %next, "run cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Every stage except Sink.
    pub fn build_graphs<S: ObjectSource>(
        &self,
        source: &S,
        root: impl Into<ApplicationId>,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let root = root.into();
        let mut stats = PipelineStats::default();
        tracing::info!(root = %root, parallel = self.config.parallel_traversal, "pipeline started");

        // Traverse + Build. The sequential walk is lazy, so both stages share
        // one pass and both report its combined time.
        self.checkpoint(Stage::Traverse)?;
        let mark = Utc::now();
        let BuildOutput { logical, registry, mut failures, stats: traversal } =
            if self.config.parallel_traversal {
                let walk = traverse_parallel(
                    source,
                    root.clone(),
                    self.config.skip_type_names.iter().cloned(),
                    Some(&self.cancel),
                )?;
                let walked = Utc::now();
                stats.stage_millis.insert(Stage::Traverse, (walked - mark).num_milliseconds());
                let output = GraphBuilder::from_parallel(walk);
                stats.stage_millis.insert(Stage::Build, (Utc::now() - walked).num_milliseconds());
                output
            } else {
                let walk = Traversal::new(source, root.clone())
                    .skip_types(self.config.skip_type_names.iter().cloned())
                    .with_cancel(self.cancel.clone());
                let output = GraphBuilder::build(walk)?;
                let millis = (Utc::now() - mark).num_milliseconds();
                stats.stage_millis.insert(Stage::Traverse, millis);
                stats.stage_millis.insert(Stage::Build, millis);
                output
            };
        stats.traversal = traversal;

        self.checkpoint(Stage::Intersect)?;
        let mark = Utc::now();
        let outcome = find_intersections(&registry, &mut failures, &self.config.intersection_options());
        stats.stage_millis.insert(Stage::Intersect, (Utc::now() - mark).num_milliseconds());
        stats.intersection = outcome.stats;

        self.checkpoint(Stage::Assemble)?;
        let mark = Utc::now();
        let geometry = assemble(&registry, &outcome.pairs);
        stats.stage_millis.insert(Stage::Assemble, (Utc::now() - mark).num_milliseconds());
        // Meshes are not needed past this point.
        drop(registry);

        stats.logical_nodes = logical.node_count() as u64;
        stats.contains_edges = logical.edge_count() as u64;
        stats.dangling_edges = logical.dangling().len() as u64;
        stats.geometry_nodes = geometry.node_count() as u64;
        stats.connected_edges = geometry.edge_count() as u64;
        stats.processing_failures = failures.count_of(FailureKind::Processing) as u64;
        stats.degenerate_meshes = failures.count_of(FailureKind::DegenerateGeometry) as u64;

        Ok(RunReport {
            logical,
            geometry,
            failures,
            stats,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Full run: build both graphs, then write them in one sink transaction.
    pub async fn run<S, K>(
        &self,
        source: &S,
        root: impl Into<ApplicationId>,
        sink: &K,
    ) -> Result<RunReport>
    where
        S: ObjectSource,
        K: GraphSink,
    {
        let mut report = self.build_graphs(source, root)?;

        self.checkpoint(Stage::Sink)?;
        let mark = Utc::now();
        let options = self.config.write_options();
        let mut tx = sink.begin_tx(TxMode::ReadWrite).await?;

        let staged = async {
            let mut written = sink.write_geometry_graph(&mut tx, &report.geometry, &options).await?;
            written += sink.write_logical_graph(&mut tx, &report.logical, &options).await?;
            self.checkpoint(Stage::Sink)?;
            Ok::<_, Error>(written)
        }
        .await;

        let written = match staged {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(stage = %Stage::Sink, error = %e, "rolling back");
                sink.rollback_tx(tx).await?;
                return Err(e);
            }
        };
        sink.commit_tx(tx).await?;

        report.stats.written = written;
        report.stats.stage_millis.insert(Stage::Sink, (Utc::now() - mark).num_milliseconds());
        report.finished_at = Utc::now();

        tracing::info!(
            logical = report.stats.logical_nodes,
            geometry = report.stats.geometry_nodes,
            contains = report.stats.contains_edges,
            connected = report.stats.connected_edges,
            failures = report.failures.len(),
            "pipeline finished"
        );
        Ok(report)
    }

    /// Full run against the sink named in the configuration. The opened sink
    /// is handed back so a memory store can be read afterwards.
    pub async fn run_configured<S: ObjectSource>(
        &self,
        source: &S,
        root: impl Into<ApplicationId>,
    ) -> Result<(RunReport, OpenedSink)> {
        let sink = self.config.sink.open()?;
        let report = self.run(source, root, &sink).await?;
        Ok((report, sink))
    }
}
