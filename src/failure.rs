//! Per-object failure accounting.
//!
//! A run never aborts because one object is bad. Whatever goes wrong with a
//! single object lands here, keyed by its application id, and the caller
//! decides afterwards whether a non-empty report is acceptable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{ApplicationId, MeshDefect, RawObject};

/// Converting one raw object into a typed node failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessingError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("malformed mesh: {0}")]
    MalformedMesh(String),

    #[error("referenced by {parent} but not found in source")]
    MissingObject { parent: ApplicationId },
}

/// Failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Raw object could not become a typed node.
    Processing,
    /// Mesh unusable for collision testing; the node itself survives.
    DegenerateGeometry,
}

/// One entry of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The offending object, `None` when the source never produced it.
    pub object: Option<RawObject>,
    pub kind: FailureKind,
    pub message: String,
}

/// Append-only map application id → failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    records: BTreeMap<ApplicationId, FailureRecord>,
}

impl FailureReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. The first record for an id wins.
    pub fn record(&mut self, id: ApplicationId, record: FailureRecord) {
        tracing::warn!(id = %id, kind = ?record.kind, "{}", record.message);
        self.records.entry(id).or_insert(record);
    }

    pub fn record_processing(
        &mut self,
        id: ApplicationId,
        object: Option<RawObject>,
        error: &ProcessingError,
    ) {
        self.record(id, FailureRecord {
            object,
            kind: FailureKind::Processing,
            message: error.to_string(),
        });
    }

    pub fn record_degenerate(
        &mut self,
        id: ApplicationId,
        object: Option<RawObject>,
        defect: &MeshDefect,
    ) {
        self.record(id, FailureRecord {
            object,
            kind: FailureKind::DegenerateGeometry,
            message: defect.to_string(),
        });
    }

    /// Fold another report in; existing entries are kept.
    pub fn merge(&mut self, other: FailureReport) {
        for (id, record) in other.records {
            self.records.entry(id).or_insert(record);
        }
    }

    pub fn get(&self, id: &str) -> Option<&FailureRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ApplicationId, &FailureRecord)> {
        self.records.iter()
    }

    pub fn count_of(&self, kind: FailureKind) -> usize {
        self.records.values().filter(|r| r.kind == kind).count()
    }
}
