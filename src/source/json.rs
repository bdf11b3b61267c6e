//! JSON object dumps.
//!
//! Accepts either a bare array of objects or a document of the form
//! `{"root": "<id>", "objects": [...]}`. Entries that do not deserialize
//! (most often: no `applicationId`) cannot be referenced by anyone and are
//! skipped with a warning.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::model::{ApplicationId, RawObject};
use crate::{Error, Result};
use super::MemorySource;

/// A loaded dump.
#[derive(Debug, Clone, Default)]
pub struct JsonDocument {
    pub source: MemorySource,
    /// Root declared by the document, if any.
    pub root: Option<ApplicationId>,
    /// Entries that could not be read as objects.
    pub skipped: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Dump {
    Objects(Vec<serde_json::Value>),
    Document {
        #[serde(default)]
        root: Option<ApplicationId>,
        objects: Vec<serde_json::Value>,
    },
}

pub fn load_json_str(json: &str) -> Result<JsonDocument> {
    let dump: Dump = serde_json::from_str(json)?;
    Ok(collect(dump))
}

pub fn load_json_reader<R: Read>(reader: R) -> Result<JsonDocument> {
    let dump: Dump = serde_json::from_reader(reader)?;
    Ok(collect(dump))
}

pub fn load_json_path(path: impl AsRef<Path>) -> Result<JsonDocument> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Source(format!("cannot open {}: {e}", path.display())))?;
    load_json_reader(std::io::BufReader::new(file))
}

fn collect(dump: Dump) -> JsonDocument {
    let (root, entries) = match dump {
        Dump::Objects(objects) => (None, objects),
        Dump::Document { root, objects } => (root, objects),
    };

    let mut doc = JsonDocument { root, ..JsonDocument::default() };
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<RawObject>(entry) {
            Ok(object) => {
                doc.source.insert(object);
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping unreadable object");
                doc.skipped += 1;
            }
        }
    }
    tracing::debug!(objects = doc.source.len(), skipped = doc.skipped, "loaded JSON dump");
    doc
}
