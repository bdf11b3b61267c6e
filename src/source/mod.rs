//! # Object Source Adapter
//!
//! The contract between the traverser and whatever holds the raw objects.
//! The core only ever calls `fetch`; retrieval, caching and transport are
//! the adapter's business.
//!
//! ## Implementations
//!
//! | Adapter | Module | Description |
//! |---------|--------|-------------|
//! | `MemorySource` | `memory` | Objects held in a map, for tests and embedding |
//! | JSON loader | `json` | Parses an exported object dump into a `MemorySource` |

pub mod memory;
pub mod json;

use crate::model::{ApplicationId, RawObject};
use crate::Result;

pub use memory::MemorySource;
pub use json::{JsonDocument, load_json_str, load_json_reader, load_json_path};

/// Read-only access to raw objects by application id.
///
/// `Ok(None)` means the id is unknown, which the traverser records as a
/// per-object failure. `Err` means the adapter itself is unusable and ends
/// the run.
pub trait ObjectSource: Send + Sync {
    fn fetch(&self, id: &ApplicationId) -> Result<Option<RawObject>>;
}

impl<S: ObjectSource + ?Sized> ObjectSource for &S {
    fn fetch(&self, id: &ApplicationId) -> Result<Option<RawObject>> {
        (**self).fetch(id)
    }
}

impl<S: ObjectSource + ?Sized> ObjectSource for std::sync::Arc<S> {
    fn fetch(&self, id: &ApplicationId) -> Result<Option<RawObject>> {
        (**self).fetch(id)
    }
}
