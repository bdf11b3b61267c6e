//! Pipeline configuration.
//!
//! Every field has a default, so `{}` is a valid configuration:
//!
//! ```json
//! {
//!   "skip_type_names": ["Objects.Other.RenderMaterial"],
//!   "parallel_traversal": true,
//!   "contact_tolerance": 1e-6,
//!   "cell_size": null,
//!   "include_parameters": true,
//!   "logical_label": "LogicalNode",
//!   "geometry_label": "GeometryNode",
//!   "sink": { "kind": "cypher_script", "path": "model.cypher" }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::intersect::{IntersectionOptions, DEFAULT_CONTACT_TOLERANCE, MIN_CELL_SIZE};
use crate::sink::{SinkConfig, WriteOptions, GEOMETRY_LABEL, LOGICAL_LABEL};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Objects with these type names are neither emitted nor stored; their
    /// children are still traversed.
    pub skip_type_names: Vec<String>,
    /// Walk the hierarchy on the rayon pool instead of depth-first.
    pub parallel_traversal: bool,
    /// Surfaces closer than this count as touching.
    pub contact_tolerance: f64,
    /// Collision grid cell edge; derived from the meshes when absent. At
    /// least `MIN_CELL_SIZE`.
    pub cell_size: Option<f64>,
    /// Persist flattened source parameters on logical nodes.
    pub include_parameters: bool,
    pub logical_label: String,
    pub geometry_label: String,
    pub sink: SinkConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            skip_type_names: Vec::new(),
            parallel_traversal: false,
            contact_tolerance: DEFAULT_CONTACT_TOLERANCE,
            cell_size: None,
            include_parameters: false,
            logical_label: LOGICAL_LABEL.into(),
            geometry_label: GEOMETRY_LABEL.into(),
            sink: SinkConfig::Memory,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.contact_tolerance.is_finite() || self.contact_tolerance < 0.0 {
            return Err(Error::Config(format!(
                "contact_tolerance must be a non-negative number, got {}",
                self.contact_tolerance
            )));
        }
        if let Some(size) = self.cell_size {
            if !size.is_finite() || size < MIN_CELL_SIZE {
                return Err(Error::Config(format!(
                    "cell_size must be at least {MIN_CELL_SIZE}, got {size}"
                )));
            }
        }
        for (field, label) in [("logical_label", &self.logical_label), ("geometry_label", &self.geometry_label)] {
            if label.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }
        if self.logical_label == self.geometry_label {
            return Err(Error::Config("logical and geometry labels must differ".into()));
        }
        Ok(())
    }

    pub fn intersection_options(&self) -> IntersectionOptions {
        IntersectionOptions {
            contact_tolerance: self.contact_tolerance,
            cell_size: self.cell_size,
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            logical_label: self.logical_label.clone(),
            geometry_label: self.geometry_label.clone(),
            include_parameters: self.include_parameters,
        }
    }
}
