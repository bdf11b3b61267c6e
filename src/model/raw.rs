//! Raw objects as exported by the authoring platform.
//!
//! These are read-only inputs. The traverser reads the fields below and
//! nothing else; unknown JSON fields are ignored.

use glam::DVec3;
use serde::{Deserialize, Deserializer, Serialize};

use super::{ApplicationId, Mesh};
use crate::failure::ProcessingError;

/// Legacy face-size prefixes: `0` meant triangle, `1` meant quad.
const LEGACY_TRIANGLE: u32 = 0;
const LEGACY_QUAD: u32 = 1;

/// One object of the source hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObject {
    pub application_id: ApplicationId,

    #[serde(default, alias = "speckle_type", alias = "type")]
    pub type_name: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    /// Absent and `null` both mean "no children".
    #[serde(default)]
    pub contained_elements_ids: Option<Vec<ApplicationId>>,

    /// Display meshes; a single mesh or a list of meshes on the wire.
    #[serde(default, alias = "displayValue", deserialize_with = "one_or_many")]
    pub mesh: Option<Vec<RawMesh>>,

    #[serde(default)]
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
}

impl RawObject {
    pub fn new(application_id: impl Into<ApplicationId>, type_name: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            type_name: Some(type_name.into()),
            name: None,
            contained_elements_ids: None,
            mesh: None,
            parameters: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ApplicationId>,
    {
        self.contained_elements_ids = Some(children.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_mesh(mut self, mesh: RawMesh) -> Self {
        self.mesh.get_or_insert_with(Vec::new).push(mesh);
        self
    }

    pub fn with_parameters(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.parameters = Some(params);
        self
    }

    pub fn id(&self) -> &ApplicationId {
        &self.application_id
    }

    /// Child ids, empty when the field is absent or null.
    pub fn children(&self) -> &[ApplicationId] {
        self.contained_elements_ids.as_deref().unwrap_or(&[])
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<RawMesh>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(RawMesh),
        Many(Vec<RawMesh>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => None,
        Some(OneOrMany::One(mesh)) => Some(vec![mesh]),
        Some(OneOrMany::Many(meshes)) => Some(meshes),
    })
}

/// Mesh payload in the platform encoding.
///
/// `vertices` is flat `[x0, y0, z0, x1, ...]`. `faces` is a sequence of
/// polygons, each prefixed by its vertex count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMesh {
    #[serde(default)]
    pub vertices: Vec<f64>,
    #[serde(default)]
    pub faces: Vec<u32>,
}

impl RawMesh {
    pub fn new(vertices: Vec<f64>, faces: Vec<u32>) -> Self {
        Self { vertices, faces }
    }

    /// Encode a triangle mesh back into the platform layout.
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let vertices = mesh.vertices().iter().flat_map(|v| [v.x, v.y, v.z]).collect();
        let faces = mesh.faces().iter().flat_map(|&[a, b, c]| [3, a, b, c]).collect();
        Self { vertices, faces }
    }

    /// Decode into a triangle mesh, fan-triangulating polygons.
    pub fn to_mesh(&self) -> Result<Mesh, ProcessingError> {
        if self.vertices.len() % 3 != 0 {
            return Err(ProcessingError::MalformedMesh(format!(
                "{} vertex coordinates is not a multiple of 3",
                self.vertices.len()
            )));
        }

        let mut mesh = Mesh::new();
        for xyz in self.vertices.chunks_exact(3) {
            mesh.add_vertex(DVec3::new(xyz[0], xyz[1], xyz[2]));
        }
        let vertex_count = mesh.vertex_count();

        let mut i = 0;
        while i < self.faces.len() {
            let n = match self.faces[i] {
                LEGACY_TRIANGLE => 3,
                LEGACY_QUAD => 4,
                n => n as usize,
            };
            if n < 3 {
                return Err(ProcessingError::MalformedMesh(format!(
                    "face at offset {i} has {n} vertices"
                )));
            }
            let polygon = self.faces.get(i + 1..i + 1 + n).ok_or_else(|| {
                ProcessingError::MalformedMesh(format!("face at offset {i} is truncated"))
            })?;
            if let Some(&bad) = polygon.iter().find(|&&v| v as usize >= vertex_count) {
                return Err(ProcessingError::MalformedMesh(format!(
                    "face at offset {i} references vertex {bad}, mesh has {vertex_count}"
                )));
            }
            for k in 1..n - 1 {
                mesh.add_triangle(polygon[0], polygon[k], polygon[k + 1]);
            }
            i += 1 + n;
        }

        Ok(mesh)
    }
}

/// Decode and merge every display mesh of an object into one mesh.
pub fn merge_meshes(parts: &[RawMesh]) -> Result<Mesh, ProcessingError> {
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for part in parts {
        let mesh = part.to_mesh()?;
        let offset = vertices.len() as u32;
        vertices.extend_from_slice(mesh.vertices());
        faces.extend(mesh.faces().iter().map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]));
    }
    Ok(Mesh::from_parts(vertices, faces))
}
