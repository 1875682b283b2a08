//! The decoded scene a model file is imported into, before any of it is turned into engine data.

use std::path::{Path, PathBuf};

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use thiserror::Error;

use crate::engine::track::Track;

mod gltf_import;

pub use gltf_import::{GLTF_TICKS_PER_SECOND, SCENE_ROOT_NAME, import_gltf, import_gltf_slice};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("File not found ({0})")]
    FileNotFound(PathBuf),

    #[error("Decode error ({0}): {1}")]
    Decode(PathBuf, String),

    #[error("Unsupported asset ({0})")]
    NotSupported(PathBuf),

    #[error("Scene ({0}) contains no meshes")]
    NoMeshes(String),

    #[error("Mesh \"{mesh}\" is missing {data}")]
    MissingMeshData { mesh: String, data: &'static str },

    #[error("Unknown error ({0}): {1}")]
    Unknown(PathBuf, String),
}

impl AssetError {
    pub fn from_io_error(error: std::io::Error, path: &Path) -> Self {
        match error {
            err if err.kind() == std::io::ErrorKind::NotFound => {
                Self::FileNotFound(path.to_path_buf())
            }
            err => Self::Unknown(path.to_path_buf(), err.kind().to_string()),
        }
    }
}

/// A node in the imported scene graph.
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    /// Transform relative to the parent node.
    pub transform: Mat4,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            name: name.into(),
            transform,
            children: Vec::default(),
        }
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

/// A bone referenced by a mesh: its inverse bind pose and the vertices it influences.
#[derive(Clone, Debug)]
pub struct MeshBone {
    /// Name of the scene node driving this bone.
    pub name: String,
    /// Transforms from mesh space into the bone's space in the bind pose.
    pub offset: Mat4,
    pub weights: Vec<VertexWeight>,
}

/// Vertex data of a single mesh. Optional attributes are `None` when the file does not provide
/// them; when present they have one entry per position.
#[derive(Clone, Debug, Default)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub colors: Option<Vec<Vec4>>,
    pub tex_coords: Option<Vec<Vec2>>,
    pub tangents: Option<Vec<Vec3>>,
    pub bitangents: Option<Vec<Vec3>>,
    pub indices: Vec<u32>,
    pub bones: Vec<MeshBone>,
}

/// Key tracks animating a single bone. Each track is timed independently.
#[derive(Clone, Debug, Default)]
pub struct BoneChannel {
    pub bone_name: String,
    pub positions: Track<Vec3>,
    pub rotations: Track<Quat>,
    pub scales: Track<Vec3>,
}

impl BoneChannel {
    pub fn new(bone_name: impl Into<String>) -> Self {
        Self {
            bone_name: bone_name.into(),
            ..Default::default()
        }
    }

    /// Largest key count of the three tracks.
    pub fn max_key_count(&self) -> usize {
        self.positions
            .len()
            .max(self.rotations.len())
            .max(self.scales.len())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImportedClip {
    pub name: String,
    /// Length of the clip in ticks.
    pub duration_ticks: f64,
    /// Non-positive when the file does not specify it.
    pub ticks_per_second: f64,
    pub channels: Vec<BoneChannel>,
}

#[derive(Clone, Debug)]
pub struct ImportedScene {
    pub name: String,
    pub root: SceneNode,
    pub meshes: Vec<ImportedMesh>,
    pub clips: Vec<ImportedClip>,
}

/// Import a model file, picking the importer from the file extension.
pub fn load_scene(path: impl AsRef<Path>) -> Result<ImportedScene, AssetError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

    match extension.as_deref() {
        Some("gltf") | Some("glb") => import_gltf(path),
        _ => Err(AssetError::NotSupported(path.to_path_buf())),
    }
}
