use std::sync::Arc;

use glam::Mat4;
use renderer::VertexBufferLayout;

use crate::{
    engine::{
        assets::{AssetError, ImportedMesh, ImportedScene},
        pose::Pose,
        vertex::{SkinnedVertex, VertexAttributes},
    },
    game::{
        animation::{
            AnimationSet, CharacterData, ClipImporter, NameLookup, Skeleton, SkeletonBuilder,
        },
        settings::AnimationSettings,
    },
};

/// Vertex and index data of a single mesh, ready to be uploaded.
#[derive(Clone, Debug)]
pub struct MeshAsset {
    pub name: String,
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
    /// The attributes the source mesh provided.
    pub attributes: VertexAttributes,
    /// Layout of `vertices` when uploaded, exposing only `attributes`.
    pub vertex_layout: VertexBufferLayout,
}

/// Everything needed to create animated characters of a model.
#[derive(Clone, Debug)]
pub struct Rig {
    /// Cloned into every character.
    pub skeleton: Skeleton,
    pub name_lookup: NameLookup,
    pub inverse_global_transformation: Mat4,
    pub animations: Arc<AnimationSet>,
    pub default_clip: usize,
}

impl Rig {
    pub fn instantiate(&self, character_orientation: Pose) -> CharacterData {
        let mut character = CharacterData::new(
            character_orientation,
            self.inverse_global_transformation,
            self.skeleton.clone(),
            Arc::clone(&self.animations),
        );
        if self.default_clip != 0 {
            character.play(self.default_clip);
        }
        character
    }
}

#[derive(Clone, Debug)]
pub struct ModelAsset {
    pub name: String,
    pub meshes: Vec<MeshAsset>,
    /// `None` for static models, or when the skeleton could not be built.
    pub rig: Option<Rig>,
}

impl ModelAsset {
    pub fn from_scene(
        scene: &ImportedScene,
        settings: &AnimationSettings,
    ) -> Result<Self, AssetError> {
        if scene.meshes.is_empty() {
            return Err(AssetError::NoMeshes(scene.name.clone()));
        }

        let rig = build_rig(scene, settings);

        let meshes = scene
            .meshes
            .iter()
            .map(|mesh| build_mesh(mesh, rig.as_ref().map(|rig| &rig.name_lookup)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: scene.name.clone(),
            meshes,
            rig,
        })
    }

    #[inline]
    pub fn is_animated(&self) -> bool {
        self.rig.is_some()
    }
}

fn build_rig(scene: &ImportedScene, settings: &AnimationSettings) -> Option<Rig> {
    if scene.meshes.iter().all(|mesh| mesh.bones.is_empty()) {
        tracing::debug!("{} has no bones, loading it as a static model.", scene.name);
        return None;
    }

    let bone_offsets = scene
        .meshes
        .iter()
        .flat_map(|mesh| mesh.bones.iter())
        .map(|bone| (bone.name.clone(), bone.offset));

    let built = match SkeletonBuilder::new(&settings.control_node_marker)
        .with_bone_offsets(bone_offsets)
        .build(&scene.root)
    {
        Ok(built) => built,
        Err(err) => {
            tracing::warn!("Could not build skeleton for {}: {err}", scene.name);
            return None;
        }
    };

    let importer = ClipImporter::new(&built.name_lookup, &built.rest_poses)
        .with_fallback_ticks_per_second(settings.fallback_ticks_per_second);
    let animations = AnimationSet::new(scene.clips.iter().map(|clip| importer.import(clip)));

    tracing::info!(
        "{}: {} bones, {} animations",
        scene.name,
        built.skeleton.bone_count(),
        animations.len()
    );

    Some(Rig {
        skeleton: built.skeleton,
        name_lookup: built.name_lookup,
        inverse_global_transformation: scene.root.transform.inverse(),
        animations: Arc::new(animations),
        default_clip: settings.default_clip,
    })
}

/// Returns the attribute if it has a value for every vertex.
fn per_vertex<'a, T>(
    mesh: &ImportedMesh,
    attribute: &'a Option<Vec<T>>,
    what: &str,
) -> Option<&'a [T]> {
    let values = attribute.as_deref()?;
    if values.len() != mesh.positions.len() {
        tracing::warn!(
            "{}: {} {what} for {} vertices, ignoring them.",
            mesh.name,
            values.len(),
            mesh.positions.len()
        );
        return None;
    }
    Some(values)
}

fn build_mesh(mesh: &ImportedMesh, name_lookup: Option<&NameLookup>) -> Result<MeshAsset, AssetError> {
    if mesh.positions.is_empty() {
        return Err(AssetError::MissingMeshData {
            mesh: mesh.name.clone(),
            data: "positions",
        });
    }

    let mut attributes = VertexAttributes::POSITION;
    let mut vertices = mesh
        .positions
        .iter()
        .map(|position| SkinnedVertex {
            position: position.to_array(),
            ..Default::default()
        })
        .collect::<Vec<_>>();

    if let Some(normals) = per_vertex(mesh, &mesh.normals, "normals") {
        attributes |= VertexAttributes::NORMAL;
        for (vertex, normal) in vertices.iter_mut().zip(normals) {
            vertex.normal = normal.to_array();
        }
    }

    if let Some(colors) = per_vertex(mesh, &mesh.colors, "colors") {
        attributes |= VertexAttributes::COLOR;
        for (vertex, color) in vertices.iter_mut().zip(colors) {
            vertex.color = color.to_array();
        }
    }

    if let Some(tex_coords) = per_vertex(mesh, &mesh.tex_coords, "texture coordinates") {
        attributes |= VertexAttributes::TEX_COORD;
        for (vertex, tex_coord) in vertices.iter_mut().zip(tex_coords) {
            vertex.tex_coord = tex_coord.to_array();
        }
    }

    let tangents = per_vertex(mesh, &mesh.tangents, "tangents");
    let bitangents = per_vertex(mesh, &mesh.bitangents, "bitangents");
    if let (Some(tangents), Some(bitangents)) = (tangents, bitangents) {
        attributes |= VertexAttributes::TANGENT | VertexAttributes::BITANGENT;
        for ((vertex, tangent), bitangent) in vertices.iter_mut().zip(tangents).zip(bitangents) {
            vertex.tangent = tangent.to_array();
            vertex.bitangent = bitangent.to_array();
        }
    }

    if let Some(name_lookup) = name_lookup {
        if apply_bone_weights(mesh, name_lookup, &mut vertices) {
            attributes |= VertexAttributes::JOINTS | VertexAttributes::WEIGHTS;
        }
    }

    if let Some(index) = mesh
        .indices
        .iter()
        .find(|index| **index as usize >= vertices.len())
    {
        tracing::warn!(
            "{}: index {index} is out of range for {} vertices.",
            mesh.name,
            vertices.len()
        );
        return Err(AssetError::MissingMeshData {
            mesh: mesh.name.clone(),
            data: "valid indices",
        });
    }

    Ok(MeshAsset {
        name: mesh.name.clone(),
        vertices,
        indices: mesh.indices.clone(),
        attributes,
        vertex_layout: attributes.vertex_buffer_layout(),
    })
}

/// Fold the per-bone weight lists into the vertices. Returns true if any vertex is influenced
/// by a bone.
fn apply_bone_weights(
    mesh: &ImportedMesh,
    name_lookup: &NameLookup,
    vertices: &mut [SkinnedVertex],
) -> bool {
    let mut influenced = false;
    let mut dropped = 0_usize;

    for bone in mesh.bones.iter() {
        let Some(&joint) = name_lookup.get(&bone.name) else {
            tracing::warn!(
                "{}: bone {} is not part of the skeleton, ignoring its weights.",
                mesh.name,
                bone.name
            );
            continue;
        };

        for weight in bone.weights.iter() {
            if weight.weight <= 0.0 {
                continue;
            }
            let Some(vertex) = vertices.get_mut(weight.vertex as usize) else {
                tracing::warn!(
                    "{}: bone {} references missing vertex {}.",
                    mesh.name,
                    bone.name,
                    weight.vertex
                );
                continue;
            };

            if vertex.add_bone_influence(joint, weight.weight) {
                influenced = true;
            } else {
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        tracing::debug!(
            "{}: dropped {dropped} bone influences past the per-vertex limit.",
            mesh.name
        );
    }

    influenced
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::engine::assets::{BoneChannel, ImportedClip, MeshBone, SceneNode, VertexWeight};
    use crate::engine::track::Track;

    fn weights(pairs: &[(u32, f32)]) -> Vec<VertexWeight> {
        pairs
            .iter()
            .map(|&(vertex, weight)| VertexWeight { vertex, weight })
            .collect()
    }

    fn triangle(bones: Vec<MeshBone>) -> ImportedMesh {
        ImportedMesh {
            name: "body".to_string(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: Some(vec![Vec3::Z; 3]),
            tex_coords: Some(vec![glam::Vec2::ZERO; 2]),
            indices: vec![0, 1, 2],
            bones,
            ..Default::default()
        }
    }

    fn scene(meshes: Vec<ImportedMesh>, clips: Vec<ImportedClip>) -> ImportedScene {
        ImportedScene {
            name: "soldier.glb".to_string(),
            root: SceneNode::new("Armature", Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0)))
                .with_child(
                    SceneNode::new("hip", Mat4::IDENTITY)
                        .with_child(SceneNode::new("knee", Mat4::from_translation(Vec3::NEG_Y))),
                )
                .with_child(
                    SceneNode::new("IK_Ctrl", Mat4::IDENTITY)
                        .with_child(SceneNode::new("pole", Mat4::IDENTITY)),
                ),
            meshes,
            clips,
        }
    }

    fn skinned_triangle() -> ImportedMesh {
        triangle(vec![
            MeshBone {
                name: "hip".to_string(),
                offset: Mat4::IDENTITY,
                weights: weights(&[(0, 1.0), (1, 0.5), (2, 0.2)]),
            },
            MeshBone {
                name: "knee".to_string(),
                offset: Mat4::from_translation(Vec3::Y),
                weights: weights(&[(1, 0.5), (2, 0.2)]),
            },
            MeshBone {
                name: "pole".to_string(),
                offset: Mat4::IDENTITY,
                weights: weights(&[(0, 1.0)]),
            },
        ])
    }

    fn kneel() -> ImportedClip {
        let mut knee = BoneChannel::new("knee");
        knee.rotations = Track::from_keys([
            (0.0, Quat::IDENTITY),
            (12.0, Quat::from_rotation_x(1.0)),
        ]);
        let mut pole = BoneChannel::new("pole");
        pole.positions = Track::from_keys([(0.0, Vec3::ZERO), (12.0, Vec3::ONE)]);

        ImportedClip {
            name: "kneel".to_string(),
            duration_ticks: 24.0,
            ticks_per_second: 0.0,
            channels: vec![knee, pole],
        }
    }

    #[test]
    fn no_meshes() {
        assert!(matches!(
            ModelAsset::from_scene(&scene(vec![], vec![]), &AnimationSettings::default()),
            Err(AssetError::NoMeshes(name)) if name == "soldier.glb"
        ));
    }

    #[test]
    fn mesh_without_positions() {
        let mesh = ImportedMesh {
            name: "broken".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ModelAsset::from_scene(&scene(vec![mesh], vec![]), &AnimationSettings::default()),
            Err(AssetError::MissingMeshData { data: "positions", .. })
        ));
    }

    #[test]
    fn out_of_range_indices() {
        let mut mesh = triangle(vec![]);
        mesh.indices = vec![0, 1, 3];
        assert!(
            ModelAsset::from_scene(&scene(vec![mesh], vec![]), &AnimationSettings::default())
                .is_err()
        );
    }

    #[test]
    fn static_model() {
        let model =
            ModelAsset::from_scene(&scene(vec![triangle(vec![])], vec![kneel()]), &AnimationSettings::default())
                .unwrap();

        assert!(!model.is_animated());
        let mesh = &model.meshes[0];
        // Texture coordinates do not cover every vertex and are ignored.
        assert_eq!(
            mesh.attributes,
            VertexAttributes::POSITION | VertexAttributes::NORMAL
        );
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[1].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn skinned_model() {
        let model = ModelAsset::from_scene(
            &scene(vec![skinned_triangle()], vec![kneel()]),
            &AnimationSettings::default(),
        )
        .unwrap();

        let rig = model.rig.as_ref().unwrap();
        // Armature, hip, knee. The control node and its child are not bones.
        assert_eq!(rig.skeleton.bone_count(), 3);
        assert!(!rig.name_lookup.contains_key("pole"));
        assert_eq!(
            rig.skeleton.bones()[2].bone_offset,
            Mat4::from_translation(Vec3::Y)
        );
        assert!(
            rig.inverse_global_transformation
                .abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0)), 1e-6)
        );

        let clip = rig.animations.get(0).unwrap();
        assert_eq!(clip.ticks_per_second, 24.0);
        assert_eq!(clip.duration, 1.0);
        assert!(clip.animation_nodes.iter().all(|node| node.bones.len() == 3));

        let mesh = &model.meshes[0];
        assert!(mesh.attributes.contains(VertexAttributes::JOINTS | VertexAttributes::WEIGHTS));
        assert_eq!(mesh.vertex_layout, mesh.attributes.vertex_buffer_layout());
        assert_eq!(
            mesh.vertex_layout.attributes.len(),
            mesh.attributes.iter().count()
        );
        assert_eq!(mesh.vertices[0].joints, [1, 0, 0, 0]);
        assert_eq!(mesh.vertices[0].weights, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[1].joints, [1, 2, 0, 0]);
        assert_eq!(mesh.vertices[1].weights, [0.5, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn extra_influences_are_dropped() {
        let bones = (0..6)
            .map(|i| MeshBone {
                name: if i % 2 == 0 { "hip" } else { "knee" }.to_string(),
                offset: Mat4::IDENTITY,
                weights: weights(&[(0, 0.1 * (i + 1) as f32)]),
            })
            .collect();

        let model = ModelAsset::from_scene(&scene(vec![triangle(bones)], vec![]), &AnimationSettings::default())
            .unwrap();

        let vertex = &model.meshes[0].vertices[0];
        assert_eq!(vertex.joints, [1, 2, 1, 2]);
        assert!(vertex.weights.iter().all(|w| *w > 0.0));
    }

    #[test]
    fn failed_skeleton_yields_static_model() {
        let settings = AnimationSettings {
            // Every node becomes a bone, there is no control node to prune.
            control_node_marker: String::new(),
            ..Default::default()
        };

        let mut root = SceneNode::new("root", Mat4::IDENTITY);
        for i in 0..60 {
            root = root.with_child(SceneNode::new(format!("bone_{i}"), Mat4::IDENTITY));
        }
        let mut scene = scene(vec![skinned_triangle()], vec![kneel()]);
        scene.root = root;

        let model = ModelAsset::from_scene(&scene, &settings).unwrap();
        assert!(model.rig.is_none());
        assert_eq!(model.meshes.len(), 1);
        assert!(!model.meshes[0].attributes.contains(VertexAttributes::JOINTS));
    }

    #[test]
    fn instantiate_plays_default_clip() {
        let settings = AnimationSettings {
            default_clip: 1,
            ..Default::default()
        };
        let mut idle = kneel();
        idle.name = "idle".to_string();

        let model =
            ModelAsset::from_scene(&scene(vec![skinned_triangle()], vec![kneel(), idle]), &settings)
                .unwrap();
        let rig = model.rig.as_ref().unwrap();

        let mut character = rig.instantiate(Pose::IDENTITY);
        assert_eq!(character.animation_data.current_animation_index, 1);
        assert_eq!(character.skinning_matrices().len(), 3);

        character.advance_animation(0.25);
        assert_eq!(character.animation_data.current_ticks, 6.0);
    }
}
