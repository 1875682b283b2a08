use std::path::{Path, PathBuf};

use ahash::{HashMap, HashMapExt};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use gltf::animation::{Interpolation, util::ReadOutputs};

use super::{
    AssetError, BoneChannel, ImportedClip, ImportedMesh, ImportedScene, MeshBone, SceneNode,
    VertexWeight,
};

/// glTF key times are in seconds; they are stored as milliseconds ticks.
pub const GLTF_TICKS_PER_SECOND: f64 = 1000.0;

/// Name of the node inserted above the scene's nodes when a scene has more than one root.
pub const SCENE_ROOT_NAME: &str = "<scene root>";

pub fn import_gltf(path: &Path) -> Result<ImportedScene, AssetError> {
    let (document, buffers, _images) = gltf::import(path).map_err(|err| match err {
        gltf::Error::Io(err) => AssetError::from_io_error(err, path),
        err => AssetError::Decode(path.to_path_buf(), err.to_string()),
    })?;

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    convert_document(name, &document, &buffers)
}

pub fn import_gltf_slice(name: &str, data: &[u8]) -> Result<ImportedScene, AssetError> {
    let (document, buffers, _images) = gltf::import_slice(data)
        .map_err(|err| AssetError::Decode(PathBuf::from(name), err.to_string()))?;

    convert_document(name.to_string(), &document, &buffers)
}

fn convert_document(
    name: String,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Result<ImportedScene, AssetError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| AssetError::Decode(PathBuf::from(&name), "no scenes".to_string()))?;

    let mut roots = scene.nodes().map(convert_node).collect::<Vec<_>>();
    let root = if roots.len() == 1 {
        roots.remove(0)
    } else {
        SceneNode {
            name: SCENE_ROOT_NAME.to_string(),
            transform: Mat4::IDENTITY,
            children: roots,
        }
    };

    let mut meshes = Vec::new();
    for node in document.nodes() {
        let Some(mesh) = node.mesh() else {
            continue;
        };

        let skin = node.skin().map(|skin| read_skin(&skin, buffers));

        for primitive in mesh.primitives() {
            meshes.push(read_primitive(&mesh, &primitive, skin.as_ref(), buffers)?);
        }
    }

    let clips = document
        .animations()
        .map(|animation| read_animation(&animation, buffers))
        .collect::<Vec<_>>();

    tracing::info!(
        "Imported {name}: {} nodes, {} meshes, {} clips",
        root.node_count(),
        meshes.len(),
        clips.len()
    );

    Ok(ImportedScene {
        name,
        root,
        meshes,
        clips,
    })
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

fn convert_node(node: gltf::Node) -> SceneNode {
    SceneNode {
        name: node_name(&node),
        transform: Mat4::from_cols_array_2d(&node.transform().matrix()),
        children: node.children().map(convert_node).collect(),
    }
}

/// Joint names and inverse bind matrices of a skin, in joint order.
struct Skin {
    joints: Vec<(String, Mat4)>,
}

fn read_skin(skin: &gltf::Skin, buffers: &[gltf::buffer::Data]) -> Skin {
    let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));

    let inverse_bind_matrices = reader
        .read_inverse_bind_matrices()
        .map(|matrices| {
            matrices
                .map(|m| Mat4::from_cols_array_2d(&m))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let joints = skin
        .joints()
        .enumerate()
        .map(|(i, joint)| {
            let offset = inverse_bind_matrices
                .get(i)
                .copied()
                .unwrap_or(Mat4::IDENTITY);
            (node_name(&joint), offset)
        })
        .collect();

    Skin { joints }
}

fn read_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    skin: Option<&Skin>,
    buffers: &[gltf::buffer::Data],
) -> Result<ImportedMesh, AssetError> {
    let name = format!(
        "{}_{}",
        mesh.name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh_{}", mesh.index())),
        primitive.index()
    );

    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions = reader
        .read_positions()
        .map(|iter| iter.map(Vec3::from).collect::<Vec<_>>())
        .ok_or_else(|| AssetError::MissingMeshData {
            mesh: name.clone(),
            data: "positions",
        })?;

    let normals = reader
        .read_normals()
        .map(|iter| iter.map(Vec3::from).collect::<Vec<_>>());

    let colors = reader
        .read_colors(0)
        .map(|iter| iter.into_rgba_f32().map(Vec4::from).collect());

    let tex_coords = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().map(Vec2::from).collect());

    // glTF stores the bitangent sign in the tangent's w component.
    let (tangents, bitangents) = match (reader.read_tangents(), normals.as_ref()) {
        (Some(tangents), Some(normals)) => {
            let tangents = tangents.map(Vec4::from).collect::<Vec<_>>();
            let bitangents = tangents
                .iter()
                .zip(normals.iter())
                .map(|(t, n)| n.cross(t.truncate()) * t.w)
                .collect();
            (
                Some(tangents.iter().map(|t| t.truncate()).collect()),
                Some(bitangents),
            )
        }
        (Some(tangents), None) => (Some(tangents.map(|t| Vec4::from(t).truncate()).collect()), None),
        _ => (None, None),
    };

    let indices = reader
        .read_indices()
        .map(|iter| iter.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    let bones = match skin {
        Some(skin) => {
            let joints = reader
                .read_joints(0)
                .map(|iter| iter.into_u16().collect::<Vec<_>>())
                .unwrap_or_default();
            let weights = reader
                .read_weights(0)
                .map(|iter| iter.into_f32().collect::<Vec<_>>())
                .unwrap_or_default();

            if reader.read_joints(1).is_some() {
                tracing::debug!("{name}: only the first joint set is used.");
            }

            collect_bone_weights(skin, &joints, &weights)
        }
        None => Vec::default(),
    };

    Ok(ImportedMesh {
        name,
        positions,
        normals,
        colors,
        tex_coords,
        tangents,
        bitangents,
        indices,
        bones,
    })
}

/// Turn per-vertex joint/weight sets into per-bone vertex weight lists.
fn collect_bone_weights(skin: &Skin, joints: &[[u16; 4]], weights: &[[f32; 4]]) -> Vec<MeshBone> {
    let mut bones = skin
        .joints
        .iter()
        .map(|(name, offset)| MeshBone {
            name: name.clone(),
            offset: *offset,
            weights: Vec::default(),
        })
        .collect::<Vec<_>>();

    for (vertex, (joints, weights)) in joints.iter().zip(weights.iter()).enumerate() {
        for (joint, weight) in joints.iter().zip(weights.iter()) {
            if *weight <= 0.0 {
                continue;
            }
            match bones.get_mut(*joint as usize) {
                Some(bone) => bone.weights.push(VertexWeight {
                    vertex: vertex as u32,
                    weight: *weight,
                }),
                None => tracing::warn!("Vertex {vertex} references missing joint {joint}"),
            }
        }
    }

    bones
}

/// Ticks before the next key at which a step key stops holding its value.
const STEP_HOLD_TICKS: f64 = 1.0e-3;

/// Pair key times with their output values. Tracks are always interpolated linearly, so cubic
/// splines keep only their values (outputs are in tangent, value, out tangent triplets) and step
/// keys get an extra key just before the next one that holds the previous value.
fn channel_keys<V: Copy>(
    times: &[f64],
    values: impl Iterator<Item = V>,
    interpolation: Interpolation,
) -> Vec<(f64, V)> {
    let (skip, step) = match interpolation {
        Interpolation::CubicSpline => (1, 3),
        Interpolation::Linear | Interpolation::Step => (0, 1),
    };

    let keys = times
        .iter()
        .copied()
        .zip(values.skip(skip).step_by(step))
        .collect::<Vec<_>>();

    if interpolation != Interpolation::Step {
        return keys;
    }

    let mut held = Vec::with_capacity(keys.len() * 2);
    for (i, &(time, value)) in keys.iter().enumerate() {
        if let Some(&(previous_time, previous)) = i.checked_sub(1).and_then(|p| keys.get(p)) {
            let hold_time = time - STEP_HOLD_TICKS;
            if hold_time > previous_time {
                held.push((hold_time, previous));
            }
        }
        held.push((time, value));
    }
    held
}

fn read_animation(animation: &gltf::Animation, buffers: &[gltf::buffer::Data]) -> ImportedClip {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));

    let mut channels: Vec<BoneChannel> = Vec::new();
    let mut lookup: HashMap<String, usize> = HashMap::new();
    let mut duration_ticks = 0.0_f64;

    for channel in animation.channels() {
        let bone_name = node_name(&channel.target().node());
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));

        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times = inputs
            .map(|t| t as f64 * GLTF_TICKS_PER_SECOND)
            .collect::<Vec<_>>();

        if let Some(last) = times.last() {
            duration_ticks = duration_ticks.max(*last);
        }

        let Some(outputs) = reader.read_outputs() else {
            continue;
        };

        let interpolation = channel.sampler().interpolation();
        if interpolation == Interpolation::Step {
            tracing::debug!("{name}: holding step keys of {bone_name}");
        }

        let index = *lookup.entry(bone_name.clone()).or_insert_with(|| {
            channels.push(BoneChannel::new(bone_name.clone()));
            channels.len() - 1
        });
        let bone_channel = &mut channels[index];

        match outputs {
            ReadOutputs::Translations(values) => {
                for (time, value) in channel_keys(&times, values.map(Vec3::from), interpolation) {
                    bone_channel.positions.insert(time, value);
                }
            }
            ReadOutputs::Rotations(values) => {
                let values = values
                    .into_f32()
                    .map(|value| Quat::from_array(value).normalize());
                for (time, value) in channel_keys(&times, values, interpolation) {
                    bone_channel.rotations.insert(time, value);
                }
            }
            ReadOutputs::Scales(values) => {
                for (time, value) in channel_keys(&times, values.map(Vec3::from), interpolation) {
                    bone_channel.scales.insert(time, value);
                }
            }
            ReadOutputs::MorphTargetWeights(_) => {
                tracing::debug!("{name}: skipping morph target weights for {bone_name}");
            }
        }
    }

    ImportedClip {
        name,
        duration_ticks,
        ticks_per_second: GLTF_TICKS_PER_SECOND,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_skin() -> Skin {
        Skin {
            joints: vec![
                ("hip".to_string(), Mat4::IDENTITY),
                ("knee".to_string(), Mat4::from_translation(Vec3::NEG_Y)),
            ],
        }
    }

    #[test]
    fn bone_weights_are_grouped_per_joint() {
        let joints = [[0, 1, 0, 0], [1, 0, 0, 0]];
        let weights = [[0.75, 0.25, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]];

        let bones = collect_bone_weights(&test_skin(), &joints, &weights);

        assert_eq!(bones.len(), 2);
        assert_eq!(bones[0].name, "hip");
        assert_eq!(
            bones[0].weights,
            vec![VertexWeight {
                vertex: 0,
                weight: 0.75
            }]
        );
        assert_eq!(bones[1].offset, Mat4::from_translation(Vec3::NEG_Y));
        assert_eq!(
            bones[1].weights,
            vec![
                VertexWeight {
                    vertex: 0,
                    weight: 0.25
                },
                VertexWeight {
                    vertex: 1,
                    weight: 1.0
                }
            ]
        );
    }

    #[test]
    fn missing_joints_are_skipped() {
        let bones = collect_bone_weights(&test_skin(), &[[5, 0, 0, 0]], &[[1.0, 0.0, 0.0, 0.0]]);
        assert!(bones.iter().all(|bone| bone.weights.is_empty()));
    }

    #[test]
    fn step_keys_hold_until_the_next_key() {
        let keys = channel_keys(
            &[0.0, 100.0, 200.0],
            [1.0_f32, 2.0, 3.0].into_iter(),
            Interpolation::Step,
        );

        assert_eq!(
            keys,
            vec![
                (0.0, 1.0),
                (100.0 - STEP_HOLD_TICKS, 1.0),
                (100.0, 2.0),
                (200.0 - STEP_HOLD_TICKS, 2.0),
                (200.0, 3.0),
            ]
        );
    }

    #[test]
    fn cubic_spline_keeps_values_only() {
        // (in tangent, value, out tangent) per key.
        let outputs = [9.0_f32, 1.0, 9.0, 9.0, 2.0, 9.0];
        let keys = channel_keys(&[0.0, 50.0], outputs.into_iter(), Interpolation::CubicSpline);
        assert_eq!(keys, vec![(0.0, 1.0), (50.0, 2.0)]);

        let keys = channel_keys(&[0.0, 50.0], [4.0_f32, 5.0].into_iter(), Interpolation::Linear);
        assert_eq!(keys, vec![(0.0, 4.0), (50.0, 5.0)]);
    }

    #[test]
    fn invalid_data_is_a_decode_error() {
        assert!(matches!(
            import_gltf_slice("broken.glb", b"definitely not gltf"),
            Err(AssetError::Decode(..))
        ));
    }
}
