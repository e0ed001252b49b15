use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use anyhow::{Context, Result, bail};
use gltf::{
    Document,
    animation::{Property, util::ReadOutputs},
    mesh::Mode,
};
use log::debug;
use nalgebra::{Matrix3xX, Matrix4, Quaternion, UnitQuaternion, Vector3};

use super::{MeshData, NodeId, SceneGraph, SceneImporter, SceneSource, SkinBinding, SkinCluster};
use crate::curve::{Interpolation, Keyable, Track};

/// Name given to the synthetic node that parents the scene's root nodes.
const SCENE_ROOT_NAME: &str = "RootNode";

/// Reads `.gltf` / `.glb` files into a [`SceneGraph`].
///
/// Joints are the nodes referenced by any skin. Keyframe tracks are taken
/// from the animation clip at index `animation`, when the file has one.
#[derive(Debug, Clone, Copy, Default)]
pub struct GltfImporter {
    pub animation: usize,
}

impl GltfImporter {
    pub fn new(animation: usize) -> Self {
        Self { animation }
    }
}

impl SceneImporter for GltfImporter {
    type Scene = SceneGraph;

    fn open(&mut self, path: &Path) -> Result<SceneGraph> {
        let (document, buffers, _) = gltf::import(path)
            .with_context(|| format!("failed to read glTF: {}", path.display()))?;
        build_scene(&document, &buffers, self.animation)
            .with_context(|| format!("failed to build scene from glTF: {}", path.display()))
    }
}

fn build_scene(
    document: &Document,
    buffers: &[gltf::buffer::Data],
    animation: usize,
) -> Result<SceneGraph> {
    let joint_nodes: HashSet<usize> = document
        .skins()
        .flat_map(|skin| skin.joints().map(|joint| joint.index()).collect::<Vec<_>>())
        .collect();

    let mut scene = SceneGraph::new(SCENE_ROOT_NAME);
    let mut node_ids = HashMap::<usize, NodeId>::new();
    let mut first_mesh_node = None;

    let Some(gltf_scene) = document
        .default_scene()
        .or_else(|| document.scenes().next())
    else {
        return Ok(scene);
    };

    let mut stack: Vec<(gltf::Node, NodeId)> = gltf_scene
        .nodes()
        .map(|node| (node, scene.root()))
        .collect();
    stack.reverse();

    while let Some((node, parent)) = stack.pop() {
        let name = node
            .name()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let id = scene.add_node(parent, name);

        let (translation, rotation, scale) = node.transform().decomposed();
        let scene_node = scene.node_mut(id);
        scene_node.is_joint = joint_nodes.contains(&node.index());
        scene_node.translation = vector3(translation);
        scene_node.rotation = UnitQuaternion::new_normalize(quaternion(rotation));
        scene_node.scale = vector3(scale);

        node_ids.insert(node.index(), id);
        if first_mesh_node.is_none() && node.mesh().is_some() {
            first_mesh_node = Some((node.clone(), id));
        }

        let mut children: Vec<_> = node.children().map(|child| (child, id)).collect();
        children.reverse();
        stack.extend(children);
    }

    if let Some(clip) = document.animations().nth(animation) {
        load_animation_tracks(&mut scene, &clip, buffers, &node_ids)?;
    }

    if let Some((node, id)) = first_mesh_node {
        let Some(mesh) = node.mesh() else {
            return Ok(scene);
        };
        let global_transform = scene.global_transform(id, None);
        let (mesh_data, influences) = read_mesh(&mesh, buffers, global_transform)?;

        if let Some(skin) = node.skin() {
            let binding = read_skin(&skin, buffers, &node_ids, &scene, influences)?;
            scene.set_skin(binding);
        }
        scene.set_mesh(mesh_data);
    }

    Ok(scene)
}

/// Per-vertex joint influences read from `JOINTS_0` / `WEIGHTS_0`, grouped by skin slot.
type SlotInfluences = Vec<Vec<(usize, f64)>>;

fn read_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    global_transform: Matrix4<f64>,
) -> Result<(MeshData, SlotInfluences)> {
    let mut points = Vec::<Vector3<f64>>::new();
    let mut polygons = Vec::<Vec<usize>>::new();
    let mut influences: SlotInfluences = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != Mode::Triangles {
            debug!(
                "skipping primitive {} of mesh {:?}: mode {:?}",
                primitive.index(),
                mesh.name(),
                primitive.mode()
            );
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
        let Some(positions) = reader.read_positions() else {
            continue;
        };

        let base = points.len();
        points.extend(positions.map(vector3));
        let vertex_count = points.len() - base;

        let indices: Vec<usize> = match reader.read_indices() {
            Some(indices) => indices.into_u32().map(|index| index as usize).collect(),
            None => (0..vertex_count).collect(),
        };
        for triangle in indices.chunks_exact(3) {
            polygons.push(triangle.iter().map(|index| base + index).collect());
        }

        if let (Some(joints), Some(weights)) = (reader.read_joints(0), reader.read_weights(0)) {
            for (vertex, (slots, lanes)) in joints.into_u16().zip(weights.into_f32()).enumerate() {
                for (slot, weight) in slots.into_iter().zip(lanes) {
                    if weight <= 0.0 {
                        continue;
                    }
                    let slot = slot as usize;
                    if influences.len() <= slot {
                        influences.resize_with(slot + 1, Vec::new);
                    }
                    let entries = &mut influences[slot];
                    match entries.last_mut() {
                        Some((last, total)) if *last == base + vertex => *total += weight as f64,
                        _ => entries.push((base + vertex, weight as f64)),
                    }
                }
            }
        }
    }

    let positions = if points.is_empty() {
        Matrix3xX::zeros(0)
    } else {
        Matrix3xX::from_columns(&points)
    };
    let mesh_data = MeshData {
        positions,
        polygons,
        global_transform,
    };
    Ok((mesh_data, influences))
}

fn read_skin(
    skin: &gltf::Skin,
    buffers: &[gltf::buffer::Data],
    node_ids: &HashMap<usize, NodeId>,
    scene: &SceneGraph,
    mut influences: SlotInfluences,
) -> Result<SkinBinding> {
    let joints: Vec<gltf::Node> = skin.joints().collect();
    if influences.len() > joints.len() {
        bail!(
            "skin {} references joint slot {} but only binds {} joints",
            skin.index(),
            influences.len() - 1,
            joints.len()
        );
    }
    influences.resize_with(joints.len(), Vec::new);

    let reader = skin.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
    let link_matrices: Vec<Option<Matrix4<f64>>> = match reader.read_inverse_bind_matrices() {
        Some(matrices) => matrices
            .map(|columns| matrix4(columns).try_inverse())
            .collect(),
        None => vec![None; joints.len()],
    };

    let clusters = joints
        .iter()
        .zip(influences)
        .enumerate()
        .map(|(slot, (joint, influences))| -> Result<SkinCluster> {
            let id = node_ids.get(&joint.index()).copied().with_context(|| {
                format!("skin joint node {} is not part of the scene", joint.index())
            })?;
            Ok(SkinCluster {
                joint: scene.node_name(id).to_string(),
                bind_matrix: Matrix4::identity(),
                link_matrix: link_matrices.get(slot).copied().flatten(),
                influences,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SkinBinding { clusters })
}

fn load_animation_tracks(
    scene: &mut SceneGraph,
    clip: &gltf::Animation,
    buffers: &[gltf::buffer::Data],
    node_ids: &HashMap<usize, NodeId>,
) -> Result<()> {
    for channel in clip.channels() {
        let target = channel.target();
        let Some(id) = node_ids.get(&target.node().index()).copied() else {
            continue;
        };

        let interpolation = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        };

        let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
        let Some(inputs) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f64> = inputs.map(f64::from).collect();
        let Some(outputs) = reader.read_outputs() else {
            continue;
        };

        let node = scene.node_mut(id);
        match (target.property(), outputs) {
            (Property::Translation, ReadOutputs::Translations(values)) => {
                node.translation_track =
                    Some(make_track(times, values.map(vector3).collect(), interpolation)?);
            }
            (Property::Rotation, ReadOutputs::Rotations(values)) => {
                node.rotation_track = Some(make_track(
                    times,
                    values.into_f32().map(quaternion).collect(),
                    interpolation,
                )?);
            }
            (Property::Scale, ReadOutputs::Scales(values)) => {
                node.scale_track =
                    Some(make_track(times, values.map(vector3).collect(), interpolation)?);
            }
            _ => {}
        }
    }

    Ok(())
}

fn make_track<T: Keyable>(
    times: Vec<f64>,
    values: Vec<T>,
    interpolation: Interpolation,
) -> Result<Track<T>> {
    let key_count = times.len();
    let value_count = values.len();
    Track::new(times, values, interpolation).with_context(|| {
        format!(
            "malformed animation channel: {} keys, {} values ({:?})",
            key_count, value_count, interpolation
        )
    })
}

fn vector3(v: [f32; 3]) -> Vector3<f64> {
    Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64)
}

/// glTF stores quaternions as `[x, y, z, w]`.
fn quaternion(q: [f32; 4]) -> Quaternion<f64> {
    Quaternion::new(q[3] as f64, q[0] as f64, q[1] as f64, q[2] as f64)
}

/// glTF stores matrices column-major.
fn matrix4(columns: [[f32; 4]; 4]) -> Matrix4<f64> {
    Matrix4::from_fn(|row, column| columns[column][row] as f64)
}
