use nalgebra::{Matrix4, Quaternion, Translation3, UnitQuaternion, Vector3};

use super::{MeshData, NodeId, RotationOrder, SceneSource, SkinBinding};
use crate::curve::Track;

/// One node of an in-memory scene tree.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub is_joint: bool,
    pub rotation_order: RotationOrder,
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
    pub translation_track: Option<Track<Vector3<f64>>>,
    pub rotation_track: Option<Track<Quaternion<f64>>>,
    pub scale_track: Option<Track<Vector3<f64>>>,
}

impl SceneNode {
    fn new(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            parent,
            children: Vec::new(),
            is_joint: false,
            rotation_order: RotationOrder::default(),
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            translation_track: None,
            rotation_track: None,
            scale_track: None,
        }
    }

    /// Local transform (translation * rotation * scale) at `time`.
    pub fn local_transform(&self, time: Option<f64>) -> Matrix4<f64> {
        let (translation, rotation, scale) = match time {
            Some(time) => (
                self.translation_track
                    .as_ref()
                    .map_or(self.translation, |track| track.sample(time)),
                self.rotation_track
                    .as_ref()
                    .map_or(self.rotation, |track| {
                        UnitQuaternion::new_normalize(track.sample(time))
                    }),
                self.scale_track
                    .as_ref()
                    .map_or(self.scale, |track| track.sample(time)),
            ),
            None => (self.translation, self.rotation, self.scale),
        };

        Translation3::from(translation).to_homogeneous()
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&scale)
    }
}

/// In-memory scene: a rooted node tree plus the first mesh and its skin.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    mesh: Option<MeshData>,
    skin: Option<SkinBinding>,
}

impl SceneGraph {
    /// Creates a scene holding only a root node.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![SceneNode::new(root_name, None)],
            mesh: None,
            skin: None,
        }
    }

    /// Appends a plain (non-joint) node under `parent`.
    pub fn add_node(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(SceneNode::new(name, Some(parent)));
        self.nodes[parent].children.push(id);
        id
    }

    /// Appends a node carrying the joint marker under `parent`.
    pub fn add_joint(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = self.add_node(parent, name);
        self.nodes[id].is_joint = true;
        id
    }

    pub fn node(&self, node: NodeId) -> &SceneNode {
        &self.nodes[node]
    }

    pub fn node_mut(&mut self, node: NodeId) -> &mut SceneNode {
        &mut self.nodes[node]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|node| node.name == name)
    }

    pub fn set_mesh(&mut self, mesh: MeshData) {
        self.mesh = Some(mesh);
    }

    pub fn set_skin(&mut self, skin: SkinBinding) {
        self.skin = Some(skin);
    }
}

impl SceneSource for SceneGraph {
    fn root(&self) -> NodeId {
        0
    }

    fn node_name(&self, node: NodeId) -> &str {
        &self.nodes[node].name
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    fn is_joint(&self, node: NodeId) -> bool {
        self.nodes[node].is_joint
    }

    fn rotation_order(&self, node: NodeId) -> RotationOrder {
        self.nodes[node].rotation_order
    }

    fn global_transform(&self, node: NodeId, time: Option<f64>) -> Matrix4<f64> {
        let mut global = self.nodes[node].local_transform(time);
        let mut current = self.nodes[node].parent;
        while let Some(parent) = current {
            global = self.nodes[parent].local_transform(time) * global;
            current = self.nodes[parent].parent;
        }
        global
    }

    fn has_animation_curve(&self, node: NodeId) -> bool {
        let node = &self.nodes[node];
        node.translation_track.is_some() || node.rotation_track.is_some()
    }

    fn first_mesh(&self) -> Option<&MeshData> {
        self.mesh.as_ref()
    }

    fn first_skin(&self) -> Option<&SkinBinding> {
        self.skin.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Interpolation;

    #[test]
    fn given_nested_translations_when_evaluating_global_then_offsets_accumulate() {
        let mut scene = SceneGraph::new("root");
        let hips = scene.add_joint(0, "hips");
        let spine = scene.add_joint(hips, "spine");
        scene.node_mut(hips).translation = Vector3::new(0.0, 1.0, 0.0);
        scene.node_mut(spine).translation = Vector3::new(0.0, 0.5, 0.0);

        let global = scene.global_transform(spine, None);
        assert!((global[(1, 3)] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn given_translation_track_when_evaluating_then_static_and_animated_poses_differ() {
        let mut scene = SceneGraph::new("root");
        let hips = scene.add_joint(0, "hips");
        scene.node_mut(hips).translation_track = Track::new(
            vec![0.0, 1.0],
            vec![Vector3::zeros(), Vector3::new(2.0, 0.0, 0.0)],
            Interpolation::Linear,
        );

        assert!(scene.has_animation_curve(hips));
        assert_eq!(scene.global_transform(hips, None)[(0, 3)], 0.0);
        assert!((scene.global_transform(hips, Some(0.5))[(0, 3)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn given_scale_track_only_when_checking_curves_then_node_is_not_animated() {
        let mut scene = SceneGraph::new("root");
        let hips = scene.add_joint(0, "hips");
        scene.node_mut(hips).scale_track = Some(Track::constant(Vector3::new(2.0, 2.0, 2.0)));

        assert!(!scene.has_animation_curve(hips));
    }
}
