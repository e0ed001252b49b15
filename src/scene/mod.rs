//! Scene-file collaborators.
//!
//! The consolidation core only talks to scenes through [`SceneSource`], and
//! to files through [`SceneImporter`]. [`SceneGraph`] is the in-memory node
//! tree shared by every importer shipped with the crate.

mod gltf_loader;
mod graph;

use std::path::Path;

use nalgebra::{Matrix3xX, Matrix4};
use serde::{Deserialize, Serialize};

pub use gltf_loader::GltfImporter;
pub use graph::{SceneGraph, SceneNode};

/// Index of a node inside one scene.
pub type NodeId = usize;

/// Euler axis sequence used to decompose a joint rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RotationOrder {
    #[default]
    Xyz,
    Xzy,
    Yzx,
    Yxz,
    Zxy,
    Zyx,
}

impl RotationOrder {
    /// Axis indices (0 = x, 1 = y, 2 = z) in application order.
    pub fn axes(self) -> [usize; 3] {
        match self {
            RotationOrder::Xyz => [0, 1, 2],
            RotationOrder::Xzy => [0, 2, 1],
            RotationOrder::Yzx => [1, 2, 0],
            RotationOrder::Yxz => [1, 0, 2],
            RotationOrder::Zxy => [2, 0, 1],
            RotationOrder::Zyx => [2, 1, 0],
        }
    }
}

/// Raw geometry of the first mesh in a scene.
#[derive(Debug, Clone)]
pub struct MeshData {
    /// Control points, one column per vertex, in mesh space.
    pub positions: Matrix3xX<f64>,
    /// Polygons as ordered vertex-index lists.
    pub polygons: Vec<Vec<usize>>,
    /// Global transform of the node carrying the mesh, at load time.
    pub global_transform: Matrix4<f64>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.ncols()
    }
}

/// One joint's binding inside a skin.
#[derive(Debug, Clone)]
pub struct SkinCluster {
    /// Name of the joint node this cluster is linked to.
    pub joint: String,
    /// Geometry transform stored when the skin was bound.
    pub bind_matrix: Matrix4<f64>,
    /// Joint global transform stored when the skin was bound, if the format keeps one.
    pub link_matrix: Option<Matrix4<f64>>,
    /// `(vertex index, weight)` pairs influenced by the joint.
    pub influences: Vec<(usize, f64)>,
}

/// A skin deformer bound to the first mesh.
#[derive(Debug, Clone, Default)]
pub struct SkinBinding {
    pub clusters: Vec<SkinCluster>,
}

impl SkinBinding {
    pub fn joint_names(&self) -> impl Iterator<Item = &str> {
        self.clusters.iter().map(|cluster| cluster.joint.as_str())
    }
}

/// Read access to one loaded scene.
pub trait SceneSource {
    fn root(&self) -> NodeId;
    fn node_name(&self, node: NodeId) -> &str;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> &[NodeId];
    fn is_joint(&self, node: NodeId) -> bool;
    fn rotation_order(&self, node: NodeId) -> RotationOrder;

    /// Global transform of `node` at `time` seconds; `None` evaluates the
    /// static pose stored in the file.
    fn global_transform(&self, node: NodeId, time: Option<f64>) -> Matrix4<f64>;

    /// True when the node's rotation or translation is driven by a curve.
    fn has_animation_curve(&self, node: NodeId) -> bool;

    fn first_mesh(&self) -> Option<&MeshData>;
    fn first_skin(&self) -> Option<&SkinBinding>;
}

/// Opens scene files. Any failure is terminal for the whole load.
pub trait SceneImporter {
    type Scene: SceneSource;

    fn open(&mut self, path: &Path) -> anyhow::Result<Self::Scene>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_every_rotation_order_when_mapped_then_axes_form_a_permutation() {
        let orders = [
            RotationOrder::Xyz,
            RotationOrder::Xzy,
            RotationOrder::Yzx,
            RotationOrder::Yxz,
            RotationOrder::Zxy,
            RotationOrder::Zyx,
        ];

        for order in orders {
            let mut axes = order.axes();
            axes.sort_unstable();
            assert_eq!(axes, [0, 1, 2]);
        }
        assert_eq!(RotationOrder::Zxy.axes(), [2, 0, 1]);
        assert_eq!(RotationOrder::Yzx.axes(), [1, 2, 0]);
    }
}
