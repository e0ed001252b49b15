use log::debug;
use nalgebra::Matrix4;

use super::types::{ParentLink, SubjectSkeleton};
use crate::correction::{ancestor_correction, matrices_match};
use crate::error::{Result, RigError};
use crate::scene::{NodeId, SceneSource, SkinBinding};

/// A joint node reached by the scene traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointNode {
    pub node: NodeId,
    /// Nearest ancestor carrying the joint marker.
    pub joint_parent: Option<NodeId>,
}

/// Walks the scene depth-first, in pre-order, and returns every joint node
/// with its nearest joint ancestor. Non-joint nodes are traversed but skipped.
pub fn collect_joint_nodes<S: SceneSource + ?Sized>(scene: &S) -> Vec<JointNode> {
    let mut joints = Vec::new();
    let mut stack: Vec<(NodeId, Option<NodeId>)> = vec![(scene.root(), None)];

    while let Some((node, nearest_joint)) = stack.pop() {
        let inherited = if scene.is_joint(node) {
            joints.push(JointNode {
                node,
                joint_parent: nearest_joint,
            });
            Some(node)
        } else {
            nearest_joint
        };

        for &child in scene.children(node).iter().rev() {
            stack.push((child, inherited));
        }
    }

    joints
}

/// Fails when the skin's clusters do not all share one geometry bind matrix.
pub fn check_single_bind_pose(skin: &SkinBinding, subject: usize) -> Result<()> {
    for (first, pair) in skin.clusters.windows(2).enumerate() {
        if !matrices_match(&pair[0].bind_matrix, &pair[1].bind_matrix) {
            return Err(RigError::MultipleBindPoses {
                subject,
                first,
                second: first + 1,
            });
        }
    }
    Ok(())
}

/// Resolves one subject's skeleton: joint order, parents, bind transforms,
/// ancestor corrections and rotation orders.
///
/// With a skin, the skin's cluster order is the joint order and the traversal
/// must find exactly as many joints. Without one, the traversal order is used.
pub fn resolve_skeleton<S: SceneSource + ?Sized>(
    scene: &S,
    skin: Option<&SkinBinding>,
    subject: usize,
) -> Result<SubjectSkeleton> {
    let traversal = collect_joint_nodes(scene);

    let mut skeleton = match skin {
        Some(skin) => {
            check_single_bind_pose(skin, subject)?;
            if traversal.len() != skin.clusters.len() {
                return Err(RigError::JointCountMismatch {
                    subject,
                    scene: traversal.len(),
                    skin: skin.clusters.len(),
                });
            }
            if let Some(cluster) = skin.clusters.iter().position(|c| c.joint.is_empty()) {
                return Err(RigError::UnnamedSkinJoint { subject, cluster });
            }

            let mut skeleton =
                SubjectSkeleton::new(skin.joint_names().map(ToOwned::to_owned).collect());
            for (index, cluster) in skin.clusters.iter().enumerate() {
                skeleton.binds[index] = cluster.link_matrix;
            }
            skeleton
        }
        None => SubjectSkeleton::new(
            traversal
                .iter()
                .map(|joint| scene.node_name(joint.node).to_string())
                .collect(),
        ),
    };

    for joint in &traversal {
        let name = scene.node_name(joint.node);
        let Some(index) = skeleton.index_of(name) else {
            debug!("subject {subject}: joint node '{name}' is not bound by the skin");
            continue;
        };

        let parent = match joint.joint_parent {
            Some(parent) => ParentLink::Joint(scene.node_name(parent).to_string()),
            None => ParentLink::Root,
        };

        skeleton.nodes[index] = Some(joint.node);
        skeleton.parents[index] = Some(parent);
        skeleton.rotation_orders[index] = Some(scene.rotation_order(joint.node));
        skeleton.corrections[index] = Some(correction_for(scene, joint, subject)?);
        if skeleton.binds[index].is_none() {
            skeleton.binds[index] = Some(scene.global_transform(joint.node, None));
        }
    }

    Ok(skeleton)
}

fn correction_for<S: SceneSource + ?Sized>(
    scene: &S,
    joint: &JointNode,
    subject: usize,
) -> Result<Matrix4<f64>> {
    let scene_parent = scene.parent(joint.node);
    if scene_parent == joint.joint_parent {
        return Ok(Matrix4::identity());
    }
    let Some(scene_parent) = scene_parent else {
        return Ok(Matrix4::identity());
    };

    let joint_parent_global = joint
        .joint_parent
        .map(|parent| scene.global_transform(parent, None));
    ancestor_correction(
        &scene.global_transform(scene_parent, None),
        joint_parent_global.as_ref(),
    )
    .ok_or_else(|| RigError::NonInvertibleAncestor {
        subject,
        joint: scene.node_name(joint.node).to_string(),
    })
}
