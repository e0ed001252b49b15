use super::types::{RigModel, SubjectData, SubjectSkeleton};
use crate::error::{Result, RigError};

/// Fails unless every joint of `skeleton` was reached by the traversal and
/// has a bind transform, an ancestor correction and a rotation order.
pub fn check_complete(skeleton: &SubjectSkeleton, subject: usize) -> Result<()> {
    for index in 0..skeleton.len() {
        check_joint_slots(skeleton, index, subject)?;
    }
    Ok(())
}

/// Checks a later subject against the rig built so far.
///
/// Checks run in a fixed order: vertex count, face topology, joint count,
/// then per canonical joint its presence, parent name, bind, correction and
/// rotation order. The first failure is returned.
///
/// On success returns the subject's local joint index for every canonical
/// joint.
pub fn check_subject(rig: &RigModel, data: &SubjectData, subject: usize) -> Result<Vec<usize>> {
    if data.vertex_count() != rig.vertex_count {
        return Err(RigError::InconsistentGeometry {
            subject,
            expected: rig.vertex_count,
            actual: data.vertex_count(),
        });
    }
    if data.faces != rig.faces {
        return Err(RigError::InconsistentTopology { subject });
    }

    let skeleton = &data.skeleton;
    if skeleton.len() != rig.joint_count() {
        return Err(RigError::InconsistentJointCount {
            subject,
            expected: rig.joint_count(),
            actual: skeleton.len(),
        });
    }

    let mut remap = Vec::with_capacity(rig.joint_count());
    for (canonical, name) in rig.joint_names.iter().enumerate() {
        let local = skeleton
            .index_of(name)
            .filter(|&local| skeleton.parents[local].is_some())
            .ok_or_else(|| RigError::MissingJoint {
                subject,
                joint: name.clone(),
            })?;

        let expected = rig.parent_name(canonical);
        let actual = skeleton.parents[local]
            .as_ref()
            .map(|parent| parent.name())
            .unwrap_or("");
        if expected != actual {
            return Err(RigError::InconsistentHierarchy {
                subject,
                joint: name.clone(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }

        check_joint_slots(skeleton, local, subject)?;
        remap.push(local);
    }

    Ok(remap)
}

fn check_joint_slots(skeleton: &SubjectSkeleton, index: usize, subject: usize) -> Result<()> {
    let joint = || skeleton.names[index].clone();
    if skeleton.parents[index].is_none() {
        return Err(RigError::MissingJoint {
            subject,
            joint: joint(),
        });
    }
    if skeleton.binds[index].is_none() {
        return Err(RigError::MissingBind {
            subject,
            joint: joint(),
        });
    }
    if skeleton.corrections[index].is_none() {
        return Err(RigError::MissingCorrection {
            subject,
            joint: joint(),
        });
    }
    if skeleton.rotation_orders[index].is_none() {
        return Err(RigError::MissingRotationOrder {
            subject,
            joint: joint(),
        });
    }
    Ok(())
}
