use nalgebra::Matrix4;

use super::types::SubjectSkeleton;
use crate::correction::relative_to_bind;
use crate::error::{Result, RigError};
use crate::scene::SceneSource;

/// Sampled motion of one subject's skeleton.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonMotion {
    /// Bind-relative transforms, `[joint][frame]` in skeleton order.
    pub relative_transforms: Vec<Vec<Matrix4<f64>>>,
    /// True when any joint's rotation or translation is curve-driven.
    pub has_keyframes: bool,
}

/// Samples every resolved joint at `times`, expressing each global transform
/// relative to the joint's bind: `global(t) * inverse(bind)`.
///
/// Joints the traversal never reached keep an empty series; the consistency
/// checks reject such subjects before their motion is merged.
pub fn sample_skeleton<S: SceneSource + ?Sized>(
    scene: &S,
    skeleton: &SubjectSkeleton,
    times: &[f64],
    subject: usize,
) -> Result<SkeletonMotion> {
    let mut motion = SkeletonMotion {
        relative_transforms: Vec::with_capacity(skeleton.len()),
        has_keyframes: false,
    };

    for (index, name) in skeleton.names.iter().enumerate() {
        let (Some(node), Some(bind)) = (skeleton.nodes[index], skeleton.binds[index]) else {
            motion.relative_transforms.push(Vec::new());
            continue;
        };

        motion.has_keyframes |= scene.has_animation_curve(node);

        let inverse_bind = bind
            .try_inverse()
            .ok_or_else(|| RigError::NonInvertibleBind {
                subject,
                joint: name.clone(),
            })?;
        let series = times
            .iter()
            .map(|&time| scene.global_transform(node, Some(time)) * inverse_bind)
            .collect();
        motion.relative_transforms.push(series);
    }

    Ok(motion)
}

/// Bind-relative transform of a single joint at one time.
pub fn sample_joint<S: SceneSource + ?Sized>(
    scene: &S,
    skeleton: &SubjectSkeleton,
    joint: usize,
    time: f64,
) -> Option<Matrix4<f64>> {
    let node = skeleton.nodes[joint]?;
    let bind = skeleton.binds[joint]?;
    relative_to_bind(&scene.global_transform(node, Some(time)), &bind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::{matrices_match, recompose_global};
    use crate::curve::{Interpolation, Track};
    use crate::rig::skeleton::resolve_skeleton;
    use crate::scene::SceneGraph;
    use nalgebra::Vector3;

    fn animated_scene() -> SceneGraph {
        let mut scene = SceneGraph::new("root");
        let hips = scene.add_joint(0, "hips");
        let spine = scene.add_joint(hips, "spine");
        scene.node_mut(hips).translation = Vector3::new(0.0, 1.0, 0.0);
        scene.node_mut(spine).translation = Vector3::new(0.0, 0.5, 0.0);
        scene.node_mut(spine).translation_track = Track::new(
            vec![0.0, 1.0],
            vec![Vector3::new(0.0, 0.5, 0.0), Vector3::new(1.0, 0.5, 0.0)],
            Interpolation::Linear,
        );
        scene
    }

    #[test]
    fn given_animated_joint_when_sampling_then_series_follows_curve() {
        let scene = animated_scene();
        let skeleton = resolve_skeleton(&scene, None, 0).expect("skeleton");

        let motion = sample_skeleton(&scene, &skeleton, &[0.0, 0.5, 1.0], 0).expect("motion");

        assert!(motion.has_keyframes);
        assert_eq!(motion.relative_transforms.len(), 2);
        assert_eq!(motion.relative_transforms[1].len(), 3);
        assert!(matrices_match(
            &motion.relative_transforms[1][0],
            &Matrix4::identity()
        ));
        assert!((motion.relative_transforms[1][1][(0, 3)] - 0.5).abs() < 1e-12);
        assert!((motion.relative_transforms[0][2][(1, 3)]).abs() < 1e-12);
    }

    #[test]
    fn given_bind_time_when_recomposing_sample_then_global_is_reproduced() {
        let scene = animated_scene();
        let skeleton = resolve_skeleton(&scene, None, 0).expect("skeleton");
        let spine = skeleton.index_of("spine").expect("spine");
        let node = skeleton.nodes[spine].expect("node");
        let bind = skeleton.binds[spine].expect("bind");

        let relative = sample_joint(&scene, &skeleton, spine, 0.75).expect("sample");
        let global = scene.global_transform(node, Some(0.75));
        assert!(matrices_match(&recompose_global(&relative, &bind), &global));
    }

    #[test]
    fn given_static_scene_when_sampling_then_no_keyframes_are_reported() {
        let mut scene = SceneGraph::new("root");
        scene.add_joint(0, "hips");
        let skeleton = resolve_skeleton(&scene, None, 0).expect("skeleton");

        let motion = sample_skeleton(&scene, &skeleton, &[0.0, 1.0], 0).expect("motion");
        assert!(!motion.has_keyframes);
        assert_eq!(motion.relative_transforms[0].len(), 2);
    }

    #[test]
    fn given_singular_bind_when_sampling_then_error_names_joint() {
        let mut scene = SceneGraph::new("root");
        scene.add_joint(0, "hips");
        let mut skeleton = resolve_skeleton(&scene, None, 1).expect("skeleton");
        skeleton.binds[0] = Some(Matrix4::zeros());

        let err = sample_skeleton(&scene, &skeleton, &[0.0], 1).expect_err("singular");
        assert!(matches!(err, RigError::NonInvertibleBind { subject: 1, ref joint } if joint == "hips"));
    }
}
