use log::warn;
use nalgebra::Matrix4;

use super::skinning::{SparseWeights, WeightAccumulator};
use super::types::{FrameLayout, ParentLink, RigModel, SubjectData, SubjectTable};
use super::validation::{check_complete, check_subject};
use crate::error::{Result, RigError};
use crate::scene::RotationOrder;

/// Builds a [`RigModel`] one subject at a time.
///
/// Subject 0 fixes the canonical joint order, parents, vertex count and
/// faces. Later subjects are merged in layout order; each is checked against
/// the rig before anything of it is stored, so a failed merge leaves the
/// assembler untouched.
#[derive(Debug)]
pub struct RigAssembler {
    rig: RigModel,
    layout: FrameLayout,
    weights: WeightAccumulator,
    /// Number of subjects stored so far; also the index of the next subject.
    merged: usize,
    any_keyframes: bool,
}

impl RigAssembler {
    pub fn begin(first: SubjectData, layout: &FrameLayout) -> Result<Self> {
        check_complete(&first.skeleton, 0)?;

        let skeleton = &first.skeleton;
        let joint_count = skeleton.len();
        let subject_count = layout.subject_count();

        let mut parents = Vec::with_capacity(joint_count);
        for link in &skeleton.parents {
            let parent = match link {
                Some(ParentLink::Joint(parent_name)) => Some(
                    skeleton
                        .index_of(parent_name)
                        .ok_or_else(|| RigError::MissingJoint {
                            subject: 0,
                            joint: parent_name.clone(),
                        })?,
                ),
                _ => None,
            };
            parents.push(parent);
        }

        let weights = WeightAccumulator::new(
            joint_count,
            first.vertex_count(),
            first.weights.as_ref(),
        );

        let mut rig = RigModel {
            subject_count,
            vertex_count: first.vertex_count(),
            faces: first.faces.clone(),
            rest_positions: Vec::with_capacity(subject_count),
            joint_names: skeleton.names.clone(),
            parents,
            bind: SubjectTable::filled(subject_count, joint_count, Matrix4::identity()),
            corrections: SubjectTable::filled(subject_count, joint_count, Matrix4::identity()),
            rotation_orders: SubjectTable::filled(
                subject_count,
                joint_count,
                RotationOrder::default(),
            ),
            frame_starts: layout.starts().to_vec(),
            relative_transforms: vec![
                vec![Matrix4::identity(); layout.frame_count()];
                joint_count
            ],
            weights: SparseWeights::empty(joint_count, first.vertex_count()),
            has_keyframes: false,
        };

        let any_keyframes = first.has_keyframes;
        let identity: Vec<usize> = (0..joint_count).collect();
        store_subject(&mut rig, layout, 0, first, &identity);

        Ok(Self {
            rig,
            layout: layout.clone(),
            weights,
            merged: 1,
            any_keyframes,
        })
    }

    /// Checks `data` against the rig so far and folds it in as the next
    /// subject of the layout.
    pub fn merge(&mut self, data: SubjectData) -> Result<()> {
        let subject = self.merged;
        if subject >= self.rig.subject_count {
            return Err(RigError::SubjectCountMismatch {
                expected: self.rig.subject_count,
                actual: subject + 1,
            });
        }

        let remap = check_subject(&self.rig, &data, subject)?;
        self.weights.check(subject, data.weights.as_ref())?;

        for (canonical, &local) in remap.iter().enumerate() {
            let expected = *self.rig.rotation_orders.get(0, canonical);
            if let Some(order) = data.skeleton.rotation_orders[local] {
                if order != expected {
                    warn!(
                        "subject {subject}: joint '{}' uses rotation order {order:?} (subject 0 uses {expected:?})",
                        self.rig.joint_names[canonical]
                    );
                }
            }
        }

        self.weights.add(subject, data.weights.as_ref(), &remap)?;
        self.any_keyframes |= data.has_keyframes;
        store_subject(&mut self.rig, &self.layout, subject, data, &remap);
        self.merged += 1;
        Ok(())
    }

    pub fn merged_count(&self) -> usize {
        self.merged
    }

    /// Averages the weights over all subjects and drops the motion series
    /// when no subject had keyframes. Fails unless every subject of the
    /// layout has been merged.
    pub fn finalize(self) -> Result<RigModel> {
        if self.merged != self.rig.subject_count {
            return Err(RigError::IncompleteRig {
                merged: self.merged,
                expected: self.rig.subject_count,
            });
        }

        let mut rig = self.rig;
        rig.weights = self.weights.finalize(rig.subject_count);
        rig.has_keyframes = self.any_keyframes;
        if !rig.has_keyframes {
            rig.relative_transforms.clear();
        }
        Ok(rig)
    }
}

/// Writes one already-checked subject into its slots of `rig`.
fn store_subject(
    rig: &mut RigModel,
    layout: &FrameLayout,
    subject: usize,
    data: SubjectData,
    remap: &[usize],
) {
    let skeleton = &data.skeleton;
    let frames = layout.range(subject);

    for (canonical, &local) in remap.iter().enumerate() {
        if let Some(bind) = skeleton.binds[local] {
            rig.bind.set(subject, canonical, bind);
        }
        if let Some(correction) = skeleton.corrections[local] {
            rig.corrections.set(subject, canonical, correction);
        }
        if let Some(order) = skeleton.rotation_orders[local] {
            rig.rotation_orders.set(subject, canonical, order);
        }

        if let Some(series) = data.relative_transforms.get(local) {
            let target = &mut rig.relative_transforms[canonical][frames.clone()];
            for (slot, transform) in target.iter_mut().zip(series) {
                *slot = *transform;
            }
        }
    }

    rig.rest_positions.push(data.positions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::types::SubjectSkeleton;
    use nalgebra::{DMatrix, Matrix3xX, Translation3};

    fn skeleton(joints: &[(&str, Option<&str>)]) -> SubjectSkeleton {
        let mut skeleton =
            SubjectSkeleton::new(joints.iter().map(|(name, _)| name.to_string()).collect());
        for (index, (_, parent)) in joints.iter().enumerate() {
            skeleton.nodes[index] = Some(index + 1);
            skeleton.parents[index] = Some(match parent {
                Some(parent) => ParentLink::Joint(parent.to_string()),
                None => ParentLink::Root,
            });
            skeleton.binds[index] = Some(Matrix4::identity());
            skeleton.corrections[index] = Some(Matrix4::identity());
            skeleton.rotation_orders[index] = Some(RotationOrder::Xyz);
        }
        skeleton
    }

    fn subject(
        joints: &[(&str, Option<&str>)],
        frames: usize,
        offset: f64,
        has_keyframes: bool,
    ) -> SubjectData {
        let skeleton = skeleton(joints);
        let motion = Translation3::new(offset, 0.0, 0.0).to_homogeneous();
        SubjectData {
            positions: Matrix3xX::from_element(2, offset),
            faces: vec![vec![0, 1]],
            relative_transforms: vec![vec![motion; frames]; skeleton.len()],
            weights: Some(DMatrix::from_element(skeleton.len(), 2, 1.0)),
            skeleton,
            has_keyframes,
        }
    }

    #[test]
    fn given_two_subjects_when_merging_then_series_are_placed_by_frame_range() {
        let layout = FrameLayout::from_counts(vec![0.0, 0.5, 0.0, 0.5, 1.0], &[2, 3])
            .expect("layout");
        let first = subject(&[("hips", None), ("spine", Some("hips"))], 2, 1.0, true);
        let second = subject(&[("spine", Some("hips")), ("hips", None)], 3, 2.0, false);

        let mut assembler = RigAssembler::begin(first, &layout).expect("begin");
        assembler.merge(second).expect("merge");
        assert_eq!(assembler.merged_count(), 2);
        let rig = assembler.finalize().expect("complete rig");

        assert_eq!(rig.parents, [None, Some(0)]);
        assert_eq!(rig.relative_transforms.len(), 2);
        assert_eq!(rig.relative_transforms[0].len(), 5);
        assert_eq!(rig.relative_transforms[1][1][(0, 3)], 1.0);
        assert_eq!(rig.relative_transforms[1][2][(0, 3)], 2.0);
        assert_eq!(rig.relative_transforms[0][4][(0, 3)], 2.0);
        assert_eq!(rig.rest_positions.len(), 2);
        assert_eq!(rig.weights.get(1, 0), 1.0);
        assert!(rig.has_keyframes);
    }

    #[test]
    fn given_no_keyframes_anywhere_when_finalizing_then_series_are_dropped() {
        let layout = FrameLayout::from_counts(vec![0.0, 0.0], &[1, 1]).expect("layout");
        let first = subject(&[("hips", None)], 1, 0.0, false);
        let second = subject(&[("hips", None)], 1, 0.0, false);

        let mut assembler = RigAssembler::begin(first, &layout).expect("begin");
        assembler.merge(second).expect("merge");
        let rig = assembler.finalize().expect("complete rig");

        assert!(!rig.has_keyframes);
        assert!(rig.relative_transforms.is_empty());
    }

    #[test]
    fn given_inconsistent_subject_when_merging_then_rig_is_unchanged() {
        let layout = FrameLayout::from_counts(vec![0.0, 0.0], &[1, 1]).expect("layout");
        let first = subject(&[("hips", None), ("spine", Some("hips"))], 1, 1.0, false);
        let second = subject(&[("hips", None), ("spine", None)], 1, 5.0, true);

        let mut assembler = RigAssembler::begin(first, &layout).expect("begin");
        let err = assembler.merge(second).expect_err("hierarchy differs");

        assert!(matches!(err, RigError::InconsistentHierarchy { .. }));
        assert_eq!(assembler.merged_count(), 1);
        assert_eq!(assembler.rig.rest_positions.len(), 1);
        assert!(!assembler.any_keyframes);
    }

    #[test]
    fn given_first_subject_missing_correction_when_beginning_then_error_is_returned() {
        let layout = FrameLayout::from_counts(vec![0.0], &[1]).expect("layout");
        let mut first = subject(&[("hips", None)], 1, 0.0, false);
        first.skeleton.corrections[0] = None;

        let err = RigAssembler::begin(first, &layout).expect_err("correction missing");
        assert!(matches!(err, RigError::MissingCorrection { subject: 0, .. }));
    }

    #[test]
    fn given_weights_missing_in_later_subject_when_merging_then_weights_are_inconsistent() {
        let layout = FrameLayout::from_counts(vec![0.0, 0.0], &[1, 1]).expect("layout");
        let first = subject(&[("hips", None)], 1, 0.0, false);
        let mut second = subject(&[("hips", None)], 1, 0.0, false);
        second.weights = None;

        let mut assembler = RigAssembler::begin(first, &layout).expect("begin");
        let err = assembler.merge(second).expect_err("weights differ");
        assert!(matches!(err, RigError::InconsistentWeights { subject: 1, .. }));
    }

    #[test]
    fn given_unmerged_subjects_when_finalizing_then_incomplete_rig_is_reported() {
        let layout = FrameLayout::from_counts(vec![0.0, 0.0, 0.0], &[1, 1, 1]).expect("layout");
        let first = subject(&[("hips", None)], 1, 0.0, false);

        let assembler = RigAssembler::begin(first, &layout).expect("begin");
        let err = assembler.finalize().expect_err("two subjects missing");

        assert!(matches!(
            err,
            RigError::IncompleteRig {
                merged: 1,
                expected: 3
            }
        ));
    }

    #[test]
    fn given_every_subject_merged_when_merging_again_then_subject_count_mismatch_is_reported() {
        let layout = FrameLayout::from_counts(vec![0.0, 0.0], &[1, 1]).expect("layout");
        let first = subject(&[("hips", None)], 1, 1.0, false);
        let second = subject(&[("hips", None)], 1, 1.0, false);
        let extra = subject(&[("hips", None)], 1, 3.0, false);

        let mut assembler = RigAssembler::begin(first, &layout).expect("begin");
        assembler.merge(second).expect("merge");
        let err = assembler.merge(extra).expect_err("layout has two subjects");

        assert!(matches!(
            err,
            RigError::SubjectCountMismatch {
                expected: 2,
                actual: 3
            }
        ));
        let rig = assembler.finalize().expect("complete rig");
        assert_eq!(rig.rest_positions.len(), 2);
        assert_eq!(rig.weights.get(0, 0), 1.0);
    }

    #[test]
    fn given_animated_later_subject_when_merging_then_rig_flag_is_set_only_at_finalize() {
        let layout = FrameLayout::from_counts(vec![0.0, 0.0], &[1, 1]).expect("layout");
        let first = subject(&[("hips", None)], 1, 0.0, false);
        let second = subject(&[("hips", None)], 1, 2.0, true);

        let mut assembler = RigAssembler::begin(first, &layout).expect("begin");
        assembler.merge(second).expect("merge");
        assert!(!assembler.rig.has_keyframes);

        let rig = assembler.finalize().expect("complete rig");
        assert!(rig.has_keyframes);
        assert_eq!(rig.relative_transforms[0][1][(0, 3)], 2.0);
    }
}
