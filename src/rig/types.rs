use std::{collections::HashMap, ops::Range};

use nalgebra::{DMatrix, Matrix3xX, Matrix4};
use serde::Serialize;

use super::skinning::SparseWeights;
use crate::error::{Result, RigError};
use crate::scene::{NodeId, RotationOrder};

// ─── Frame layout ─────────────────────────────────────────────────────────────

/// Global sample times and the consecutive range each subject owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameLayout {
    times: Vec<f64>,
    /// `starts[s]..starts[s + 1]` is subject `s`'s frame range.
    starts: Vec<usize>,
}

impl FrameLayout {
    /// Builds a layout from subject start offsets; `starts` has one entry per
    /// subject plus a final entry equal to `times.len()`.
    pub fn new(times: Vec<f64>, starts: Vec<usize>) -> Result<Self> {
        if starts.len() < 2 {
            return Err(RigError::InvalidFrameLayout(
                "at least one subject is required".to_string(),
            ));
        }
        if starts[0] != 0 {
            return Err(RigError::InvalidFrameLayout(format!(
                "first subject starts at frame {} instead of 0",
                starts[0]
            )));
        }
        if let Some(pair) = starts.windows(2).find(|pair| pair[1] < pair[0]) {
            return Err(RigError::InvalidFrameLayout(format!(
                "frame starts decrease from {} to {}",
                pair[0], pair[1]
            )));
        }
        let end = starts[starts.len() - 1];
        if end != times.len() {
            return Err(RigError::InvalidFrameLayout(format!(
                "subjects cover {} frames but {} sample times were given",
                end,
                times.len()
            )));
        }
        Ok(Self { times, starts })
    }

    /// Builds a layout where subject `s` owns the next `counts[s]` times.
    pub fn from_counts(times: Vec<f64>, counts: &[usize]) -> Result<Self> {
        let mut starts = Vec::with_capacity(counts.len() + 1);
        starts.push(0);
        for count in counts {
            let last = starts[starts.len() - 1];
            starts.push(last + count);
        }
        Self::new(times, starts)
    }

    pub fn subject_count(&self) -> usize {
        self.starts.len() - 1
    }

    pub fn frame_count(&self) -> usize {
        self.times.len()
    }

    pub fn range(&self, subject: usize) -> Range<usize> {
        self.starts[subject]..self.starts[subject + 1]
    }

    pub fn times(&self, subject: usize) -> &[f64] {
        &self.times[self.range(subject)]
    }

    pub fn starts(&self) -> &[usize] {
        &self.starts
    }
}

// ─── Per-subject data ─────────────────────────────────────────────────────────

/// Resolved parent of a joint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentLink {
    Root,
    Joint(String),
}

impl ParentLink {
    /// Parent joint name; empty for a root joint.
    pub fn name(&self) -> &str {
        match self {
            ParentLink::Root => "",
            ParentLink::Joint(name) => name,
        }
    }
}

/// One subject's joints in its own (skin or traversal) order.
///
/// Every per-joint slot is optional: a joint named by the skin that the node
/// traversal never reached keeps empty slots, which the consistency checks
/// report.
#[derive(Debug, Clone, Default)]
pub struct SubjectSkeleton {
    pub names: Vec<String>,
    lookup: HashMap<String, usize>,
    pub nodes: Vec<Option<NodeId>>,
    pub parents: Vec<Option<ParentLink>>,
    pub binds: Vec<Option<Matrix4<f64>>>,
    pub corrections: Vec<Option<Matrix4<f64>>>,
    pub rotation_orders: Vec<Option<RotationOrder>>,
}

impl SubjectSkeleton {
    pub fn new(names: Vec<String>) -> Self {
        let count = names.len();
        let mut lookup = HashMap::with_capacity(count);
        for (index, name) in names.iter().enumerate() {
            lookup.entry(name.clone()).or_insert(index);
        }
        Self {
            names,
            lookup,
            nodes: vec![None; count],
            parents: vec![None; count],
            binds: vec![None; count],
            corrections: vec![None; count],
            rotation_orders: vec![None; count],
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }
}

/// Everything one scene file contributes to the rig.
#[derive(Debug, Clone)]
pub struct SubjectData {
    /// World-space rest positions, one column per vertex.
    pub positions: Matrix3xX<f64>,
    pub faces: Vec<Vec<usize>>,
    pub skeleton: SubjectSkeleton,
    /// Skinning weights, one row per skeleton joint, when the scene has a skin.
    pub weights: Option<DMatrix<f64>>,
    /// Bind-relative global transforms, `[joint][frame]` over the subject's frames.
    pub relative_transforms: Vec<Vec<Matrix4<f64>>>,
    pub has_keyframes: bool,
}

impl SubjectData {
    pub fn vertex_count(&self) -> usize {
        self.positions.ncols()
    }
}

// ─── Aggregate rig ────────────────────────────────────────────────────────────

/// Values stored once per `(subject, joint)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectTable<T> {
    joint_count: usize,
    values: Vec<T>,
}

impl<T: Clone> SubjectTable<T> {
    pub fn filled(subject_count: usize, joint_count: usize, value: T) -> Self {
        Self {
            joint_count,
            values: vec![value; subject_count * joint_count],
        }
    }

    pub fn get(&self, subject: usize, joint: usize) -> &T {
        &self.values[subject * self.joint_count + joint]
    }

    pub fn set(&mut self, subject: usize, joint: usize, value: T) {
        self.values[subject * self.joint_count + joint] = value;
    }

    /// All joints of one subject, in canonical order.
    pub fn subject(&self, subject: usize) -> &[T] {
        let start = subject * self.joint_count;
        &self.values[start..start + self.joint_count]
    }
}

/// The consolidated rig handed to the downstream solver.
#[derive(Debug, Clone, Serialize)]
pub struct RigModel {
    pub subject_count: usize,
    pub vertex_count: usize,
    pub faces: Vec<Vec<usize>>,
    /// World-space rest positions of each subject.
    pub rest_positions: Vec<Matrix3xX<f64>>,
    pub joint_names: Vec<String>,
    /// Canonical parent index per joint; `None` marks a root.
    pub parents: Vec<Option<usize>>,
    pub bind: SubjectTable<Matrix4<f64>>,
    pub corrections: SubjectTable<Matrix4<f64>>,
    pub rotation_orders: SubjectTable<RotationOrder>,
    pub frame_starts: Vec<usize>,
    /// Bind-relative transforms, `[joint][frame]` over all subjects' frames.
    /// Empty when no subject carries keyframe animation.
    pub relative_transforms: Vec<Vec<Matrix4<f64>>>,
    pub weights: SparseWeights,
    pub has_keyframes: bool,
}

impl RigModel {
    pub fn joint_count(&self) -> usize {
        self.joint_names.len()
    }

    /// Name of a joint's parent; empty for a root.
    pub fn parent_name(&self, joint: usize) -> &str {
        self.parents[joint]
            .map(|parent| self.joint_names[parent].as_str())
            .unwrap_or("")
    }

    /// Parent chain from `joint` up to its root, `joint` first.
    ///
    /// Stops after `joint_count` steps so a malformed table cannot loop.
    pub fn ancestry(&self, joint: usize) -> Vec<usize> {
        let mut chain = vec![joint];
        let mut current = self.parents[joint];
        while let Some(parent) = current {
            if chain.len() > self.joint_count() {
                break;
            }
            chain.push(parent);
            current = self.parents[parent];
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_frame_counts_when_building_layout_then_ranges_are_consecutive() {
        let layout =
            FrameLayout::from_counts(vec![0.0, 0.1, 0.2, 0.0, 0.5], &[3, 2]).expect("layout");

        assert_eq!(layout.subject_count(), 2);
        assert_eq!(layout.range(0), 0..3);
        assert_eq!(layout.range(1), 3..5);
        assert_eq!(layout.times(1), &[0.0, 0.5]);
    }

    #[test]
    fn given_counts_not_covering_times_when_building_layout_then_error_is_returned() {
        let err = FrameLayout::from_counts(vec![0.0, 1.0, 2.0], &[1, 1]).expect_err("mismatch");
        assert!(matches!(err, RigError::InvalidFrameLayout(_)));
    }

    #[test]
    fn given_no_subjects_when_building_layout_then_error_is_returned() {
        assert!(FrameLayout::from_counts(Vec::new(), &[]).is_err());
    }

    #[test]
    fn given_subject_table_when_setting_slot_then_only_that_slot_changes() {
        let mut table = SubjectTable::filled(2, 3, 0u8);
        table.set(1, 2, 7);

        assert_eq!(table.subject(0), &[0, 0, 0]);
        assert_eq!(table.subject(1), &[0, 0, 7]);
        assert_eq!(*table.get(1, 2), 7);
    }

    #[test]
    fn given_duplicate_names_when_building_skeleton_then_first_index_wins() {
        let skeleton = SubjectSkeleton::new(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(skeleton.index_of("a"), Some(0));
        assert_eq!(skeleton.index_of("c"), None);
        assert_eq!(skeleton.len(), 3);
    }
}
