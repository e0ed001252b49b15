use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while consolidating subjects into one rig.
///
/// Every variant is fatal for the whole load; no partial rig is returned.
#[derive(Debug, Error)]
pub enum RigError {
    #[error("subject {subject}: failed to open {}: {source}", path.display())]
    Open {
        subject: usize,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("subject {subject}: scene has no mesh")]
    MissingMesh { subject: usize },

    #[error("wrong number of subjects: expected {expected}, got {actual}")]
    SubjectCountMismatch { expected: usize, actual: usize },

    #[error("rig finalized after {merged} of {expected} subjects")]
    IncompleteRig { merged: usize, expected: usize },

    #[error("invalid frame layout: {0}")]
    InvalidFrameLayout(String),

    #[error("subject {subject}: multiple bind poses in skin (clusters {first} and {second})")]
    MultipleBindPoses {
        subject: usize,
        first: usize,
        second: usize,
    },

    #[error("subject {subject}: scene has {scene} joints but the skin binds {skin}")]
    JointCountMismatch {
        subject: usize,
        scene: usize,
        skin: usize,
    },

    #[error("subject {subject}: skin cluster {cluster} has an empty joint name")]
    UnnamedSkinJoint { subject: usize, cluster: usize },

    #[error(
        "subject {subject}: weight for joint '{joint}' targets vertex {vertex} (vertex count: {vertex_count})"
    )]
    InvalidWeightIndex {
        subject: usize,
        joint: String,
        vertex: usize,
        vertex_count: usize,
    },

    #[error("subject {subject}: bind transform of joint '{joint}' is not invertible")]
    NonInvertibleBind { subject: usize, joint: String },

    #[error("subject {subject}: scene parent of joint '{joint}' is not invertible")]
    NonInvertibleAncestor { subject: usize, joint: String },

    #[error("subject {subject}: inconsistent geometry: {actual} vertices (expected {expected})")]
    InconsistentGeometry {
        subject: usize,
        expected: usize,
        actual: usize,
    },

    #[error("subject {subject}: inconsistent geometry: face topology differs from subject 0")]
    InconsistentTopology { subject: usize },

    #[error("subject {subject}: inconsistent joints set: {actual} joints (expected {expected})")]
    InconsistentJointCount {
        subject: usize,
        expected: usize,
        actual: usize,
    },

    #[error("subject {subject}: inconsistent joints set: joint '{joint}' not found")]
    MissingJoint { subject: usize, joint: String },

    #[error(
        "subject {subject}: inconsistent skeleton hierarchy: parent of '{joint}' is '{actual}' (expected '{expected}')"
    )]
    InconsistentHierarchy {
        subject: usize,
        joint: String,
        expected: String,
        actual: String,
    },

    #[error("subject {subject}: inconsistent joints set: no bind transform for '{joint}'")]
    MissingBind { subject: usize, joint: String },

    #[error("subject {subject}: inconsistent joints set: no ancestor correction for '{joint}'")]
    MissingCorrection { subject: usize, joint: String },

    #[error("subject {subject}: inconsistent joints set: no rotation order for '{joint}'")]
    MissingRotationOrder { subject: usize, joint: String },

    #[error("subject {subject}: inconsistent skinning weights: {actual} rows (expected {expected})")]
    InconsistentWeights {
        subject: usize,
        expected: usize,
        actual: usize,
    },
}

/// Result alias for the consolidation core.
pub type Result<T> = std::result::Result<T, RigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_hierarchy_error_when_formatted_then_subject_and_joint_are_included() {
        let err = RigError::InconsistentHierarchy {
            subject: 2,
            joint: "forearm".to_string(),
            expected: "upperarm".to_string(),
            actual: "".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("subject 2"));
        assert!(message.contains("forearm"));
        assert!(message.contains("upperarm"));
    }
}
