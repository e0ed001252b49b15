use std::{fmt, fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::rig::RigModel;

/// Headline numbers of a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub subject_count: usize,
    pub vertex_count: usize,
    pub joint_count: usize,
    pub frame_count: usize,
    pub has_keyframes: bool,
    pub has_weights: bool,
}

impl LoadSummary {
    pub fn from_rig(rig: &RigModel) -> Self {
        Self {
            subject_count: rig.subject_count,
            vertex_count: rig.vertex_count,
            joint_count: rig.joint_count(),
            frame_count: rig.frame_starts.last().copied().unwrap_or(0),
            has_keyframes: rig.has_keyframes,
            has_weights: !rig.weights.is_empty(),
        }
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vertices, {} joints found",
            self.vertex_count, self.joint_count
        )?;
        if self.has_keyframes {
            write!(f, ", key frames found")?;
        }
        if self.has_weights {
            write!(f, ", skinning weights found")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct RigExport<'a> {
    summary: LoadSummary,
    rig: &'a RigModel,
}

/// Writes the rig and its summary as pretty-printed JSON.
pub fn write_rig_json(path: &Path, rig: &RigModel) -> Result<()> {
    let export = RigExport {
        summary: LoadSummary::from_rig(rig),
        rig,
    };
    let json_bytes = serde_json::to_vec_pretty(&export).context("failed to serialize rig")?;
    fs::write(path, json_bytes)
        .with_context(|| format!("failed to write rig JSON: {}", path.display()))?;
    Ok(())
}
