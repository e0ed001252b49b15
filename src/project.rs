use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rig::FrameLayout;
use crate::scene::GltfImporter;

/// Options forwarded to the scene importer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterSettings {
    /// Index of the animation clip sampled in every subject file.
    pub animation: usize,
}

impl ImporterSettings {
    pub fn importer(&self) -> GltfImporter {
        GltfImporter::new(self.animation)
    }
}

/// Describes one multi-subject load: the files, their sample times and
/// where to write the consolidated rig.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadManifest {
    /// Scene files, one per subject, in subject order.
    pub subjects: Vec<String>,
    /// Sample times of every subject, concatenated in subject order.
    pub frame_times: Vec<f64>,
    /// Number of entries of `frame_times` owned by each subject.
    pub frame_counts: Vec<usize>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub importer: ImporterSettings,
}

impl LoadManifest {
    /// Builds the validated frame layout described by the manifest.
    pub fn frame_layout(&self) -> Result<FrameLayout> {
        FrameLayout::from_counts(self.frame_times.clone(), &self.frame_counts)
            .context("manifest frame layout is invalid")
    }
}

/// Save a load manifest to a JSON file.
pub fn save_manifest(path: &Path, manifest: &LoadManifest) -> Result<()> {
    let content = serde_json::to_string_pretty(manifest)
        .context("failed to serialize load manifest as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save load manifest: {}", path.display()))?;
    Ok(())
}

/// Load a load manifest from a JSON file.
pub fn load_manifest(path: &Path) -> Result<LoadManifest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load manifest: {}", path.display()))?;
    let manifest: LoadManifest =
        serde_json::from_str(&content).context("failed to parse load manifest JSON")?;
    Ok(manifest)
}
