//! Consolidates several skinned scene files of one character into a single
//! rig for a downstream skinning solver.

pub mod correction;
pub mod curve;
pub mod error;
pub mod project;
pub mod report;
pub mod rig;
pub mod scene;

pub use error::{Result, RigError};
pub use project::{LoadManifest, load_manifest, save_manifest};
pub use report::{LoadSummary, write_rig_json};
pub use rig::{FrameLayout, RigModel, load_rig, read_subject};
pub use scene::{GltfImporter, SceneGraph, SceneImporter, SceneSource};
