mod assembler;
mod sampler;
mod skeleton;
mod skinning;
mod types;
mod validation;

use std::path::Path;

use log::{debug, info};

use crate::correction::transform_positions;
use crate::error::{Result, RigError};
use crate::report::LoadSummary;
use crate::scene::{SceneImporter, SceneSource};

// Re-export public types for callers of this module.
pub use assembler::RigAssembler;
pub use sampler::{SkeletonMotion, sample_joint, sample_skeleton};
pub use skeleton::{JointNode, check_single_bind_pose, collect_joint_nodes, resolve_skeleton};
pub use skinning::{SparseWeights, WEIGHT_EPSILON, WeightAccumulator, scatter_cluster_weights};
pub use types::{
    FrameLayout, ParentLink, RigModel, SubjectData, SubjectSkeleton, SubjectTable,
};
pub use validation::{check_complete, check_subject};

// ─── Public API ───────────────────────────────────────────────────────────────

/// Loads every subject file and consolidates them into one rig.
///
/// Subject `s` is sampled at `layout.times(s)`. The first subject fixes the
/// canonical joint order; each later subject must match its geometry,
/// topology and skeleton. Any failure aborts the whole load.
pub fn load_rig<I, P>(importer: &mut I, paths: &[P], layout: &FrameLayout) -> Result<RigModel>
where
    I: SceneImporter,
    P: AsRef<Path>,
{
    if paths.len() != layout.subject_count() {
        return Err(RigError::SubjectCountMismatch {
            expected: layout.subject_count(),
            actual: paths.len(),
        });
    }

    let first = open_subject(importer, paths[0].as_ref(), layout, 0)?;
    let mut assembler = RigAssembler::begin(first, layout)?;

    for (subject, path) in paths.iter().enumerate().skip(1) {
        let data = open_subject(importer, path.as_ref(), layout, subject)?;
        assembler.merge(data)?;
    }

    let rig = assembler.finalize()?;
    info!("{}", LoadSummary::from_rig(&rig));
    Ok(rig)
}

/// Extracts one subject from an opened scene.
///
/// Rest positions are moved into world space by the skin's geometry bind
/// matrix, or by the mesh node's global transform when there is no skin.
/// A skin without clusters counts as no skin.
pub fn read_subject<S: SceneSource + ?Sized>(
    scene: &S,
    times: &[f64],
    subject: usize,
) -> Result<SubjectData> {
    let mesh = scene
        .first_mesh()
        .ok_or(RigError::MissingMesh { subject })?;
    let skin = scene.first_skin().filter(|skin| !skin.clusters.is_empty());

    let skeleton = resolve_skeleton(scene, skin, subject)?;

    let geometry_bind = match skin {
        Some(skin) => skin.clusters[0].bind_matrix,
        None => mesh.global_transform,
    };
    let positions = transform_positions(&mesh.positions, &geometry_bind);

    let weights = skin
        .map(|skin| scatter_cluster_weights(skin, mesh.vertex_count(), subject))
        .transpose()?;

    let motion = sample_skeleton(scene, &skeleton, times, subject)?;

    Ok(SubjectData {
        positions,
        faces: mesh.polygons.clone(),
        skeleton,
        weights,
        relative_transforms: motion.relative_transforms,
        has_keyframes: motion.has_keyframes,
    })
}

fn open_subject<I: SceneImporter>(
    importer: &mut I,
    path: &Path,
    layout: &FrameLayout,
    subject: usize,
) -> Result<SubjectData> {
    info!("Reading subject {subject}: {}", path.display());
    let scene = importer.open(path).map_err(|err| RigError::Open {
        subject,
        path: path.to_path_buf(),
        source: err.into(),
    })?;

    let data = read_subject(&scene, layout.times(subject), subject)?;
    debug!(
        "subject {subject}: {} vertices, {} joints, keyframes: {}, weights: {}",
        data.vertex_count(),
        data.skeleton.len(),
        data.has_keyframes,
        data.weights.is_some()
    );
    Ok(data)
}
