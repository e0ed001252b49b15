use nalgebra::{Matrix3xX, Matrix4, Point3};

/// Squared-difference tolerance used when two transforms must agree.
pub const MATRIX_TOLERANCE: f64 = 1e-10;

/// Computes the matrix that compensates for non-joint nodes sitting between a
/// joint and its resolved joint parent.
///
/// # Arguments
///
/// * `scene_parent_global` - Global transform of the joint's immediate scene-graph parent.
/// * `joint_parent_global` - Global transform of the nearest joint ancestor, if any.
///
/// # Returns
///
/// `inverse(scene_parent) * joint_parent`, or `inverse(scene_parent)` for a
/// root joint. `None` when the scene parent cannot be inverted.
pub fn ancestor_correction(
    scene_parent_global: &Matrix4<f64>,
    joint_parent_global: Option<&Matrix4<f64>>,
) -> Option<Matrix4<f64>> {
    let inverse_parent = scene_parent_global.try_inverse()?;
    Some(match joint_parent_global {
        Some(joint_parent) => inverse_parent * joint_parent,
        None => inverse_parent,
    })
}

/// Expresses a global transform relative to a bind transform while staying in
/// global space.
///
/// # Arguments
///
/// * `global` - Sampled global transform of the joint.
/// * `bind` - Bind transform of the joint.
///
/// # Returns
///
/// `global * inverse(bind)`, or `None` when `bind` is singular. The inverse is
/// a general 4x4 inverse; the bind is not assumed to be rigid.
pub fn relative_to_bind(global: &Matrix4<f64>, bind: &Matrix4<f64>) -> Option<Matrix4<f64>> {
    bind.try_inverse().map(|inverse_bind| global * inverse_bind)
}

/// Recomposes a bind-relative transform with its bind transform.
pub fn recompose_global(relative: &Matrix4<f64>, bind: &Matrix4<f64>) -> Matrix4<f64> {
    relative * bind
}

/// Squared Frobenius distance between two matrices.
pub fn squared_difference(a: &Matrix4<f64>, b: &Matrix4<f64>) -> f64 {
    (a - b).norm_squared()
}

/// True when two transforms agree within [`MATRIX_TOLERANCE`].
pub fn matrices_match(a: &Matrix4<f64>, b: &Matrix4<f64>) -> bool {
    squared_difference(a, b) <= MATRIX_TOLERANCE
}

/// Maps mesh-local control points into world space.
///
/// # Arguments
///
/// * `positions` - Vertex positions, one column per vertex.
/// * `transform` - Mesh bind transform applied to every vertex.
pub fn transform_positions(positions: &Matrix3xX<f64>, transform: &Matrix4<f64>) -> Matrix3xX<f64> {
    let mut out = positions.clone();
    for mut column in out.column_iter_mut() {
        let point = transform.transform_point(&Point3::from(column.clone_owned()));
        column.copy_from(&point.coords);
    }
    out
}
