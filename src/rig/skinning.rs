use nalgebra::DMatrix;
use serde::Serialize;

use crate::error::{Result, RigError};
use crate::scene::SkinBinding;

/// Averaged weights with magnitude below this are dropped.
pub const WEIGHT_EPSILON: f64 = 1e-20;

/// Scatters a skin's per-cluster influences into a `joints x vertices` matrix.
///
/// Row order follows the skin's clusters. Every influence must target a
/// vertex below `vertex_count`.
pub fn scatter_cluster_weights(
    skin: &SkinBinding,
    vertex_count: usize,
    subject: usize,
) -> Result<DMatrix<f64>> {
    let mut weights = DMatrix::zeros(skin.clusters.len(), vertex_count);
    for (row, cluster) in skin.clusters.iter().enumerate() {
        for &(vertex, weight) in &cluster.influences {
            if vertex >= vertex_count {
                return Err(RigError::InvalidWeightIndex {
                    subject,
                    joint: cluster.joint.clone(),
                    vertex,
                    vertex_count,
                });
            }
            weights[(row, vertex)] += weight;
        }
    }
    Ok(weights)
}

/// Sums skinning weights from every subject in canonical joint order.
#[derive(Debug, Clone)]
pub struct WeightAccumulator {
    joint_count: usize,
    vertex_count: usize,
    sum: Option<DMatrix<f64>>,
}

impl WeightAccumulator {
    /// Starts from the first subject, whose joint order is canonical.
    pub fn new(joint_count: usize, vertex_count: usize, first: Option<&DMatrix<f64>>) -> Self {
        Self {
            joint_count,
            vertex_count,
            sum: first.cloned(),
        }
    }

    /// Fails unless `weights` has the same presence and shape as the first
    /// subject's weights.
    pub fn check(&self, subject: usize, weights: Option<&DMatrix<f64>>) -> Result<()> {
        let expected = self.sum.as_ref().map_or(0, |weights| weights.nrows());
        let actual = weights.map_or(0, |weights| weights.nrows());
        let shape_matches = match (&self.sum, weights) {
            (None, None) => true,
            (Some(sum), Some(weights)) => sum.shape() == weights.shape(),
            _ => false,
        };
        if shape_matches {
            Ok(())
        } else {
            Err(RigError::InconsistentWeights {
                subject,
                expected,
                actual,
            })
        }
    }

    /// Adds a subject's weights. `remap[canonical]` is the subject's own row
    /// index for each canonical joint.
    pub fn add(
        &mut self,
        subject: usize,
        weights: Option<&DMatrix<f64>>,
        remap: &[usize],
    ) -> Result<()> {
        self.check(subject, weights)?;
        if let (Some(sum), Some(weights)) = (self.sum.as_mut(), weights) {
            for (canonical, &local) in remap.iter().enumerate() {
                let mut row = sum.row_mut(canonical);
                row += weights.row(local);
            }
        }
        Ok(())
    }

    /// Averages over `subject_count` subjects and sparsifies the result.
    pub fn finalize(self, subject_count: usize) -> SparseWeights {
        match self.sum {
            Some(sum) => SparseWeights::from_dense(&(sum / subject_count.max(1) as f64)),
            None => SparseWeights::empty(self.joint_count, self.vertex_count),
        }
    }
}

/// Row-compressed `joints x vertices` weight matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SparseWeights {
    joint_count: usize,
    vertex_count: usize,
    /// `row_offsets[j]..row_offsets[j + 1]` indexes joint `j`'s entries.
    row_offsets: Vec<usize>,
    vertices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseWeights {
    /// A matrix with no stored entries.
    pub fn empty(joint_count: usize, vertex_count: usize) -> Self {
        Self {
            joint_count,
            vertex_count,
            row_offsets: vec![0; joint_count + 1],
            vertices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Keeps entries whose magnitude is at least [`WEIGHT_EPSILON`].
    pub fn from_dense(dense: &DMatrix<f64>) -> Self {
        let mut sparse = Self::empty(dense.nrows(), dense.ncols());
        for joint in 0..dense.nrows() {
            for vertex in 0..dense.ncols() {
                let value = dense[(joint, vertex)];
                if value.abs() >= WEIGHT_EPSILON {
                    sparse.vertices.push(vertex);
                    sparse.values.push(value);
                }
            }
            sparse.row_offsets[joint + 1] = sparse.values.len();
        }
        sparse
    }

    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(vertex, weight)` entries of one joint, ascending by vertex.
    pub fn row(&self, joint: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_offsets[joint]..self.row_offsets[joint + 1];
        self.vertices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    pub fn get(&self, joint: usize, vertex: usize) -> f64 {
        let range = self.row_offsets[joint]..self.row_offsets[joint + 1];
        match self.vertices[range.clone()].binary_search(&vertex) {
            Ok(offset) => self.values[range.start + offset],
            Err(_) => 0.0,
        }
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.joint_count, self.vertex_count);
        for joint in 0..self.joint_count {
            for (vertex, value) in self.row(joint) {
                dense[(joint, vertex)] = value;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SkinCluster;
    use nalgebra::Matrix4;

    fn cluster(joint: &str, influences: Vec<(usize, f64)>) -> SkinCluster {
        SkinCluster {
            joint: joint.to_string(),
            bind_matrix: Matrix4::identity(),
            link_matrix: None,
            influences,
        }
    }

    #[test]
    fn given_clusters_when_scattering_then_rows_follow_cluster_order() {
        let skin = SkinBinding {
            clusters: vec![
                cluster("hips", vec![(0, 1.0), (1, 0.25)]),
                cluster("spine", vec![(1, 0.75)]),
            ],
        };

        let weights = scatter_cluster_weights(&skin, 2, 0).expect("weights");
        assert_eq!(weights[(0, 0)], 1.0);
        assert_eq!(weights[(0, 1)], 0.25);
        assert_eq!(weights[(1, 1)], 0.75);
    }

    #[test]
    fn given_influence_at_vertex_count_when_scattering_then_index_is_rejected() {
        let skin = SkinBinding {
            clusters: vec![cluster("hips", vec![(2, 1.0)])],
        };

        let err = scatter_cluster_weights(&skin, 2, 4).expect_err("out of range");
        assert!(matches!(
            err,
            RigError::InvalidWeightIndex {
                subject: 4,
                vertex: 2,
                vertex_count: 2,
                ..
            }
        ));
    }

    #[test]
    fn given_two_subjects_when_finalizing_then_weights_are_averaged_by_canonical_joint() {
        let first = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        // Second subject lists the joints in reverse order.
        let second = DMatrix::from_row_slice(2, 2, &[0.0, 0.5, 1.0, 1e-30]);

        let mut accumulator = WeightAccumulator::new(2, 2, Some(&first));
        accumulator
            .add(1, Some(&second), &[1, 0])
            .expect("consistent weights");
        let weights = accumulator.finalize(2);

        assert_eq!(weights.get(0, 0), 1.0);
        assert_eq!(weights.get(1, 1), 0.75);
        assert_eq!(weights.get(0, 1), 0.0);
        assert_eq!(weights.row(1).collect::<Vec<_>>(), vec![(1, 0.75)]);
    }

    #[test]
    fn given_tiny_average_when_sparsifying_then_entry_is_dropped() {
        let dense = DMatrix::from_row_slice(1, 3, &[1e-21, -1e-19, 0.0]);
        let weights = SparseWeights::from_dense(&dense);

        assert_eq!(weights.nnz(), 1);
        assert_eq!(weights.get(0, 1), -1e-19);
        assert_eq!(weights.to_dense()[(0, 0)], 0.0);
    }

    #[test]
    fn given_weights_only_in_first_subject_when_adding_then_inconsistency_is_reported() {
        let first = DMatrix::from_element(2, 3, 0.5);
        let mut accumulator = WeightAccumulator::new(2, 3, Some(&first));

        let err = accumulator.add(1, None, &[0, 1]).expect_err("missing weights");
        assert!(matches!(
            err,
            RigError::InconsistentWeights {
                subject: 1,
                expected: 2,
                actual: 0
            }
        ));
    }

    #[test]
    fn given_weights_only_in_later_subject_when_adding_then_inconsistency_is_reported() {
        let later = DMatrix::from_element(2, 3, 0.5);
        let mut accumulator = WeightAccumulator::new(2, 3, None);

        let err = accumulator
            .add(1, Some(&later), &[0, 1])
            .expect_err("unexpected weights");
        assert!(matches!(
            err,
            RigError::InconsistentWeights {
                subject: 1,
                expected: 0,
                actual: 2
            }
        ));
        assert!(accumulator.finalize(2).is_empty());
    }

    #[test]
    fn given_no_weights_anywhere_when_finalizing_then_matrix_is_empty() {
        let mut accumulator = WeightAccumulator::new(3, 4, None);
        accumulator.add(1, None, &[0, 1, 2]).expect("consistent");

        let weights = accumulator.finalize(2);
        assert!(weights.is_empty());
        assert_eq!(weights.joint_count(), 3);
        assert_eq!(weights.vertex_count(), 4);
    }
}
