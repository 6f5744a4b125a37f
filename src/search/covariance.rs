//! Covariance bookkeeping for the evolution strategy.
//!
//! The adaptation step mutates the covariance matrix through cheap scalar and
//! rank-one updates, but sampling and path de-correlation need its
//! eigendecomposition. `CovarianceState` keeps the matrix together with a
//! cached decomposition that is recomputed only after a write, so a burst of
//! rank-one updates costs a single eigensolve.

use nalgebra::{DMatrix, DVector};

/// Eigenvalues are clamped to this floor so inverse square roots stay finite.
const EIGENVALUE_FLOOR: f64 = 1e-20;

/// Eigendecomposition of the covariance matrix, in the shape the sampling and
/// adaptation steps consume.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Eigenvalues, clamped to a small positive floor.
    pub eigenvalues: DVector<f64>,
    /// Square root of each eigenvalue, the per-axis sampling scale.
    pub sqrt_eigenvalues: DVector<f64>,
    /// Orthonormal eigenbasis, one eigenvector per column.
    pub eigenbasis: DMatrix<f64>,
    /// `C^(-1/2)`, used to de-correlate mean displacements.
    pub inverse_sqrt: DMatrix<f64>,
    /// Ratio of the largest to the smallest eigenvalue.
    pub condition_number: f64,
}

/// Covariance matrix plus a lazily recomputed decomposition cache.
#[derive(Debug, Clone)]
pub struct CovarianceState {
    matrix: DMatrix<f64>,
    decomposition: Option<Decomposition>,
}

impl CovarianceState {
    /// Identity covariance of the given dimension.
    pub fn identity(dim: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dim, dim),
            decomposition: None,
        }
    }

    /// The raw covariance matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Scales the whole matrix, invalidating the cached decomposition.
    pub fn scale(&mut self, factor: f64) {
        self.matrix *= factor;
        self.decomposition = None;
    }

    /// Adds `weight * v * v^T`, invalidating the cached decomposition.
    pub fn add_rank_one(&mut self, weight: f64, v: &DVector<f64>) {
        self.matrix.ger(weight, v, v, 1.0);
        self.decomposition = None;
    }

    /// The decomposition of the current matrix, recomputed only if a write
    /// happened since the last call.
    pub fn decomposition(&mut self) -> &Decomposition {
        let Self {
            matrix,
            decomposition,
        } = self;
        decomposition.get_or_insert_with(|| decompose(matrix))
    }
}

fn decompose(matrix: &DMatrix<f64>) -> Decomposition {
    // Accumulated floating-point updates drift off symmetric, and the
    // eigensolver assumes a symmetric input.
    let symmetric = (matrix + matrix.transpose()) * 0.5;
    let eigen = symmetric.symmetric_eigen();

    let eigenvalues = eigen.eigenvalues.map(|v| v.max(EIGENVALUE_FLOOR));
    let sqrt_eigenvalues = eigenvalues.map(f64::sqrt);
    let eigenbasis = eigen.eigenvectors;

    // C^(-1/2) = B * D^(-1/2) * B^T
    let inverse_diag = DMatrix::from_diagonal(&sqrt_eigenvalues.map(|v| 1.0 / v));
    let inverse_sqrt = &eigenbasis * inverse_diag * eigenbasis.transpose();

    let condition_number = eigenvalues.max() / eigenvalues.min();

    Decomposition {
        eigenvalues,
        sqrt_eigenvalues,
        eigenbasis,
        inverse_sqrt,
        condition_number,
    }
}
