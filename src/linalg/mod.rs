//! Dense linear solvers for the 3-parameter pose update.
//!
//! Every Levenberg-Marquardt iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λI)·h = -Jᵀr
//! ```
//!
//! with `J` an `M × 3` Jacobian. Two strategies are provided:
//! - [`DenseQRSolver`]: QR of the augmented matrix `[J; √λ·I]` (default, numerically robust)
//! - [`DenseCholeskySolver`]: Cholesky of the 3×3 normal matrix (cheaper)

pub mod cholesky;
pub mod qr;

use nalgebra::{DVector, Matrix3, MatrixXx3, Vector3};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;

pub use cholesky::DenseCholeskySolver;
pub use qr::DenseQRSolver;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinearSolverType {
    #[default]
    DenseQR,
    DenseNormalCholesky,
}

impl Display for LinearSolverType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverType::DenseQR => write!(f, "Dense QR"),
            LinearSolverType::DenseNormalCholesky => write!(f, "Dense normal Cholesky"),
        }
    }
}

/// Linear algebra specific error types
#[derive(Debug, Clone, Error)]
pub enum LinAlgError {
    /// Matrix factorization failed (Cholesky, QR, etc.)
    #[error("Matrix factorization failed: {0}")]
    FactorizationFailed(String),

    /// Singular or near-singular matrix detected
    #[error("Singular matrix detected (matrix is not invertible)")]
    SingularMatrix,

    /// Residual and Jacobian row counts disagree
    #[error("Dimension mismatch: {residuals} residuals for a Jacobian with {rows} rows")]
    DimensionMismatch { residuals: usize, rows: usize },
}

impl LinAlgError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| LinAlgError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Trait for dense solvers of the normal and augmented equations
pub trait DenseLinearSolver {
    /// Solve the normal equation: (Jᵀ·J)·dx = -Jᵀ·r
    ///
    /// # Errors
    /// Returns `LinAlgError` if the system is singular.
    fn solve_normal_equation(
        &mut self,
        residuals: &DVector<f64>,
        jacobian: &MatrixXx3<f64>,
    ) -> LinAlgResult<Vector3<f64>>;

    /// Solve the augmented equation: (Jᵀ·J + λI)·dx = -Jᵀ·r
    ///
    /// # Errors
    /// Returns `LinAlgError` if the system is singular.
    fn solve_augmented_equation(
        &mut self,
        residuals: &DVector<f64>,
        jacobian: &MatrixXx3<f64>,
        lambda: f64,
    ) -> LinAlgResult<Vector3<f64>>;

    /// Get the cached Hessian approximation (Jᵀ·J) from the last solve
    fn get_hessian(&self) -> Option<&Matrix3<f64>>;

    /// Get the cached gradient vector (Jᵀ·r) from the last solve
    fn get_gradient(&self) -> Option<&Vector3<f64>>;

    /// Compute the covariance matrix (H⁻¹) by inverting the cached Hessian
    ///
    /// Returns `None` if no Hessian is cached or it is singular.
    fn compute_covariance_matrix(&mut self) -> Option<&Matrix3<f64>>;

    /// Get the cached covariance matrix, if computed
    fn get_covariance_matrix(&self) -> Option<&Matrix3<f64>>;
}

pub(crate) fn check_dimensions(
    residuals: &DVector<f64>,
    jacobian: &MatrixXx3<f64>,
) -> LinAlgResult<()> {
    if residuals.len() != jacobian.nrows() {
        return Err(LinAlgError::DimensionMismatch {
            residuals: residuals.len(),
            rows: jacobian.nrows(),
        }
        .log());
    }
    Ok(())
}

/// Invert a symmetric positive definite information matrix.
pub(crate) fn invert_information(hessian: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    hessian.cholesky().map(|cholesky| cholesky.inverse())
}
