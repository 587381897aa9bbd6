use nalgebra::{DVector, Matrix3, MatrixXx3, Vector3};

use crate::linalg::{
    DenseLinearSolver, LinAlgError, LinAlgResult, check_dimensions, invert_information,
};

/// Solves the 3×3 normal equations with a Cholesky factorization.
#[derive(Debug, Clone, Default)]
pub struct DenseCholeskySolver {
    /// The Hessian approximation, computed as `(Jᵀ·J)`.
    hessian: Option<Matrix3<f64>>,

    /// The gradient vector, computed as `Jᵀ·r`.
    gradient: Option<Vector3<f64>>,

    /// The parameter covariance matrix, computed as `(Jᵀ·J)⁻¹`.
    ///
    /// This is `None` if the Hessian is singular or ill-conditioned.
    covariance_matrix: Option<Matrix3<f64>>,
}

impl DenseCholeskySolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard deviations of the parameters (square roots of the covariance diagonal).
    pub fn compute_standard_errors(&mut self) -> Option<Vector3<f64>> {
        let covariance = self.compute_covariance_matrix()?;
        let diagonal = covariance.diagonal();
        diagonal
            .iter()
            .all(|value| *value >= 0.0)
            .then(|| diagonal.map(f64::sqrt))
    }

    fn solve_damped(
        &mut self,
        residuals: &DVector<f64>,
        jacobian: &MatrixXx3<f64>,
        lambda: f64,
    ) -> LinAlgResult<Vector3<f64>> {
        check_dimensions(residuals, jacobian)?;

        // H = Jᵀ·J, g = Jᵀ·r
        let hessian: Matrix3<f64> = jacobian.transpose() * jacobian;
        let gradient: Vector3<f64> = jacobian.transpose() * residuals;

        let augmented = hessian + Matrix3::identity() * lambda;
        let cholesky = augmented
            .cholesky()
            .ok_or_else(|| LinAlgError::SingularMatrix.log())?;
        let dx = cholesky.solve(&(-gradient));

        self.hessian = Some(hessian);
        self.gradient = Some(gradient);
        self.covariance_matrix = None;

        if dx.iter().all(|value| value.is_finite()) {
            Ok(dx)
        } else {
            Err(LinAlgError::FactorizationFailed(
                "Cholesky solve produced non-finite values".to_string(),
            )
            .log())
        }
    }
}

impl DenseLinearSolver for DenseCholeskySolver {
    fn solve_normal_equation(
        &mut self,
        residuals: &DVector<f64>,
        jacobian: &MatrixXx3<f64>,
    ) -> LinAlgResult<Vector3<f64>> {
        self.solve_damped(residuals, jacobian, 0.0)
    }

    fn solve_augmented_equation(
        &mut self,
        residuals: &DVector<f64>,
        jacobian: &MatrixXx3<f64>,
        lambda: f64,
    ) -> LinAlgResult<Vector3<f64>> {
        self.solve_damped(residuals, jacobian, lambda)
    }

    fn get_hessian(&self) -> Option<&Matrix3<f64>> {
        self.hessian.as_ref()
    }

    fn get_gradient(&self) -> Option<&Vector3<f64>> {
        self.gradient.as_ref()
    }

    fn compute_covariance_matrix(&mut self) -> Option<&Matrix3<f64>> {
        if self.covariance_matrix.is_none() {
            self.covariance_matrix = self.hessian.as_ref().and_then(invert_information);
        }
        self.covariance_matrix.as_ref()
    }

    fn get_covariance_matrix(&self) -> Option<&Matrix3<f64>> {
        self.covariance_matrix.as_ref()
    }
}
