use nalgebra::{DVector, Matrix3, MatrixXx3, Vector3};

use crate::linalg::{
    DenseLinearSolver, LinAlgError, LinAlgResult, check_dimensions, invert_information,
};

/// Solves the damped least-squares problem through a QR factorization of
///
/// ```text
/// ⎡   J  ⎤ h ≈ ⎡ -r ⎤
/// ⎣ √λ·I ⎦     ⎣  0 ⎦
/// ```
///
/// which avoids squaring the condition number of `J`.
#[derive(Debug, Clone, Default)]
pub struct DenseQRSolver {
    /// The Hessian approximation, computed as `(Jᵀ·J)`.
    hessian: Option<Matrix3<f64>>,

    /// The gradient vector, computed as `Jᵀ·r`.
    gradient: Option<Vector3<f64>>,

    /// The parameter covariance matrix, computed as `(Jᵀ·J)⁻¹`.
    ///
    /// This is `None` if the Hessian is singular or ill-conditioned.
    covariance_matrix: Option<Matrix3<f64>>,
}

impl DenseQRSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset covariance computation state
    pub fn reset_covariance(&mut self) {
        self.covariance_matrix = None;
    }

    fn solve_damped(
        &mut self,
        residuals: &DVector<f64>,
        jacobian: &MatrixXx3<f64>,
        lambda: f64,
    ) -> LinAlgResult<Vector3<f64>> {
        check_dimensions(residuals, jacobian)?;
        if lambda < 0.0 {
            return Err(LinAlgError::FactorizationFailed(format!(
                "negative damping {lambda} for augmented QR"
            ))
            .log());
        }

        let m = jacobian.nrows();
        let sqrt_lambda = lambda.sqrt();

        let mut augmented = MatrixXx3::<f64>::zeros(m + 3);
        augmented.rows_mut(0, m).copy_from(jacobian);
        for i in 0..3 {
            augmented[(m + i, i)] = sqrt_lambda;
        }

        let mut rhs = DVector::<f64>::zeros(m + 3);
        rhs.rows_mut(0, m).copy_from(&(-residuals));

        let qr = augmented.qr();
        qr.q_tr_mul(&mut rhs);
        let r_full = qr.r();
        let r = Matrix3::from_fn(|i, j| r_full[(i, j)]);

        // Rank check on the triangular factor
        let scale = r.amax();
        let threshold = f64::EPSILON * 3.0 * scale;
        if scale == 0.0 || r.diagonal().iter().any(|d| d.abs() <= threshold) {
            return Err(LinAlgError::SingularMatrix.log());
        }

        let qtb = Vector3::new(rhs[0], rhs[1], rhs[2]);
        let dx = r.solve_upper_triangular(&qtb).ok_or_else(|| {
            LinAlgError::FactorizationFailed("Back substitution on R failed".to_string()).log()
        })?;

        self.hessian = Some(jacobian.transpose() * jacobian);
        self.gradient = Some(jacobian.transpose() * residuals);
        self.covariance_matrix = None;

        Ok(dx)
    }
}

impl DenseLinearSolver for DenseQRSolver {
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
        if self.covariance_matrix.is_none()
            && let Some(hessian) = &self.hessian
        {
            self.covariance_matrix = invert_information(hessian);
        }
        self.covariance_matrix.as_ref()
    }

    fn get_covariance_matrix(&self) -> Option<&Matrix3<f64>> {
        self.covariance_matrix.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{DenseCholeskySolver, test_data};

    const TOLERANCE: f64 = 1e-10;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_qr_solver_creation() {
        let solver = DenseQRSolver::new();
        assert!(solver.get_hessian().is_none());
        assert!(solver.get_gradient().is_none());

        let default_solver = DenseQRSolver::default();
        assert!(default_solver.get_covariance_matrix().is_none());
    }

    /// Test numerical accuracy with known solution
    #[test]
    fn test_qr_numerical_accuracy() -> TestResult {
        let mut solver = DenseQRSolver::new();

        // I * x = -r with r = [-1, -2, -3]
        let jacobian = MatrixXx3::from_row_slice(&[
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ]);
        let residuals = DVector::from_vec(vec![-1.0, -2.0, -3.0]);

        let solution = solver.solve_normal_equation(&residuals, &jacobian)?;
        for i in 0..3 {
            let expected = (i + 1) as f64;
            assert!(
                (solution[i] - expected).abs() < TOLERANCE,
                "Expected {}, got {}",
                expected,
                solution[i]
            );
        }
        Ok(())
    }

    #[test]
    fn test_qr_matches_cholesky() -> TestResult {
        let (jacobian, residuals) = test_data::overdetermined();
        let mut qr = DenseQRSolver::new();
        let mut cholesky = DenseCholeskySolver::new();

        for lambda in [0.0, 0.01, 1.0, 100.0] {
            let a = qr.solve_augmented_equation(&residuals, &jacobian, lambda)?;
            let b = cholesky.solve_augmented_equation(&residuals, &jacobian, lambda)?;
            assert!(
                (a - b).amax() < 1e-9,
                "lambda {lambda}: QR {a} vs Cholesky {b}"
            );
        }
        Ok(())
    }

    /// Zero lambda in the augmented system behaves like the normal equation
    #[test]
    fn test_qr_zero_lambda_augmented() -> TestResult {
        let mut solver = DenseQRSolver::new();
        let (jacobian, residuals) = test_data::overdetermined();

        let normal_sol = solver.solve_normal_equation(&residuals, &jacobian)?;
        let augmented_sol = solver.solve_augmented_equation(&residuals, &jacobian, 0.0)?;
        assert!((normal_sol - augmented_sol).amax() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_qr_augmented_different_lambdas() -> TestResult {
        let mut solver = DenseQRSolver::new();
        let (jacobian, residuals) = test_data::overdetermined();

        let sol1 = solver.solve_augmented_equation(&residuals, &jacobian, 0.01)?;
        let sol2 = solver.solve_augmented_equation(&residuals, &jacobian, 1.0)?;
        assert!(
            (sol1 - sol2).amax() > TOLERANCE,
            "Solutions should differ with different lambda values"
        );
        Ok(())
    }

    #[test]
    fn test_qr_rank_deficient_matrix() -> TestResult {
        let (jacobian, residuals) = test_data::rank_deficient();
        let mut solver = DenseQRSolver::new();

        let result = solver.solve_normal_equation(&residuals, &jacobian);
        assert!(matches!(result, Err(LinAlgError::SingularMatrix)));

        // Damping makes the system solvable; the unobservable direction stays put
        let dx = solver.solve_augmented_equation(&residuals, &jacobian, 1e-3)?;
        assert!(dx[2].abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_qr_underdetermined_without_damping() {
        let jacobian = MatrixXx3::from_row_slice(&[1.0, 2.0, 3.0]);
        let residuals = DVector::from_vec(vec![1.0]);
        let mut solver = DenseQRSolver::new();
        assert!(solver.solve_normal_equation(&residuals, &jacobian).is_err());
    }

    #[test]
    fn test_qr_negative_lambda_rejected() {
        let (jacobian, residuals) = test_data::overdetermined();
        let mut solver = DenseQRSolver::new();
        let result = solver.solve_augmented_equation(&residuals, &jacobian, -1.0);
        assert!(matches!(result, Err(LinAlgError::FactorizationFailed(_))));
    }

    #[test]
    fn test_qr_covariance_well_conditioned() -> TestResult {
        let mut solver = DenseQRSolver::new();
        let jacobian = MatrixXx3::from_row_slice(&[
            2.0, 0.0, 0.0, //
            0.0, 3.0, 0.0, //
            0.0, 0.0, 4.0,
        ]);
        let residuals = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        solver.solve_normal_equation(&residuals, &jacobian)?;

        // H = diag(4, 9, 16), so the covariance is its inverse
        let cov = solver
            .compute_covariance_matrix()
            .ok_or("covariance should be available")?;
        assert!((cov[(0, 0)] - 0.25).abs() < TOLERANCE);
        assert!((cov[(1, 1)] - 1.0 / 9.0).abs() < TOLERANCE);
        assert!((cov[(2, 2)] - 1.0 / 16.0).abs() < TOLERANCE);
        assert!(cov[(0, 1)].abs() < TOLERANCE);
        assert!(cov[(1, 2)].abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_qr_covariance_reset_by_new_solve() -> TestResult {
        let mut solver = DenseQRSolver::new();
        let (jacobian, residuals) = test_data::overdetermined();

        solver.solve_normal_equation(&residuals, &jacobian)?;
        assert!(solver.compute_covariance_matrix().is_some());
        assert!(solver.get_covariance_matrix().is_some());

        solver.solve_augmented_equation(&residuals, &jacobian, 1.0)?;
        assert!(solver.get_covariance_matrix().is_none());

        solver.compute_covariance_matrix();
        solver.reset_covariance();
        assert!(solver.get_covariance_matrix().is_none());
        Ok(())
    }
}
