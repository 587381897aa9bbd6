//! Levenberg-Marquardt algorithm implementation.
//!
//! The Levenberg-Marquardt (LM) method solves nonlinear least squares problems of the form:
//!
//! ```text
//! min f(x) = ½||r(x)||² = ½Σᵢ rᵢ(x)²
//! ```
//!
//! where `x = [x, y, θ]` is the pose parameter vector and `r: ℝ³ → ℝᵐ` the stacked residual.
//!
//! # Algorithm Overview
//!
//! Each iteration solves the damped normal equations:
//!
//! ```text
//! (J^T·J + λI)·h = -J^T·r
//! ```
//!
//! - **λ → 0** (small damping): Gauss-Newton step
//! - **λ → ∞** (large damping): short gradient-descent step
//!
//! ## Step Acceptance and Damping Update
//!
//! Each proposed step is judged by the gain ratio:
//!
//! ```text
//! ρ = (actual reduction) / (predicted reduction)
//!   = [f(xₖ) - f(xₖ + h)] / [f(xₖ) - L(h)]
//! ```
//!
//! where `L(h) = f(xₖ) + h^T·g + ½h^T·H·h` is the local quadratic model. A step is accepted
//! when `ρ > min_relative_decrease`; rejected steps leave the parameters untouched.
//!
//! **Damping update** (Nielsen's formula):
//! ```text
//! accepted: λₖ₊₁ = λₖ · max(1/3, 1 - (2ρ - 1)³),  ν = 2
//! rejected: λₖ₊₁ = λₖ · ν,                         ν = 2ν
//! ```
//!
//! # Termination
//!
//! - **Gradient**: `||J^T·r||∞ ≤ gradient_tolerance` (also checked before the first iteration)
//! - **Parameter**: `||h|| ≤ parameter_tolerance · (||x|| + parameter_tolerance)`
//! - **Function**: `|Δf| / f < function_tolerance` after an accepted step
//! - **Iterations**: `iteration >= max_iterations`
//! - **Numerical**: singular linear system or NaN/Inf values
//!
//! # Examples
//!
//! ```
//! use apex_scan_matcher::core::problem::Problem;
//! use apex_scan_matcher::factors::{AutoDiffCostFunction, TranslationDeltaFactor};
//! use apex_scan_matcher::optimizer::{LevenbergMarquardt, LevenbergMarquardtConfig};
//! use apex_scan_matcher::linalg::LinearSolverType;
//! use nalgebra::{Vector2, Vector3};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut problem = Problem::new();
//! let prior = TranslationDeltaFactor::new(Vector2::new(1.0, 2.0), 1.0);
//! problem.add_residual_block("translation_delta", Box::new(AutoDiffCostFunction::new(prior)));
//!
//! let config = LevenbergMarquardtConfig::new()
//!     .with_max_iterations(10)
//!     .with_linear_solver_type(LinearSolverType::DenseNormalCholesky);
//! let mut solver = LevenbergMarquardt::with_config(config);
//! let result = solver.optimize(&problem, &Vector3::zeros())?;
//!
//! assert!(result.summary.is_converged());
//! assert!((result.parameters - Vector3::new(1.0, 2.0, 0.0)).norm() < 1e-6);
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - Madsen, K., Nielsen, H. B., & Tingleff, O. (2004). *Methods for Non-Linear Least Squares Problems* (2nd ed.). Chapter 3.
//! - Nielsen, H. B. (1999). "Damping Parameter in Marquardt's Method". Technical Report IMM-REP-1999-05.

use crate::core::problem::Problem;
use crate::error;
use crate::linalg::{DenseCholeskySolver, DenseLinearSolver, DenseQRSolver, LinearSolverType};
use crate::optimizer::{
    OptimizationStatus, OptimizerError, OptimizerResult, SolveSummary, SolverResult, compute_cost,
};

use nalgebra::{DVector, Matrix3, MatrixXx3, Vector3};
use tracing::{debug, warn};
use web_time::Instant;

/// Per-iteration statistics for detailed logging (Ceres-style output).
#[derive(Debug, Clone)]
pub struct IterationStats {
    /// Iteration number (0 is the initial evaluation)
    pub iteration: usize,
    /// Cost function value after this iteration
    pub cost: f64,
    /// Change in cost from the previous iteration
    pub cost_change: f64,
    /// Infinity norm of the gradient (||J^T·r||∞)
    pub gradient_norm: f64,
    /// L2 norm of the parameter update step (||Δx||)
    pub step_norm: f64,
    /// Gain ratio (ρ = actual_reduction / predicted_reduction)
    pub tr_ratio: f64,
    /// Damping parameter λ after the update
    pub tr_radius: f64,
    /// Time taken for this iteration in milliseconds
    pub iter_time_ms: f64,
    /// Total elapsed time since optimization started in milliseconds
    pub total_time_ms: f64,
    /// Whether the step was accepted (true) or rejected (false)
    pub accepted: bool,
}

impl IterationStats {
    /// Print table header in Ceres-style format
    pub fn print_header() {
        debug!(
            "{:>4}  {:>13}  {:>13}  {:>13}  {:>13}  {:>11}  {:>11}  {:>11}  {:>13}  {:>6}",
            "iter",
            "cost",
            "cost_change",
            "|gradient|",
            "|step|",
            "tr_ratio",
            "tr_radius",
            "iter_time",
            "total_time",
            "status"
        );
    }

    /// Print single iteration line in Ceres-style format with scientific notation
    pub fn print_line(&self) {
        let status = if self.iteration == 0 {
            "-"
        } else if self.accepted {
            "✓"
        } else {
            "✗"
        };

        debug!(
            "{:>4}  {:>13.6e}  {:>13.2e}  {:>13.2e}  {:>13.2e}  {:>11.2e}  {:>11.2e}  {:>9.2}ms  {:>11.2}ms  {:>6}",
            self.iteration,
            self.cost,
            self.cost_change,
            self.gradient_norm,
            self.step_norm,
            self.tr_ratio,
            self.tr_radius,
            self.iter_time_ms,
            self.total_time_ms,
            status
        );
    }
}

/// Configuration parameters for the Levenberg-Marquardt optimizer.
///
/// ```
/// use apex_scan_matcher::optimizer::LevenbergMarquardtConfig;
///
/// let config = LevenbergMarquardtConfig::new()
///     .with_max_iterations(50)
///     .with_damping(1e-3)
///     .with_damping_bounds(1e-12, 1e12)
///     .with_jacobi_scaling(true);
/// assert!(config.validate().is_ok());
/// ```
///
/// Defaults follow Ceres Solver, except `max_iterations` which is 20.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct LevenbergMarquardtConfig {
    /// Type of linear solver for the damped normal equations
    pub linear_solver_type: LinearSolverType,
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Relative cost change tolerance
    pub function_tolerance: f64,
    /// Relative step size tolerance
    pub parameter_tolerance: f64,
    /// Gradient infinity norm tolerance
    pub gradient_tolerance: f64,
    /// Initial damping parameter
    pub damping: f64,
    /// Minimum damping parameter
    pub damping_min: f64,
    /// Maximum damping parameter
    pub damping_max: f64,
    /// Initial damping growth factor for rejected steps
    pub damping_nu: f64,
    /// Minimum gain ratio for step acceptance
    ///
    /// Default: 1e-3 (Ceres-compatible)
    pub min_relative_decrease: f64,
    /// Use Jacobi column scaling (preconditioning)
    ///
    /// Columns are scaled by `1 / (1 + ||J_col||)` computed at the first iteration. Useful
    /// when translation (meters) and heading (radians) columns differ in magnitude.
    pub use_jacobi_scaling: bool,
    /// Compute the 3×3 parameter covariance at the final estimate
    pub compute_covariance: bool,
    /// Multiplier applied to `(J^T·J)⁻¹`
    pub covariance_scale: f64,
}

impl Default for LevenbergMarquardtConfig {
    fn default() -> Self {
        Self {
            linear_solver_type: LinearSolverType::default(),
            max_iterations: 20,
            function_tolerance: 1e-6,
            parameter_tolerance: 1e-8,
            gradient_tolerance: 1e-10,
            damping: 1e-4,
            damping_min: 1e-12,
            damping_max: 1e12,
            damping_nu: 2.0,
            min_relative_decrease: 1e-3,
            use_jacobi_scaling: false,
            compute_covariance: false,
            covariance_scale: 1.0,
        }
    }
}

impl LevenbergMarquardtConfig {
    /// Create a new Levenberg-Marquardt configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the linear solver type
    pub fn with_linear_solver_type(mut self, linear_solver_type: LinearSolverType) -> Self {
        self.linear_solver_type = linear_solver_type;
        self
    }

    /// Set the maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the function (relative cost change) tolerance
    pub fn with_function_tolerance(mut self, function_tolerance: f64) -> Self {
        self.function_tolerance = function_tolerance;
        self
    }

    /// Set the parameter tolerance
    pub fn with_parameter_tolerance(mut self, parameter_tolerance: f64) -> Self {
        self.parameter_tolerance = parameter_tolerance;
        self
    }

    /// Set the gradient tolerance
    pub fn with_gradient_tolerance(mut self, gradient_tolerance: f64) -> Self {
        self.gradient_tolerance = gradient_tolerance;
        self
    }

    /// Set the initial damping parameter.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set the damping parameter bounds.
    pub fn with_damping_bounds(mut self, min: f64, max: f64) -> Self {
        self.damping_min = min;
        self.damping_max = max;
        self
    }

    /// Set minimum gain ratio for step acceptance.
    pub fn with_min_relative_decrease(mut self, min_decrease: f64) -> Self {
        self.min_relative_decrease = min_decrease;
        self
    }

    /// Enable or disable Jacobi column scaling (preconditioning).
    pub fn with_jacobi_scaling(mut self, use_jacobi_scaling: bool) -> Self {
        self.use_jacobi_scaling = use_jacobi_scaling;
        self
    }

    /// Enable or disable covariance computation (uncertainty estimation).
    pub fn with_compute_covariance(mut self, compute_covariance: bool) -> Self {
        self.compute_covariance = compute_covariance;
        self
    }

    /// Set the covariance multiplier.
    pub fn with_covariance_scale(mut self, covariance_scale: f64) -> Self {
        self.covariance_scale = covariance_scale;
        self
    }

    /// Check the iteration cap, tolerances and damping settings.
    ///
    /// # Errors
    /// Returns `OptimizerError::InvalidParameters` naming the first offending field.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.max_iterations == 0 {
            return Err(OptimizerError::InvalidParameters(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("function_tolerance", self.function_tolerance),
            ("parameter_tolerance", self.parameter_tolerance),
            ("gradient_tolerance", self.gradient_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(OptimizerError::InvalidParameters(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        if self.damping_min.is_nan()
            || self.damping_min <= 0.0
            || self.damping_min > self.damping_max
            || !self.damping_max.is_finite()
        {
            return Err(OptimizerError::InvalidParameters(format!(
                "damping bounds must satisfy 0 < min <= max < inf, got [{}, {}]",
                self.damping_min, self.damping_max
            )));
        }
        if !(self.damping_min..=self.damping_max).contains(&self.damping) {
            return Err(OptimizerError::InvalidParameters(format!(
                "initial damping {} outside [{}, {}]",
                self.damping, self.damping_min, self.damping_max
            )));
        }
        if !self.damping_nu.is_finite() || self.damping_nu <= 1.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "damping_nu must be finite and greater than 1, got {}",
                self.damping_nu
            )));
        }
        if !(0.0..1.0).contains(&self.min_relative_decrease) {
            return Err(OptimizerError::InvalidParameters(format!(
                "min_relative_decrease must lie in [0, 1), got {}",
                self.min_relative_decrease
            )));
        }
        if !self.covariance_scale.is_finite() || self.covariance_scale <= 0.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "covariance_scale must be finite and positive, got {}",
                self.covariance_scale
            )));
        }
        Ok(())
    }

    /// Print configuration parameters (debug level)
    pub fn print_configuration(&self) {
        debug!(
            "Configuration:\n  Solver:        Levenberg-Marquardt\n  Linear solver: {}\n  Convergence Criteria:\n  Max iterations:      {}\n  Function tolerance:  {:.2e}\n  Parameter tolerance: {:.2e}\n  Gradient tolerance:  {:.2e}\n  Damping Parameters:\n  Initial damping:     {:.2e}\n  Damping range:       [{:.2e}, {:.2e}]\n  Min rel. decrease:   {:.2e}\n  Numerical Settings:\n  Jacobi scaling:      {}\n  Compute covariance:  {}",
            self.linear_solver_type,
            self.max_iterations,
            self.function_tolerance,
            self.parameter_tolerance,
            self.gradient_tolerance,
            self.damping,
            self.damping_min,
            self.damping_max,
            self.min_relative_decrease,
            if self.use_jacobi_scaling {
                "enabled"
            } else {
                "disabled"
            },
            if self.compute_covariance {
                "enabled"
            } else {
                "disabled"
            }
        );
    }
}

/// Levenberg-Marquardt solver over the pose parameters `[x, y, θ]`.
///
/// The damping state is reset at the start of every [`optimize`](Self::optimize) call, so a
/// solver can be reused across problems.
pub struct LevenbergMarquardt {
    config: LevenbergMarquardtConfig,
    damping: f64,
    damping_nu: f64,
    jacobi_scaling: Option<Vector3<f64>>,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new()
    }
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt solver with default configuration.
    pub fn new() -> Self {
        Self::with_config(LevenbergMarquardtConfig::default())
    }

    /// Create a new Levenberg-Marquardt solver with the given configuration.
    pub fn with_config(config: LevenbergMarquardtConfig) -> Self {
        Self {
            damping: config.damping,
            damping_nu: config.damping_nu,
            config,
            jacobi_scaling: None,
        }
    }

    pub fn config(&self) -> &LevenbergMarquardtConfig {
        &self.config
    }

    /// Create the appropriate linear solver based on configuration
    fn create_linear_solver(&self) -> Box<dyn DenseLinearSolver> {
        match self.config.linear_solver_type {
            LinearSolverType::DenseQR => Box::new(DenseQRSolver::new()),
            LinearSolverType::DenseNormalCholesky => Box::new(DenseCholeskySolver::new()),
        }
    }

    /// Update damping parameter based on step quality.
    /// Reference: Introduction to Optimization and Data Fitting, Algorithm 6.18
    fn update_damping(&mut self, rho: f64) -> bool {
        if rho > self.config.min_relative_decrease {
            // Step accepted - decrease damping
            let coff = 2.0 * rho - 1.0;
            self.damping *= (1.0_f64 / 3.0).max(1.0 - coff * coff * coff);
            self.damping = self.damping.max(self.config.damping_min);
            self.damping_nu = 2.0;
            true
        } else {
            // Step rejected - increase damping
            self.damping *= self.damping_nu;
            self.damping_nu *= 2.0;
            self.damping = self.damping.min(self.config.damping_max);
            false
        }
    }

    /// Compute step quality ratio (actual vs predicted reduction)
    /// Reference: Damping parameter in Marquardt's method, Formula 2.2
    fn compute_step_quality(current_cost: f64, new_cost: f64, predicted_reduction: f64) -> f64 {
        if !new_cost.is_finite() {
            return 0.0;
        }
        let actual_reduction = current_cost - new_cost;
        if predicted_reduction.abs() < 1e-15 {
            if actual_reduction > 0.0 { 1.0 } else { 0.0 }
        } else {
            actual_reduction / predicted_reduction
        }
    }

    /// Predicted cost reduction of the local model: `½·hᵀ(λh - g)`
    fn compute_predicted_reduction(&self, step: &Vector3<f64>, gradient: &Vector3<f64>) -> f64 {
        0.5 * step.dot(&(self.damping * step - gradient))
    }

    /// Column scaling `1 / (1 + ||J_col||)`, fixed at the first iteration.
    fn process_jacobian(&mut self, jacobian: &MatrixXx3<f64>) -> MatrixXx3<f64> {
        let scaling = *self.jacobi_scaling.get_or_insert_with(|| {
            Vector3::from_fn(|c, _| 1.0 / (1.0 + jacobian.column(c).norm()))
        });
        let mut scaled = jacobian.clone();
        for (c, factor) in scaling.iter().enumerate() {
            scaled.column_mut(c).scale_mut(*factor);
        }
        scaled
    }

    fn gradient_norm(residuals: &DVector<f64>, jacobian: &MatrixXx3<f64>) -> f64 {
        let gradient: Vector3<f64> = jacobian.transpose() * residuals;
        gradient.amax()
    }

    /// Covariance `scale · (JᵀJ)⁻¹` at the final parameters.
    fn compute_covariance(
        &self,
        linear_solver: &mut Box<dyn DenseLinearSolver>,
        residuals: &DVector<f64>,
        jacobian: &MatrixXx3<f64>,
    ) -> Option<Matrix3<f64>> {
        if let Err(e) = linear_solver.solve_normal_equation(residuals, jacobian) {
            debug!("Covariance unavailable: {}", e);
            return None;
        }
        linear_solver
            .compute_covariance_matrix()
            .map(|covariance| covariance * self.config.covariance_scale)
    }

    /// Minimize `½||r(x)||²` starting from `initial_params`.
    ///
    /// Numerical trouble (singular system, NaN/Inf) ends the solve with the matching
    /// [`OptimizationStatus`] and the best parameters found so far; only invalid
    /// configuration and malformed factors are reported as errors.
    pub fn optimize(
        &mut self,
        problem: &Problem,
        initial_params: &Vector3<f64>,
    ) -> error::ScanMatcherResult<SolverResult> {
        self.config.validate().map_err(|e| e.log())?;

        let start_time = Instant::now();
        let debug_enabled = tracing::enabled!(tracing::Level::DEBUG);

        self.damping = self.config.damping;
        self.damping_nu = self.config.damping_nu;
        self.jacobi_scaling = None;

        let mut linear_solver = self.create_linear_solver();
        let mut params = *initial_params;

        let (mut residuals, mut jacobian) = problem.compute_residual_and_jacobian(&params)?;
        let mut cost_evaluations = 1;
        let mut jacobian_evaluations = 1;

        let initial_cost = compute_cost(&residuals);
        let mut current_cost = initial_cost;
        let mut gradient_norm = Self::gradient_norm(&residuals, &jacobian);
        let mut max_gradient_norm = gradient_norm;

        let mut iterations = 0;
        let mut successful_steps = 0;
        let mut unsuccessful_steps = 0;
        let mut final_parameter_update_norm = 0.0;
        let mut final_rho = 0.0;
        let mut iteration_history = Vec::new();

        if debug_enabled {
            self.config.print_configuration();
            IterationStats::print_header();
            let stats = IterationStats {
                iteration: 0,
                cost: current_cost,
                cost_change: 0.0,
                gradient_norm,
                step_norm: 0.0,
                tr_ratio: 0.0,
                tr_radius: self.damping,
                iter_time_ms: 0.0,
                total_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
                accepted: true,
            };
            stats.print_line();
            iteration_history.push(stats);
        }

        let status = if !initial_cost.is_finite() || !gradient_norm.is_finite() {
            OptimizationStatus::InvalidNumericalValues
        } else if gradient_norm <= self.config.gradient_tolerance {
            OptimizationStatus::GradientToleranceReached
        } else {
            loop {
                if iterations >= self.config.max_iterations {
                    break OptimizationStatus::MaxIterationsReached;
                }
                iterations += 1;
                let iter_start = Instant::now();

                // Solve (J_s^T·J_s + λI)·h_s = -J_s^T·r in the (optionally) scaled space
                let scaled_jacobian;
                let solve_jacobian = if self.config.use_jacobi_scaling {
                    scaled_jacobian = self.process_jacobian(&jacobian);
                    &scaled_jacobian
                } else {
                    &jacobian
                };

                let scaled_step = match linear_solver.solve_augmented_equation(
                    &residuals,
                    solve_jacobian,
                    self.damping,
                ) {
                    Ok(step) => step,
                    Err(e) => {
                        warn!("Levenberg-Marquardt linear solve failed: {}", e);
                        break OptimizationStatus::NumericalFailure;
                    }
                };
                let Some(scaled_gradient) = linear_solver.get_gradient().copied() else {
                    warn!("Linear solver did not cache the gradient");
                    break OptimizationStatus::NumericalFailure;
                };

                let step = match &self.jacobi_scaling {
                    Some(scaling) if self.config.use_jacobi_scaling => {
                        scaled_step.component_mul(scaling)
                    }
                    _ => scaled_step,
                };
                if step.iter().any(|value| !value.is_finite()) {
                    break OptimizationStatus::InvalidNumericalValues;
                }

                let step_norm = step.norm();
                final_parameter_update_norm = step_norm;

                let relative_step_tolerance = self.config.parameter_tolerance
                    * (params.norm() + self.config.parameter_tolerance);
                if step_norm <= relative_step_tolerance {
                    break OptimizationStatus::ParameterToleranceReached;
                }

                let candidate = params + step;
                let new_cost = compute_cost(&problem.compute_residual(&candidate)?);
                cost_evaluations += 1;

                let predicted_reduction =
                    self.compute_predicted_reduction(&scaled_step, &scaled_gradient);
                let rho = Self::compute_step_quality(current_cost, new_cost, predicted_reduction);
                final_rho = rho;
                let accepted = self.update_damping(rho);

                let previous_cost = current_cost;
                let mut termination = None;
                if accepted {
                    successful_steps += 1;
                    params = candidate;
                    current_cost = new_cost;

                    (residuals, jacobian) = problem.compute_residual_and_jacobian(&params)?;
                    jacobian_evaluations += 1;
                    gradient_norm = Self::gradient_norm(&residuals, &jacobian);
                    max_gradient_norm = max_gradient_norm.max(gradient_norm);

                    let relative_cost_change =
                        (previous_cost - current_cost).abs() / previous_cost.max(1e-10);
                    termination = if !gradient_norm.is_finite() {
                        Some(OptimizationStatus::InvalidNumericalValues)
                    } else if gradient_norm <= self.config.gradient_tolerance {
                        Some(OptimizationStatus::GradientToleranceReached)
                    } else if relative_cost_change < self.config.function_tolerance {
                        Some(OptimizationStatus::FunctionToleranceReached)
                    } else {
                        None
                    };
                } else {
                    unsuccessful_steps += 1;
                }

                if debug_enabled {
                    let stats = IterationStats {
                        iteration: iterations,
                        cost: current_cost,
                        cost_change: previous_cost - current_cost,
                        gradient_norm,
                        step_norm,
                        tr_ratio: rho,
                        tr_radius: self.damping,
                        iter_time_ms: iter_start.elapsed().as_secs_f64() * 1000.0,
                        total_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
                        accepted,
                    };
                    stats.print_line();
                    iteration_history.push(stats);
                }

                if let Some(status) = termination {
                    break status;
                }
            }
        };

        let covariance = if self.config.compute_covariance {
            self.compute_covariance(&mut linear_solver, &residuals, &jacobian)
        } else {
            None
        };

        let summary = SolveSummary {
            initial_cost,
            final_cost: current_cost,
            iterations,
            successful_steps,
            unsuccessful_steps,
            final_damping: self.damping,
            final_rho,
            final_gradient_norm: gradient_norm,
            max_gradient_norm,
            final_parameter_update_norm,
            cost_evaluations,
            jacobian_evaluations,
            total_time: start_time.elapsed(),
            iteration_history,
            status,
        };

        if debug_enabled {
            debug!("{}", summary);
        }

        Ok(SolverResult {
            parameters: params,
            summary,
            covariance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::{AutoDiffCostFunction, Factor, RotationDeltaFactor, TranslationDeltaFactor};
    use nalgebra::{Vector2, dvector};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// Rosenbrock valley in (x, y) plus a linear pull of θ toward 0:
    ///   r1 = 10(y - x²), r2 = 1 - x, r3 = 2θ
    #[derive(Debug, Clone)]
    struct RosenbrockFactor;

    impl Factor for RosenbrockFactor {
        fn linearize(
            &self,
            params: &Vector3<f64>,
            compute_jacobian: bool,
        ) -> (DVector<f64>, Option<MatrixXx3<f64>>) {
            let (x, y, theta) = (params[0], params[1], params[2]);
            let residual = dvector![10.0 * (y - x * x), 1.0 - x, 2.0 * theta];

            let jacobian = compute_jacobian.then(|| {
                MatrixXx3::from_row_slice(&[
                    -20.0 * x, 10.0, 0.0, //
                    -1.0, 0.0, 0.0, //
                    0.0, 0.0, 2.0,
                ])
            });

            (residual, jacobian)
        }

        fn get_dimension(&self) -> usize {
            3
        }
    }

    /// Residuals that are never finite.
    struct NanFactor;

    impl Factor for NanFactor {
        fn linearize(
            &self,
            _params: &Vector3<f64>,
            compute_jacobian: bool,
        ) -> (DVector<f64>, Option<MatrixXx3<f64>>) {
            (
                dvector![f64::NAN],
                compute_jacobian.then(|| MatrixXx3::from_row_slice(&[1.0, 0.0, 0.0])),
            )
        }

        fn get_dimension(&self) -> usize {
            1
        }
    }

    fn prior_problem<'a>() -> Problem<'a> {
        let mut problem = Problem::new();
        problem.add_residual_block(
            "translation_delta",
            Box::new(AutoDiffCostFunction::new(TranslationDeltaFactor::new(
                Vector2::new(1.0, -2.0),
                2.0,
            ))),
        );
        problem.add_residual_block(
            "rotation_delta",
            Box::new(AutoDiffCostFunction::new(RotationDeltaFactor::new(0.3, 4.0))),
        );
        problem
    }

    #[test]
    fn test_rosenbrock_optimization() -> TestResult {
        let mut problem = Problem::new();
        problem.add_residual_block("rosenbrock", Box::new(RosenbrockFactor));

        let config = LevenbergMarquardtConfig::new()
            .with_max_iterations(100)
            .with_function_tolerance(1e-8)
            .with_parameter_tolerance(1e-8)
            .with_gradient_tolerance(1e-10);

        for solver_type in [LinearSolverType::DenseQR, LinearSolverType::DenseNormalCholesky] {
            let mut solver =
                LevenbergMarquardt::with_config(config.clone().with_linear_solver_type(solver_type));
            let result = solver.optimize(&problem, &Vector3::new(-1.2, 1.0, 0.5))?;

            assert!(
                result.summary.is_converged(),
                "{solver_type}: optimization should converge, got {}",
                result.summary.status
            );
            assert!(
                (result.parameters[0] - 1.0).abs() < 1e-4,
                "x should converge to 1.0, got {}",
                result.parameters[0]
            );
            assert!(
                (result.parameters[1] - 1.0).abs() < 1e-4,
                "y should converge to 1.0, got {}",
                result.parameters[1]
            );
            assert!(result.parameters[2].abs() < 1e-4);
            assert!(
                result.summary.final_cost < 1e-6,
                "Final cost should be near zero, got {}",
                result.summary.final_cost
            );
            assert!(result.summary.final_cost <= result.summary.initial_cost);
            assert_eq!(
                result.summary.iterations,
                result.summary.successful_steps + result.summary.unsuccessful_steps
                    + usize::from(
                        result.summary.status == OptimizationStatus::ParameterToleranceReached
                    )
            );
        }
        Ok(())
    }

    #[test]
    fn test_empty_problem_terminates_immediately() -> TestResult {
        let problem = Problem::new();
        let initial = Vector3::new(1.0, 2.0, 3.0);

        let mut solver = LevenbergMarquardt::new();
        let result = solver.optimize(&problem, &initial)?;

        assert_eq!(result.parameters, initial);
        assert_eq!(result.summary.iterations, 0);
        assert_eq!(
            result.summary.status,
            OptimizationStatus::GradientToleranceReached
        );
        assert_eq!(result.summary.initial_cost, 0.0);
        assert_eq!(result.summary.final_cost, 0.0);
        Ok(())
    }

    #[test]
    fn test_linear_priors_reach_targets() -> TestResult {
        let problem = prior_problem();
        let mut solver = LevenbergMarquardt::new();
        let result = solver.optimize(&problem, &Vector3::new(-3.0, 4.0, -1.0))?;

        assert!(result.summary.is_converged(), "{}", result.summary.status);
        assert!((result.parameters - Vector3::new(1.0, -2.0, 0.3)).norm() < 1e-6);
        assert!(result.covariance.is_none());
        Ok(())
    }

    #[test]
    fn test_jacobi_scaling_reaches_same_solution() -> TestResult {
        let problem = prior_problem();
        let config = LevenbergMarquardtConfig::new().with_jacobi_scaling(true);
        let mut solver = LevenbergMarquardt::with_config(config);
        let result = solver.optimize(&problem, &Vector3::new(-3.0, 4.0, -1.0))?;

        assert!(result.summary.is_converged(), "{}", result.summary.status);
        assert!((result.parameters - Vector3::new(1.0, -2.0, 0.3)).norm() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_max_iterations_is_not_an_error() -> TestResult {
        let mut problem = Problem::new();
        problem.add_residual_block("rosenbrock", Box::new(RosenbrockFactor));

        let config = LevenbergMarquardtConfig::new().with_max_iterations(1);
        let mut solver = LevenbergMarquardt::with_config(config);
        let result = solver.optimize(&problem, &Vector3::new(-1.2, 1.0, 0.5))?;

        assert_eq!(result.summary.iterations, 1);
        assert_eq!(
            result.summary.status,
            OptimizationStatus::MaxIterationsReached
        );
        assert!(result.summary.final_cost <= result.summary.initial_cost);
        Ok(())
    }

    #[test]
    fn test_non_finite_cost_reported_as_status() -> TestResult {
        let mut problem = Problem::new();
        problem.add_residual_block("nan", Box::new(NanFactor));
        let initial = Vector3::new(0.5, 0.5, 0.5);

        let mut solver = LevenbergMarquardt::new();
        let result = solver.optimize(&problem, &initial)?;

        assert_eq!(
            result.summary.status,
            OptimizationStatus::InvalidNumericalValues
        );
        assert_eq!(result.summary.iterations, 0);
        assert_eq!(result.parameters, initial);
        Ok(())
    }

    #[test]
    fn test_covariance_of_linear_priors() -> TestResult {
        let problem = prior_problem();
        let config = LevenbergMarquardtConfig::new()
            .with_compute_covariance(true)
            .with_covariance_scale(2.0);
        let mut solver = LevenbergMarquardt::with_config(config);
        let result = solver.optimize(&problem, &Vector3::zeros())?;

        // JᵀJ = diag(4, 4, 16)
        let covariance = result.covariance.ok_or("covariance should be computed")?;
        let expected = Matrix3::from_diagonal(&Vector3::new(0.5, 0.5, 0.125));
        assert!((covariance - expected).amax() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_covariance_none_when_unobservable() -> TestResult {
        let mut problem = Problem::new();
        problem.add_residual_block(
            "translation_delta",
            Box::new(AutoDiffCostFunction::new(TranslationDeltaFactor::new(
                Vector2::new(1.0, 1.0),
                1.0,
            ))),
        );
        let config = LevenbergMarquardtConfig::new().with_compute_covariance(true);
        let mut solver = LevenbergMarquardt::with_config(config);
        let result = solver.optimize(&problem, &Vector3::zeros())?;

        assert!(result.summary.is_converged());
        assert!(result.covariance.is_none());
        Ok(())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let invalid = [
            LevenbergMarquardtConfig::new().with_max_iterations(0),
            LevenbergMarquardtConfig::new().with_function_tolerance(-1.0),
            LevenbergMarquardtConfig::new().with_gradient_tolerance(f64::NAN),
            LevenbergMarquardtConfig::new().with_damping_bounds(1.0, 0.1),
            LevenbergMarquardtConfig::new().with_damping(1e20),
            LevenbergMarquardtConfig::new().with_min_relative_decrease(1.5),
            LevenbergMarquardtConfig::new().with_covariance_scale(0.0),
        ];
        for config in invalid {
            assert!(
                matches!(
                    config.validate(),
                    Err(OptimizerError::InvalidParameters(_))
                ),
                "{config:?} should be rejected"
            );
        }

        let mut solver =
            LevenbergMarquardt::with_config(LevenbergMarquardtConfig::new().with_max_iterations(0));
        assert!(solver.optimize(&Problem::new(), &Vector3::zeros()).is_err());
    }

    #[test]
    fn test_step_quality_and_damping_update() {
        assert_eq!(LevenbergMarquardt::compute_step_quality(1.0, f64::NAN, 0.5), 0.0);
        assert_eq!(LevenbergMarquardt::compute_step_quality(1.0, 0.5, 0.0), 1.0);
        assert!((LevenbergMarquardt::compute_step_quality(1.0, 0.5, 0.25) - 2.0).abs() < 1e-12);

        let mut solver = LevenbergMarquardt::new();
        let initial = solver.damping;
        assert!(!solver.update_damping(0.0));
        assert!((solver.damping - 2.0 * initial).abs() < 1e-18);
        assert!(!solver.update_damping(-1.0));
        assert!((solver.damping - 8.0 * initial).abs() < 1e-18);
        assert!(solver.update_damping(1.0));
        assert!((solver.damping - 8.0 * initial / 3.0).abs() < 1e-18);
        assert_eq!(solver.damping_nu, 2.0);
    }
}
