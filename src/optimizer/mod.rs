//! Iterative solver for the 3-parameter pose refinement problem.
//!
//! Only Levenberg-Marquardt is provided. The solver result carries the final
//! parameter vector, a [`SolveSummary`] and an optional 3×3 covariance.

use crate::linalg;
use nalgebra::{DVector, Matrix3, Vector3};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;
use web_time::Duration;

pub mod levenberg_marquardt;

pub use levenberg_marquardt::{IterationStats, LevenbergMarquardt, LevenbergMarquardtConfig};

/// Optimizer-specific error types
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Linear system solve failed during optimization
    #[error("Linear system solve failed: {0}")]
    LinearSolveFailed(String),

    /// Invalid optimization parameters provided
    #[error("Invalid optimization parameters: {0}")]
    InvalidParameters(String),

    /// Numerical instability detected (NaN, Inf in cost, gradient, or parameters)
    #[error("Numerical instability detected: {0}")]
    NumericalInstability(String),

    /// Linear algebra operation failed
    #[error("Linear algebra error: {0}")]
    LinAlg(#[from] linalg::LinAlgError),
}

impl OptimizerError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| OptimizerError::from(e).log())?;
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

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Status of an optimization process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// Relative cost change fell below the function tolerance
    FunctionToleranceReached,
    /// Gradient infinity norm fell below the gradient tolerance
    GradientToleranceReached,
    /// Step norm fell below the relative parameter tolerance
    ParameterToleranceReached,
    /// Maximum number of iterations reached
    MaxIterationsReached,
    /// Linear solve failed (singular or ill-conditioned normal equations)
    NumericalFailure,
    /// NaN or Inf detected in cost, gradient or step
    InvalidNumericalValues,
    /// The solve could not be set up
    Failed(String),
}

impl OptimizationStatus {
    /// True for the three tolerance-based terminations.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            OptimizationStatus::FunctionToleranceReached
                | OptimizationStatus::GradientToleranceReached
                | OptimizationStatus::ParameterToleranceReached
        )
    }
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::FunctionToleranceReached => write!(f, "Function tolerance reached"),
            OptimizationStatus::GradientToleranceReached => write!(f, "Gradient tolerance reached"),
            OptimizationStatus::ParameterToleranceReached => {
                write!(f, "Parameter tolerance reached")
            }
            OptimizationStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            OptimizationStatus::NumericalFailure => write!(f, "Numerical failure"),
            OptimizationStatus::InvalidNumericalValues => {
                write!(f, "Invalid numerical values (NaN/Inf) detected")
            }
            OptimizationStatus::Failed(msg) => write!(f, "Failed: {msg}"),
        }
    }
}

/// Diagnostics of one solve.
#[derive(Debug, Clone)]
pub struct SolveSummary {
    /// Cost `½‖r‖²` at the initial parameters
    pub initial_cost: f64,
    /// Cost at the returned parameters
    pub final_cost: f64,
    /// Number of iterations performed (0 if the start was already stationary)
    pub iterations: usize,
    /// Number of accepted steps
    pub successful_steps: usize,
    /// Number of rejected steps
    pub unsuccessful_steps: usize,
    /// Damping parameter when the solve stopped
    pub final_damping: f64,
    /// Gain ratio of the last evaluated step
    pub final_rho: f64,
    /// Gradient infinity norm at the returned parameters
    pub final_gradient_norm: f64,
    /// Maximum gradient infinity norm encountered
    pub max_gradient_norm: f64,
    /// L2 norm of the last computed step
    pub final_parameter_update_norm: f64,
    /// Cost function evaluation count
    pub cost_evaluations: usize,
    /// Jacobian evaluation count
    pub jacobian_evaluations: usize,
    /// Total time elapsed
    pub total_time: Duration,
    /// Per-iteration history, only collected when DEBUG logging is enabled
    pub iteration_history: Vec<IterationStats>,
    /// Termination status
    pub status: OptimizationStatus,
}

impl SolveSummary {
    /// Summary for a solve that never started.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            initial_cost: 0.0,
            final_cost: 0.0,
            iterations: 0,
            successful_steps: 0,
            unsuccessful_steps: 0,
            final_damping: 0.0,
            final_rho: 0.0,
            final_gradient_norm: 0.0,
            max_gradient_norm: 0.0,
            final_parameter_update_norm: 0.0,
            cost_evaluations: 0,
            jacobian_evaluations: 0,
            total_time: Duration::from_secs(0),
            iteration_history: Vec::new(),
            status: OptimizationStatus::Failed(reason.into()),
        }
    }

    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    pub fn average_time_per_iteration(&self) -> Duration {
        if self.iterations > 0 {
            self.total_time / self.iterations as u32
        } else {
            Duration::from_secs(0)
        }
    }
}

impl Display for SolveSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Levenberg-Marquardt Final Result")?;

        if self.is_converged() {
            writeln!(f, "CONVERGED ({})", self.status)?;
        } else {
            writeln!(f, "NOT CONVERGED ({})", self.status)?;
        }

        writeln!(f)?;
        writeln!(f, "Cost:")?;
        writeln!(f, "  Initial:   {:.6e}", self.initial_cost)?;
        writeln!(f, "  Final:     {:.6e}", self.final_cost)?;
        writeln!(
            f,
            "  Reduction: {:.6e} ({:.2}%)",
            self.initial_cost - self.final_cost,
            100.0 * (self.initial_cost - self.final_cost) / self.initial_cost.max(1e-12)
        )?;
        writeln!(f)?;
        writeln!(f, "Iterations:")?;
        writeln!(f, "  Total:              {}", self.iterations)?;
        writeln!(
            f,
            "  Successful steps:   {} ({:.1}%)",
            self.successful_steps,
            100.0 * self.successful_steps as f64 / self.iterations.max(1) as f64
        )?;
        writeln!(
            f,
            "  Unsuccessful steps: {} ({:.1}%)",
            self.unsuccessful_steps,
            100.0 * self.unsuccessful_steps as f64 / self.iterations.max(1) as f64
        )?;
        writeln!(f, "  Final damping:      {:.2e}", self.final_damping)?;
        writeln!(f)?;
        writeln!(f, "Gradient:")?;
        writeln!(f, "  Max norm:   {:.2e}", self.max_gradient_norm)?;
        writeln!(f, "  Final norm: {:.2e}", self.final_gradient_norm)?;
        writeln!(f)?;
        writeln!(f, "Parameter Update:")?;
        writeln!(f, "  Final norm: {:.2e}", self.final_parameter_update_norm)?;
        writeln!(f)?;
        writeln!(f, "Performance:")?;
        writeln!(
            f,
            "  Evaluations:            {} cost, {} jacobian",
            self.cost_evaluations, self.jacobian_evaluations
        )?;
        writeln!(
            f,
            "  Total time:             {:.2}ms",
            self.total_time.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "  Average per iteration:  {:.2}ms",
            self.average_time_per_iteration().as_secs_f64() * 1000.0
        )?;

        Ok(())
    }
}

/// Result of a solver execution.
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// Final parameters `[x, y, theta]`
    pub parameters: Vector3<f64>,
    /// Solve diagnostics
    pub summary: SolveSummary,
    /// Parameter covariance, when requested and the Hessian is invertible
    pub covariance: Option<Matrix3<f64>>,
}

pub fn compute_cost(residual: &DVector<f64>) -> f64 {
    0.5 * residual.norm_squared()
}
