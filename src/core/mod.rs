//! Core optimization components for pose refinement
//!
//! This module contains the building blocks of the least-squares problem built for one match:
//! - Forward-mode automatic differentiation of generic cost functors
//! - Residual blocks
//! - Problem assembly and stacked residual/Jacobian evaluation

pub mod autodiff;
pub mod problem;
pub mod residual_block;

use thiserror::Error;
use tracing::error;

/// Core module error types for problem assembly and evaluation
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Residual block operation failed
    #[error("Residual block error: {0}")]
    ResidualBlock(String),

    /// Factor linearization failed
    #[error("Factor linearization failed: {0}")]
    FactorLinearization(String),

    /// Dimension mismatch between residual/Jacobian and the declared block size
    #[error("Dimension mismatch in block '{block}': expected {expected} rows, got {actual}")]
    DimensionMismatch {
        block: String,
        expected: usize,
        actual: usize,
    },

    /// Invalid input parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| CoreError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the underlying source error
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for core module operations
pub type CoreResult<T> = Result<T, CoreError>;
