//! Error types for the apex-scan-matcher library
//!
//! All errors use the `thiserror` crate for automatic trait implementations.
//!
//! # Error Hierarchy
//!
//! - **`ScanMatcherError`** is the top-level error exposed by public APIs
//! - **Module errors** (`CoreError`, `OptimizerError`, `GridError`, ...) are wrapped inside it
//! - **Error sources** are preserved, allowing full error chain inspection
//!
//! Example error chain:
//! ```text
//! ScanMatcherError::Config(
//!     ConfigError::Solver(
//!         OptimizerError::InvalidParameters("max_iterations must be greater than 0")
//!     )
//! )
//! ```
//!
//! Numerical trouble during a solve is not an error: it is reported through the
//! termination status of the solve summary.

use crate::{
    core::CoreError, grid::GridError, linalg::LinAlgError, optimizer::OptimizerError,
    scan_matching::ConfigError,
};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the apex-scan-matcher library
pub type ScanMatcherResult<T> = Result<T, ScanMatcherError>;

/// Main error type for the apex-scan-matcher library
///
/// # Error Chain Access
///
/// ```rust,ignore
/// if let Err(e) = ScanMatcher::new(config) {
///     warn!("Full chain: {}", e.chain());
/// }
/// ```
#[derive(Debug, Error)]
pub enum ScanMatcherError {
    /// Core module errors (problem assembly, residual evaluation)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Optimization algorithm errors
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Linear algebra errors
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),

    /// Probability grid errors
    #[error(transparent)]
    Grid(#[from] GridError),

    /// Matcher configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ScanMatcherError {
    /// Get the full error chain as a string for logging and debugging.
    ///
    /// Traverses the source chain from the top-level error down to the root cause,
    /// one error per line.
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Get a compact single-line error chain for logging
    ///
    /// ```rust,ignore
    /// error!("Construction failed: {}", err.chain_compact());
    /// // Output: "Invalid solver configuration → Invalid optimization parameters: ..."
    /// ```
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}
