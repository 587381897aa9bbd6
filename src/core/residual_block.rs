//! Residual blocks: one named group of residuals in the stacked objective.
//!
//! A `ResidualBlock` wraps a [`Factor`] and remembers where its rows start in the stacked
//! residual vector and Jacobian. A scan match registers three blocks against the single
//! pose parameter vector `[x, y, theta]`:
//!
//! ```text
//! rows 0 .. N        occupied space (one per scan point)
//! rows N .. N+2      translation delta
//! row  N+2           rotation delta
//! ```
//!
//! All residuals are squared uniformly; no robust loss is applied.

use nalgebra::{DVector, MatrixXx3, Vector3};

use crate::core::{CoreError, CoreResult};
use crate::factors::Factor;

/// A residual block holding one factor of the objective.
///
/// # Thread Safety
///
/// Factors are `Send + Sync`, so blocks can be evaluated in parallel.
pub struct ResidualBlock<'a> {
    /// Unique identifier for this residual block
    pub residual_block_id: usize,

    /// Starting row index in the global residual vector and Jacobian matrix
    pub residual_row_start_idx: usize,

    /// Human readable name used in diagnostics
    pub name: String,

    /// The factor that computes residuals and Jacobians
    pub factor: Box<dyn Factor + 'a>,
}

impl<'a> ResidualBlock<'a> {
    pub fn new(
        residual_block_id: usize,
        residual_row_start_idx: usize,
        name: &str,
        factor: Box<dyn Factor + 'a>,
    ) -> Self {
        ResidualBlock {
            residual_block_id,
            residual_row_start_idx,
            name: name.to_string(),
            factor,
        }
    }

    /// Number of rows this block contributes.
    pub fn dimension(&self) -> usize {
        self.factor.get_dimension()
    }

    /// Evaluate the factor at `params` and validate the output shape.
    ///
    /// # Errors
    ///
    /// `CoreError::DimensionMismatch` if the residual or Jacobian row count differs from
    /// the factor's declared dimension, `CoreError::FactorLinearization` if a Jacobian was
    /// requested but not produced.
    pub fn linearize(
        &self,
        params: &Vector3<f64>,
        compute_jacobian: bool,
    ) -> CoreResult<(DVector<f64>, Option<MatrixXx3<f64>>)> {
        let expected = self.dimension();
        let (residual, jacobian) = self.factor.linearize(params, compute_jacobian);

        if residual.len() != expected {
            return Err(CoreError::DimensionMismatch {
                block: self.name.clone(),
                expected,
                actual: residual.len(),
            }
            .log());
        }

        match (&jacobian, compute_jacobian) {
            (Some(jac), _) if jac.nrows() != expected => Err(CoreError::DimensionMismatch {
                block: self.name.clone(),
                expected,
                actual: jac.nrows(),
            }
            .log()),
            (None, true) => Err(CoreError::FactorLinearization(format!(
                "block '{}' returned no Jacobian",
                self.name
            ))
            .log()),
            _ => Ok((residual, jacobian)),
        }
    }
}
