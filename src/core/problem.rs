//! Optimization problem definition and dense Jacobian computation.
//!
//! The `Problem` collects the residual blocks of one scan match and evaluates the stacked
//! residual vector `r(x)` and Jacobian `J = ∂r/∂x` for the pose parameter vector
//! `x = [x, y, theta]`:
//!
//! ```text
//! minimize ½ Σ_i ||r_i(x)||²
//! ```
//!
//! Because every block depends on the same three parameters, the Jacobian is a dense
//! `M × 3` matrix. Blocks are evaluated independently (in parallel with the `parallel`
//! feature) and then copied into their row ranges.
//!
//! # Example
//!
//! ```
//! use apex_scan_matcher::core::problem::Problem;
//! use apex_scan_matcher::factors::{AutoDiffCostFunction, TranslationDeltaFactor};
//! use nalgebra::{Vector2, Vector3};
//! # use apex_scan_matcher::error::ScanMatcherResult;
//! # fn example() -> ScanMatcherResult<()> {
//!
//! let mut problem = Problem::new();
//! let prior = TranslationDeltaFactor::new(Vector2::new(1.0, 2.0), 10.0);
//! let id = problem.add_residual_block("translation_delta", Box::new(AutoDiffCostFunction::new(prior)));
//!
//! let (residual, jacobian) = problem.compute_residual_and_jacobian(&Vector3::new(1.5, 2.0, 0.0))?;
//! assert_eq!(id, 0);
//! assert_eq!(residual.len(), 2);
//! assert!((residual[0] - 5.0).abs() < 1e-12);
//! assert!((jacobian[(0, 0)] - 10.0).abs() < 1e-12);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use nalgebra::{DVector, MatrixXx3, Vector3};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::core::{CoreError, CoreResult, residual_block::ResidualBlock};
use crate::factors::Factor;

type BlockEvaluation = (DVector<f64>, Option<MatrixXx3<f64>>);

/// The least-squares problem assembled for a single scan match.
pub struct Problem<'a> {
    /// Total number of stacked residual rows
    pub total_residual_dimension: usize,
    residual_blocks: Vec<ResidualBlock<'a>>,
}

impl Default for Problem<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Problem<'a> {
    /// Create an empty problem.
    ///
    /// ```
    /// use apex_scan_matcher::core::problem::Problem;
    ///
    /// let problem = Problem::new();
    /// assert_eq!(problem.num_residual_blocks(), 0);
    /// assert_eq!(problem.total_residual_dimension, 0);
    /// ```
    pub fn new() -> Self {
        Self {
            total_residual_dimension: 0,
            residual_blocks: Vec::new(),
        }
    }

    /// Add a residual block and return its id.
    ///
    /// Rows are assigned in insertion order.
    pub fn add_residual_block(&mut self, name: &str, factor: Box<dyn Factor + 'a>) -> usize {
        let block_id = self.residual_blocks.len();
        let dimension = factor.get_dimension();
        self.residual_blocks.push(ResidualBlock::new(
            block_id,
            self.total_residual_dimension,
            name,
            factor,
        ));
        self.total_residual_dimension += dimension;
        block_id
    }

    pub fn num_residual_blocks(&self) -> usize {
        self.residual_blocks.len()
    }

    pub fn residual_blocks(&self) -> &[ResidualBlock<'a>] {
        &self.residual_blocks
    }

    /// True when the problem contributes no residual rows at all.
    pub fn is_empty(&self) -> bool {
        self.total_residual_dimension == 0
    }

    /// Compute the stacked residual vector (no Jacobian).
    ///
    /// Used for the trial-step cost evaluation inside the solver loop.
    pub fn compute_residual(&self, params: &Vector3<f64>) -> CoreResult<DVector<f64>> {
        let blocks = self.evaluate_blocks(params, false)?;

        let mut residual = DVector::zeros(self.total_residual_dimension);
        for (block, (block_residual, _)) in self.residual_blocks.iter().zip(blocks) {
            residual
                .rows_mut(block.residual_row_start_idx, block_residual.len())
                .copy_from(&block_residual);
        }
        Ok(residual)
    }

    /// Compute the stacked residual vector and dense `M × 3` Jacobian.
    pub fn compute_residual_and_jacobian(
        &self,
        params: &Vector3<f64>,
    ) -> CoreResult<(DVector<f64>, MatrixXx3<f64>)> {
        let blocks = self.evaluate_blocks(params, true)?;

        let mut residual = DVector::zeros(self.total_residual_dimension);
        let mut jacobian = MatrixXx3::zeros(self.total_residual_dimension);
        for (block, (block_residual, block_jacobian)) in self.residual_blocks.iter().zip(blocks) {
            let start = block.residual_row_start_idx;
            let rows = block_residual.len();
            residual.rows_mut(start, rows).copy_from(&block_residual);

            let block_jacobian = block_jacobian.ok_or_else(|| {
                CoreError::FactorLinearization(format!(
                    "block '{}' returned no Jacobian",
                    block.name
                ))
                .log()
            })?;
            jacobian.rows_mut(start, rows).copy_from(&block_jacobian);
        }
        Ok((residual, jacobian))
    }

    /// Evaluate every block (parallel if feature enabled, sequential otherwise).
    fn evaluate_blocks(
        &self,
        params: &Vector3<f64>,
        compute_jacobian: bool,
    ) -> CoreResult<Vec<BlockEvaluation>> {
        #[cfg(feature = "parallel")]
        let blocks: CoreResult<Vec<BlockEvaluation>> = self
            .residual_blocks
            .par_iter()
            .map(|block| block.linearize(params, compute_jacobian))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let blocks: CoreResult<Vec<BlockEvaluation>> = self
            .residual_blocks
            .iter()
            .map(|block| block.linearize(params, compute_jacobian))
            .collect();

        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::{AutoDiffCostFunction, RotationDeltaFactor, TranslationDeltaFactor};
    use nalgebra::Vector2;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn prior_problem<'a>() -> Problem<'a> {
        let mut problem = Problem::new();
        problem.add_residual_block(
            "translation_delta",
            Box::new(AutoDiffCostFunction::new(TranslationDeltaFactor::new(
                Vector2::new(1.0, -1.0),
                2.0,
            ))),
        );
        problem.add_residual_block(
            "rotation_delta",
            Box::new(AutoDiffCostFunction::new(RotationDeltaFactor::new(0.5, 4.0))),
        );
        problem
    }

    #[test]
    fn test_row_offsets_follow_insertion_order() {
        let problem = prior_problem();
        assert_eq!(problem.num_residual_blocks(), 2);
        assert_eq!(problem.total_residual_dimension, 3);
        assert_eq!(problem.residual_blocks()[0].residual_row_start_idx, 0);
        assert_eq!(problem.residual_blocks()[1].residual_row_start_idx, 2);
        assert!(!problem.is_empty());
    }

    #[test]
    fn test_stacked_residual_and_jacobian() -> TestResult {
        let problem = prior_problem();
        let params = Vector3::new(2.0, 0.0, 0.75);

        let (residual, jacobian) = problem.compute_residual_and_jacobian(&params)?;
        assert_eq!(residual.len(), 3);
        assert!((residual[0] - 2.0).abs() < 1e-12);
        assert!((residual[1] - 2.0).abs() < 1e-12);
        assert!((residual[2] - 1.0).abs() < 1e-12);

        assert!((jacobian[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((jacobian[(1, 1)] - 2.0).abs() < 1e-12);
        assert!((jacobian[(2, 2)] - 4.0).abs() < 1e-12);
        assert!(jacobian[(2, 0)].abs() < 1e-12);

        let residual_only = problem.compute_residual(&params)?;
        assert!((residual_only - residual).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_empty_problem_evaluates_to_empty_system() -> TestResult {
        let problem = Problem::new();
        let (residual, jacobian) = problem.compute_residual_and_jacobian(&Vector3::zeros())?;
        assert!(problem.is_empty());
        assert_eq!(residual.len(), 0);
        assert_eq!(jacobian.nrows(), 0);
        Ok(())
    }
}
