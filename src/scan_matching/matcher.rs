use nalgebra::{Matrix3, Vector3};
use tracing::{debug, warn};

use crate::core::problem::Problem;
use crate::error::ScanMatcherResult;
use crate::factors::{
    AutoDiffCostFunction, OccupiedSpaceFactor, RotationDeltaFactor, TranslationDeltaFactor,
};
use crate::grid::ProbabilityGridView;
use crate::manifold::SE2;
use crate::optimizer::{LevenbergMarquardt, SolveSummary, SolverResult};
use crate::scan_matching::ScanMatcherConfig;
use crate::sensor::PointCloud2D;

/// Refined pose and solver diagnostics of one match.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub pose: SE2,
    pub summary: SolveSummary,
    /// `[x, y, θ]` covariance when `compute_covariance` is enabled
    pub covariance: Option<Matrix3<f64>>,
}

impl MatchResult {
    pub fn is_converged(&self) -> bool {
        self.summary.is_converged()
    }
}

/// Refines a pose against a probability grid.
///
/// Holds only its configuration; every [`match_scan`](Self::match_scan) call builds a
/// fresh problem and solver, so one matcher can be shared across threads.
#[derive(Debug, Clone)]
pub struct ScanMatcher {
    config: ScanMatcherConfig,
}

impl ScanMatcher {
    /// Validate the configuration and build a matcher.
    ///
    /// # Errors
    /// `ScanMatcherError::Config` for negative or non-finite weights and invalid
    /// solver settings.
    pub fn new(config: ScanMatcherConfig) -> ScanMatcherResult<Self> {
        config.validate().map_err(|e| e.log())?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScanMatcherConfig {
        &self.config
    }

    /// Refine `initial_pose_estimate` so `scan` agrees with `grid`.
    ///
    /// The translation is pulled toward `previous_pose`, the heading toward
    /// `initial_pose_estimate`. Hitting the iteration cap or a numerical failure is reported
    /// in the summary status with the best pose found so far. If the problem cannot be
    /// evaluated at all the initial estimate is returned with a `Failed` status.
    pub fn match_scan<G: ProbabilityGridView + ?Sized>(
        &self,
        previous_pose: &SE2,
        initial_pose_estimate: &SE2,
        scan: &PointCloud2D,
        grid: &G,
    ) -> MatchResult {
        let initial_params = initial_pose_estimate.to_vector();
        match self.solve(previous_pose, initial_pose_estimate, &initial_params, scan, grid) {
            Ok(result) => {
                // Untouched parameters hand back the caller's pose bit-for-bit
                let pose = if result.parameters == initial_params {
                    *initial_pose_estimate
                } else {
                    SE2::from(result.parameters)
                };
                debug!(
                    "Scan match: {} -> {} ({}, {} iterations)",
                    initial_pose_estimate, pose, result.summary.status, result.summary.iterations
                );
                MatchResult {
                    pose,
                    summary: result.summary,
                    covariance: result.covariance,
                }
            }
            Err(e) => {
                warn!("Scan match failed: {}", e.chain_compact());
                MatchResult {
                    pose: *initial_pose_estimate,
                    summary: SolveSummary::failed(e.to_string()),
                    covariance: None,
                }
            }
        }
    }

    fn solve<G: ProbabilityGridView + ?Sized>(
        &self,
        previous_pose: &SE2,
        initial_pose_estimate: &SE2,
        initial_params: &Vector3<f64>,
        scan: &PointCloud2D,
        grid: &G,
    ) -> ScanMatcherResult<SolverResult> {
        let mut problem = Problem::new();
        problem.add_residual_block(
            "occupied_space",
            Box::new(AutoDiffCostFunction::new(OccupiedSpaceFactor::new(
                self.config.occupied_space_weight,
                scan,
                grid,
            ))),
        );
        problem.add_residual_block(
            "translation_delta",
            Box::new(AutoDiffCostFunction::new(TranslationDeltaFactor::new(
                previous_pose.translation(),
                self.config.translation_weight,
            ))),
        );
        problem.add_residual_block(
            "rotation_delta",
            Box::new(AutoDiffCostFunction::new(RotationDeltaFactor::new(
                initial_pose_estimate.angle(),
                self.config.rotation_weight,
            ))),
        );

        let mut solver = LevenbergMarquardt::with_config(self.config.solver.clone());
        solver.optimize(&problem, initial_params)
    }
}
