//! # Apex Scan Matcher
//!
//! Occupancy-grid scan matching for 2D SLAM front-ends: a laser scan is aligned against a
//! probability grid by refining the pose `[x, y, θ]` with a Levenberg-Marquardt solver.
//!
//! ## Features
//!
//! - **Occupied-space cost**: bilinear interpolation of the grid probability under every scan point
//! - **Motion priors**: translation toward the previous pose, heading toward the initial estimate
//! - **Forward-mode autodiff**: residual Jacobians via dual numbers, no hand-written derivatives
//! - **Dense linear algebra**: QR or normal-equation Cholesky on the 3-dimensional pose block
//! - **Optional covariance**: inverse Gauss-Newton Hessian at the solution
//!
//! ## Example
//!
//! ```
//! use apex_scan_matcher::{MapLimits, PointCloud2D, ProbabilityGrid, SE2, ScanMatcher, ScanMatcherConfig};
//! use nalgebra::Point2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let limits = MapLimits::new(Point2::new(-2.0, -2.0), 0.05, 80, 80)?;
//! let grid = ProbabilityGrid::from_fn(limits, |x, _| (x.abs() > 1.5).then_some(0.9))?;
//! let scan = PointCloud2D::new(vec![Point2::new(1.6, 0.0), Point2::new(-1.6, 0.0)]);
//!
//! let matcher = ScanMatcher::new(ScanMatcherConfig::default())?;
//! let estimate = SE2::from_xy_angle(0.02, 0.0, 0.01);
//! let result = matcher.match_scan(&SE2::identity(), &estimate, &scan, &grid);
//! println!("{}", result.summary);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod factors;
pub mod grid;
pub mod linalg;
#[cfg(feature = "logging")]
pub mod logger;
pub mod manifold;
pub mod optimizer;
pub mod scan_matching;
pub mod sensor;

pub use error::{ScanMatcherError, ScanMatcherResult};

pub use factors::{
    AutoDiffCostFunction, Factor, OccupiedSpaceFactor, RotationDeltaFactor, TranslationDeltaFactor,
};
pub use grid::{MapLimits, ProbabilityGrid, ProbabilityGridView};
pub use linalg::{DenseCholeskySolver, DenseLinearSolver, DenseQRSolver, LinearSolverType};
#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::SE2;
pub use optimizer::{
    LevenbergMarquardt, LevenbergMarquardtConfig, OptimizationStatus, SolveSummary,
};
pub use scan_matching::{MatchResult, ScanMatcher, ScanMatcherConfig};
pub use sensor::PointCloud2D;
