//! Occupancy-grid scan matching.
//!
//! [`ScanMatcher`] refines an initial pose estimate so that the laser scan lands on
//! occupied cells of a probability grid, while staying close to the previous pose
//! (translation) and the initial estimate (heading):
//!
//! ```text
//! residual block       residuals   target
//! occupied_space       N           w_o/√N · (1 - P(T·pᵢ))
//! translation_delta    2           w_t · (t - t_previous)
//! rotation_delta       1           w_r · wrap(θ - θ_initial)
//! ```
//!
//! # Example
//!
//! ```
//! use apex_scan_matcher::grid::{MapLimits, ProbabilityGrid};
//! use apex_scan_matcher::manifold::SE2;
//! use apex_scan_matcher::scan_matching::{ScanMatcher, ScanMatcherConfig};
//! use apex_scan_matcher::sensor::PointCloud2D;
//! use nalgebra::Point2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let limits = MapLimits::new(Point2::new(-1.0, -1.0), 0.05, 40, 40)?;
//! let grid = ProbabilityGrid::from_fn(limits, |x, _| (x > 0.5).then_some(0.9))?;
//! let scan = PointCloud2D::new(vec![Point2::new(0.7, 0.0), Point2::new(0.7, 0.2)]);
//!
//! let matcher = ScanMatcher::new(ScanMatcherConfig::default())?;
//! let previous = SE2::identity();
//! let result = matcher.match_scan(&previous, &previous, &scan, &grid);
//! assert!(result.summary.final_cost <= result.summary.initial_cost);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod matcher;

pub use config::{ConfigError, ScanMatcherConfig};
pub use matcher::{MatchResult, ScanMatcher};
