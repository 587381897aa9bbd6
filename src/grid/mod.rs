//! Occupancy probability grids read by the scan matcher.
//!
//! The matcher only needs read access to a probability field over continuous map
//! coordinates. That access is expressed by [`ProbabilityGridView`]; mapping pipelines can
//! implement it over their own storage. [`ProbabilityGrid`] is a dense reference
//! implementation.
//!
//! # Cell geometry
//!
//! Cell `(ix, iy)` covers `[origin + i·res, origin + (i+1)·res)` on each axis and its value
//! is attached to the cell center. Continuous queries interpolate bilinearly between the
//! four nearest cell centers (see [`interpolation`]).
//!
//! # Out-of-bounds policy
//!
//! Every integer cell index has a probability. Cells outside the grid, and cells never
//! observed, read as [`MIN_PROBABILITY`] (free space). A scan point far outside the map
//! therefore contributes a constant, zero-gradient residual instead of an error.

use nalgebra::Point2;
use thiserror::Error;
use tracing::error;

pub mod interpolation;
pub mod probability_grid;

pub use interpolation::bilinear_probability;
pub use probability_grid::ProbabilityGrid;

/// Lowest probability a cell can hold; also the value of unknown and out-of-bounds cells.
pub const MIN_PROBABILITY: f64 = 0.1;
/// Highest probability a cell can hold.
pub const MAX_PROBABILITY: f64 = 0.9;

/// Grid-specific error types
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GridError {
    /// Resolution must be finite and strictly positive
    #[error("Invalid grid resolution: {0}")]
    InvalidResolution(f64),

    /// Grid must have at least one cell on each axis
    #[error("Invalid grid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Origin coordinates must be finite
    #[error("Invalid grid origin: ({x}, {y})")]
    InvalidOrigin { x: f64, y: f64 },

    /// Cell index outside the grid
    #[error("Cell ({ix}, {iy}) is outside the {width}x{height} grid")]
    OutOfBounds {
        ix: i64,
        iy: i64,
        width: usize,
        height: usize,
    },

    /// Probability value is NaN or infinite
    #[error("Invalid probability value: {0}")]
    InvalidProbability(f64),
}

impl GridError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for grid operations
pub type GridResult<T> = Result<T, GridError>;

/// Placement and size of a grid in the map frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapLimits {
    /// Map coordinates of the lower-left corner of cell (0, 0)
    pub origin: Point2<f64>,
    /// Cell edge length in meters
    pub resolution: f64,
    /// Number of cells along x
    pub width: usize,
    /// Number of cells along y
    pub height: usize,
}

impl MapLimits {
    /// Create validated map limits.
    pub fn new(
        origin: Point2<f64>,
        resolution: f64,
        width: usize,
        height: usize,
    ) -> GridResult<Self> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidResolution(resolution).log());
        }
        // Cell storage must stay addressable, see `Vec` capacity limits
        let addressable = width
            .checked_mul(height)
            .and_then(|cells| cells.checked_mul(std::mem::size_of::<Option<f64>>()))
            .is_some_and(|bytes| bytes <= isize::MAX as usize);
        if width == 0 || height == 0 || !addressable {
            return Err(GridError::InvalidDimensions { width, height }.log());
        }
        if !origin.x.is_finite() || !origin.y.is_finite() {
            return Err(GridError::InvalidOrigin {
                x: origin.x,
                y: origin.y,
            }
            .log());
        }
        Ok(Self {
            origin,
            resolution,
            width,
            height,
        })
    }

    /// Total number of cells.
    pub fn num_cells(&self) -> usize {
        self.width * self.height
    }

    /// Whether the integer cell index lies inside the grid.
    pub fn contains(&self, ix: i64, iy: i64) -> bool {
        ix >= 0 && iy >= 0 && (ix as u64) < self.width as u64 && (iy as u64) < self.height as u64
    }

    /// Index of the cell containing the map point `(x, y)`.
    pub fn cell_index(&self, x: f64, y: f64) -> (i64, i64) {
        (
            ((x - self.origin.x) / self.resolution).floor() as i64,
            ((y - self.origin.y) / self.resolution).floor() as i64,
        )
    }

    /// Map coordinates of the center of cell `(ix, iy)`.
    pub fn cell_center(&self, ix: i64, iy: i64) -> Point2<f64> {
        Point2::new(
            self.origin.x + (ix as f64 + 0.5) * self.resolution,
            self.origin.y + (iy as f64 + 0.5) * self.resolution,
        )
    }

    /// Map coordinates of the upper-right corner of the grid.
    pub fn max(&self) -> Point2<f64> {
        Point2::new(
            self.origin.x + self.width as f64 * self.resolution,
            self.origin.y + self.height as f64 * self.resolution,
        )
    }
}

/// Read-only access to an occupancy probability field.
///
/// Implementors must return a probability for every integer cell index, including
/// indices outside the stored area (see the module-level out-of-bounds policy).
pub trait ProbabilityGridView: Sync {
    fn limits(&self) -> &MapLimits;

    /// Probability stored at cell `(ix, iy)`.
    fn cell_probability(&self, ix: i64, iy: i64) -> f64;

    /// Bilinearly interpolated probability at map coordinates `(x, y)`.
    fn query(&self, x: f64, y: f64) -> f64 {
        bilinear_probability(self, x, y)
    }
}

/// Log-odds of a probability: `ln(p / (1 - p))`.
pub fn log_odds(probability: f64) -> f64 {
    (probability / (1.0 - probability)).ln()
}

/// Inverse of [`log_odds`].
pub fn probability_from_log_odds(log_odds: f64) -> f64 {
    1.0 - 1.0 / (1.0 + log_odds.exp())
}
