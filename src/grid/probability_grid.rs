//! Dense probability grid.

use super::{
    GridError, GridResult, MAX_PROBABILITY, MIN_PROBABILITY, MapLimits, ProbabilityGridView,
    probability_from_log_odds,
};

/// Row-major dense grid of occupancy probabilities.
///
/// Unobserved cells are `None` and read as [`MIN_PROBABILITY`], as do indices outside the
/// grid. Stored values are clamped to `[MIN_PROBABILITY, MAX_PROBABILITY]`.
#[derive(Debug, Clone)]
pub struct ProbabilityGrid {
    limits: MapLimits,
    cells: Vec<Option<f64>>,
}

impl ProbabilityGrid {
    /// Create a grid with every cell unknown.
    pub fn new(limits: MapLimits) -> Self {
        Self {
            cells: vec![None; limits.num_cells()],
            limits,
        }
    }

    /// Build a grid by sampling `f` at each cell center; `None` leaves a cell unknown.
    pub fn from_fn<F>(limits: MapLimits, mut f: F) -> GridResult<Self>
    where
        F: FnMut(f64, f64) -> Option<f64>,
    {
        let mut grid = Self::new(limits);
        for iy in 0..limits.height as i64 {
            for ix in 0..limits.width as i64 {
                let center = limits.cell_center(ix, iy);
                if let Some(probability) = f(center.x, center.y) {
                    grid.set_probability(ix, iy, probability)?;
                }
            }
        }
        Ok(grid)
    }

    fn index(&self, ix: i64, iy: i64) -> Option<usize> {
        self.limits
            .contains(ix, iy)
            .then(|| iy as usize * self.limits.width + ix as usize)
    }

    /// Set a cell, clamping the value into the valid probability range.
    pub fn set_probability(&mut self, ix: i64, iy: i64, probability: f64) -> GridResult<()> {
        if !probability.is_finite() {
            return Err(GridError::InvalidProbability(probability).log());
        }
        let index = self.index(ix, iy).ok_or_else(|| {
            GridError::OutOfBounds {
                ix,
                iy,
                width: self.limits.width,
                height: self.limits.height,
            }
            .log()
        })?;
        self.cells[index] = Some(probability.clamp(MIN_PROBABILITY, MAX_PROBABILITY));
        Ok(())
    }

    /// Set a cell from a log-odds value.
    pub fn set_log_odds(&mut self, ix: i64, iy: i64, log_odds: f64) -> GridResult<()> {
        self.set_probability(ix, iy, probability_from_log_odds(log_odds))
    }

    /// Mark a cell as unknown again. Indices outside the grid are ignored.
    pub fn clear_cell(&mut self, ix: i64, iy: i64) {
        if let Some(index) = self.index(ix, iy) {
            self.cells[index] = None;
        }
    }

    /// Probability of cell `(ix, iy)`; unknown and out-of-bounds cells read as free.
    pub fn probability(&self, ix: i64, iy: i64) -> f64 {
        self.index(ix, iy)
            .and_then(|index| self.cells[index])
            .unwrap_or(MIN_PROBABILITY)
    }

    pub fn is_known(&self, ix: i64, iy: i64) -> bool {
        self.index(ix, iy)
            .is_some_and(|index| self.cells[index].is_some())
    }

    /// Number of cells holding an observed value.
    pub fn known_cell_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }
}

impl ProbabilityGridView for ProbabilityGrid {
    fn limits(&self) -> &MapLimits {
        &self.limits
    }

    fn cell_probability(&self, ix: i64, iy: i64) -> f64 {
        self.probability(ix, iy)
    }
}
