//! Bilinear interpolation of cell-center probabilities.
//!
//! For a continuous map point, the four surrounding cell centers are found on the real
//! part of the coordinates; the fractional offsets keep their derivatives, so the result
//! is differentiable with respect to the point inside each interpolation patch.
//!
//! ```text
//! gx = (x - origin_x) / res - 0.5        x0 = ⌊gx⌋        fx = gx - x0
//! P  = (1-fx)(1-fy)·p00 + fx(1-fy)·p10 + (1-fx)fy·p01 + fx·fy·p11
//! ```

use super::ProbabilityGridView;
use crate::core::autodiff::AutoDiffScalar;

/// Interpolated occupancy probability at `(x, y)`.
///
/// Works with plain `f64` and with dual numbers. Non-finite coordinates yield a
/// non-finite result.
pub fn bilinear_probability<G, T>(grid: &G, x: T, y: T) -> T
where
    G: ProbabilityGridView + ?Sized,
    T: AutoDiffScalar,
{
    let limits = grid.limits();
    let inv_resolution = T::constant(1.0 / limits.resolution);
    let half = T::constant(0.5);

    let gx = (x - T::constant(limits.origin.x)) * inv_resolution - half;
    let gy = (y - T::constant(limits.origin.y)) * inv_resolution - half;

    let x0 = gx.value().floor();
    let y0 = gy.value().floor();
    let fx = gx - T::constant(x0);
    let fy = gy - T::constant(y0);

    // Saturating casts: NaN maps to 0, the NaN offsets still poison the result.
    let ix = x0 as i64;
    let iy = y0 as i64;
    let p00 = T::constant(grid.cell_probability(ix, iy));
    let p10 = T::constant(grid.cell_probability(ix.saturating_add(1), iy));
    let p01 = T::constant(grid.cell_probability(ix, iy.saturating_add(1)));
    let p11 = T::constant(grid.cell_probability(ix.saturating_add(1), iy.saturating_add(1)));

    let one = T::constant(1.0);
    (one - fx) * (one - fy) * p00 + fx * (one - fy) * p10 + (one - fx) * fy * p01 + fx * fy * p11
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{MIN_PROBABILITY, MapLimits, ProbabilityGrid};
    use nalgebra::Point2;
    use num_dual::Dual64;

    const TOLERANCE: f64 = 1e-12;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// 2x2 grid with resolution 1 and origin at (0, 0).
    fn two_by_two() -> Result<ProbabilityGrid, Box<dyn std::error::Error>> {
        let mut grid = ProbabilityGrid::new(MapLimits::new(Point2::origin(), 1.0, 2, 2)?);
        grid.set_probability(0, 0, 0.2)?;
        grid.set_probability(1, 0, 0.4)?;
        grid.set_probability(0, 1, 0.6)?;
        grid.set_probability(1, 1, 0.8)?;
        Ok(grid)
    }

    #[test]
    fn test_exact_at_cell_centers() -> TestResult {
        let grid = two_by_two()?;
        assert!((grid.query(0.5, 0.5) - 0.2).abs() < TOLERANCE);
        assert!((grid.query(1.5, 0.5) - 0.4).abs() < TOLERANCE);
        assert!((grid.query(0.5, 1.5) - 0.6).abs() < TOLERANCE);
        assert!((grid.query(1.5, 1.5) - 0.8).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_midpoints_average_neighbors() -> TestResult {
        let grid = two_by_two()?;
        assert!((grid.query(1.0, 0.5) - 0.3).abs() < TOLERANCE);
        assert!((grid.query(0.5, 1.0) - 0.4).abs() < TOLERANCE);
        assert!((grid.query(1.0, 1.0) - 0.5).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_far_outside_reads_free_space() -> TestResult {
        let grid = two_by_two()?;
        assert!((grid.query(-100.0, 50.0) - MIN_PROBABILITY).abs() < TOLERANCE);
        assert!((grid.query(1e30, -1e30) - MIN_PROBABILITY).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_gradient_inside_patch() -> TestResult {
        let grid = two_by_two()?;
        // Along x at y = 0.5 the field is 0.2 + 0.2·(x - 0.5) inside the patch.
        let p = bilinear_probability(&grid, Dual64::new(0.9, 1.0), Dual64::constant(0.5));
        assert!((p.re - 0.28).abs() < TOLERANCE);
        assert!((p.eps - 0.2).abs() < TOLERANCE);

        let p = bilinear_probability(&grid, Dual64::constant(0.9), Dual64::new(0.5, 1.0));
        assert!((p.eps - 0.4).abs() < TOLERANCE);
        Ok(())
    }

    #[test]
    fn test_non_finite_coordinates_propagate() -> TestResult {
        let grid = two_by_two()?;
        assert!(grid.query(f64::NAN, 0.5).is_nan());
        Ok(())
    }
}
