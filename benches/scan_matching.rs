//! Scan matching benchmark
//!
//! Matches simulated scans of a rectangular room against its probability grid for a range of
//! scan sizes and both dense linear solvers, then prints a summary table.
//!
//! ### Timing Methodology:
//! - Timing wraps `ScanMatcher::match_scan` only; grid and scan construction are excluded
//! - Each configuration is run `RUNS` times and the wall-clock time is averaged
//!
//! Run with `cargo bench --bench scan_matching`; `RUST_LOG=debug` adds the per-iteration table.

use std::f64::consts::PI;
use std::hint::black_box;
use std::time::Instant;

use apex_scan_matcher::linalg::LinearSolverType;
use apex_scan_matcher::optimizer::LevenbergMarquardtConfig;
use apex_scan_matcher::{
    MapLimits, PointCloud2D, ProbabilityGrid, SE2, ScanMatcher, ScanMatcherConfig, init_logger,
};
use nalgebra::Point2;
use tracing::{info, warn};

const RUNS: usize = 20;
const ROOM_WIDTH: f64 = 10.0;
const ROOM_HEIGHT: f64 = 6.0;
const RESOLUTION: f64 = 0.05;

struct BenchResult {
    solver: LinearSolverType,
    points: usize,
    avg_time_us: f64,
    iterations: usize,
    final_cost: f64,
    translation_error: f64,
    converged: bool,
}

fn room_grid() -> Result<ProbabilityGrid, Box<dyn std::error::Error>> {
    let margin = 0.5 + 0.5 * RESOLUTION;
    let limits = MapLimits::new(
        Point2::new(-0.5 * ROOM_WIDTH - margin, -0.5 * ROOM_HEIGHT - margin),
        RESOLUTION,
        ((ROOM_WIDTH + 2.0 * margin) / RESOLUTION).ceil() as usize,
        ((ROOM_HEIGHT + 2.0 * margin) / RESOLUTION).ceil() as usize,
    )?;
    let (half_w, half_h) = (0.5 * ROOM_WIDTH, 0.5 * ROOM_HEIGHT);
    Ok(ProbabilityGrid::from_fn(limits, |x, y| {
        let wall = (x.abs() - half_w).abs() < RESOLUTION || (y.abs() - half_h).abs() < RESOLUTION;
        wall.then_some(0.9)
    })?)
}

fn simulate_scan(pose: &SE2, beams: usize) -> PointCloud2D {
    let (half_w, half_h) = (0.5 * ROOM_WIDTH, 0.5 * ROOM_HEIGHT);
    let increment = 2.0 * PI / beams as f64;
    (0..beams)
        .map(|i| {
            let bearing = i as f64 * increment;
            let heading = pose.angle() + bearing;
            let (dx, dy) = (heading.cos(), heading.sin());
            let tx = if dx.abs() > 1e-12 {
                (dx.signum() * half_w - pose.x()) / dx
            } else {
                f64::INFINITY
            };
            let ty = if dy.abs() > 1e-12 {
                (dy.signum() * half_h - pose.y()) / dy
            } else {
                f64::INFINITY
            };
            let range = tx.min(ty);
            Point2::new(range * bearing.cos(), range * bearing.sin())
        })
        .collect()
}

fn run_case(
    grid: &ProbabilityGrid,
    solver: LinearSolverType,
    beams: usize,
) -> Result<BenchResult, Box<dyn std::error::Error>> {
    let truth = SE2::from_xy_angle(0.7, -0.4, 0.15);
    let estimate = SE2::from_xy_angle(0.75, -0.43, 0.18);
    let scan = simulate_scan(&truth, beams);

    let matcher = ScanMatcher::new(
        ScanMatcherConfig::new()
            .with_solver(LevenbergMarquardtConfig::new().with_linear_solver_type(solver)),
    )?;

    let mut total_us = 0.0;
    let mut last = None;
    for _ in 0..RUNS {
        let start = Instant::now();
        let result = matcher.match_scan(&estimate, &estimate, black_box(&scan), grid);
        total_us += start.elapsed().as_secs_f64() * 1e6;
        last = Some(result);
    }
    let result = last.ok_or("no benchmark runs")?;

    Ok(BenchResult {
        solver,
        points: scan.len(),
        avg_time_us: total_us / RUNS as f64,
        iterations: result.summary.iterations,
        final_cost: result.summary.final_cost,
        translation_error: (result.pose.translation() - truth.translation()).norm(),
        converged: result.is_converged(),
    })
}

fn format_summary_table(results: &[BenchResult]) {
    info!("Final summary table:");
    info!(
        "{:<20} | {:<7} | {:<12} | {:<5} | {:<12} | {:<10} | {:<9}",
        "Solver", "Points", "Time(us)", "Iters", "Final Cost", "Error(m)", "Converged"
    );
    info!("{}", "-".repeat(92));
    for result in results {
        info!(
            "{:<20} | {:<7} | {:<12.1} | {:<5} | {:<12.6e} | {:<10.4} | {:<9}",
            result.solver.to_string(),
            result.points,
            result.avg_time_us,
            result.iterations,
            result.final_cost,
            result.translation_error,
            result.converged
        );
    }
    info!("{}", "-".repeat(92));

    let converged = results.iter().filter(|r| r.converged).count();
    info!("Summary: {}/{} configurations converged", converged, results.len());
}

fn main() {
    init_logger();

    let grid = match room_grid() {
        Ok(grid) => grid,
        Err(e) => {
            warn!("Failed to build room grid: {}", e);
            return;
        }
    };

    let mut results = Vec::new();
    for solver in [LinearSolverType::DenseQR, LinearSolverType::DenseNormalCholesky] {
        for beams in [90, 360, 1440] {
            match run_case(&grid, solver, beams) {
                Ok(result) => results.push(result),
                Err(e) => warn!("{} with {} beams failed: {}", solver, beams, e),
            }
        }
    }

    format_summary_table(&results);
}
