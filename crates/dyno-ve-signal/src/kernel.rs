//! K1 adaptive smoothing kernel.
//!
//! Four stages run in a fixed order over an 11×5 [`Grid`]:
//!
//! 1. [`gradient_map`]: largest absolute step to a populated 4-neighbour.
//! 2. [`adaptive_smooth`]: magnitude-dependent number of neighbour-averaging
//!    passes. Large corrections (|v| ≥ 3) are left alone, small ones
//!    (|v| ≤ 1) get the full pass count.
//! 3. [`gradient_limited_blend`]: steep cells are pulled back toward their
//!    original value.
//! 4. [`coverage_weighted_pass`]: a light final blend with the neighbours.
//!
//! "No data" cells stay empty through every stage and never contribute to
//! a neighbour average.

use dyno_ve_core::{CellIndex, Grid};

/// Magnitude at or above which a cell is never averaged.
pub const PRESERVE_MAGNITUDE: f64 = 3.0;
/// Magnitude at or below which a cell receives every pass.
pub const FULL_SMOOTH_MAGNITUDE: f64 = 1.0;
/// Center weight in the coverage-weighted pass.
pub const COVERAGE_CENTER_WEIGHT: f64 = 1.25;
/// Share of the neighbourhood average in the coverage-weighted pass.
pub const COVERAGE_MIX: f64 = 0.20;

/// Stage 1. Each populated cell gets the maximum absolute difference to its
/// populated 4-neighbours, or 0 when it has none.
#[must_use]
pub fn gradient_map(grid: &Grid) -> Grid {
    Grid::from_fn(|cell| {
        let center = grid.get(cell)?;
        Some(
            grid.neighbor_values(cell)
                .map(|n| (center - n).abs())
                .fold(0.0, f64::max),
        )
    })
}

/// Averaging passes for a cell of magnitude `|value|` out of `passes`.
#[must_use]
pub fn pass_count(value: f64, passes: u32) -> u32 {
    let magnitude = value.abs();
    if magnitude >= PRESERVE_MAGNITUDE {
        0
    } else if magnitude <= FULL_SMOOTH_MAGNITUDE {
        passes
    } else {
        let scaled = f64::from(passes) * (PRESERVE_MAGNITUDE - magnitude)
            / (PRESERVE_MAGNITUDE - FULL_SMOOTH_MAGNITUDE);
        // Bounded by `passes`, so the cast cannot truncate.
        scaled.round() as u32
    }
}

/// Stage 2. Pass counts come from the input magnitudes. Pass `p` reads the
/// grid left by pass `p − 1` and writes a fresh buffer; a cell whose count
/// is at least `p` becomes the plain mean of itself and its populated
/// neighbours, every other cell carries its running value forward.
#[must_use]
pub fn adaptive_smooth(grid: &Grid, passes: u32) -> Grid {
    let counts: Vec<(CellIndex, u32)> = grid
        .populated()
        .map(|(cell, v)| (cell, pass_count(v, passes)))
        .filter(|(_, n)| *n > 0)
        .collect();
    let max_pass = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);

    let mut read = *grid;
    for pass in 1..=max_pass {
        let mut write = read;
        for &(cell, n) in &counts {
            if n < pass {
                continue;
            }
            if let Some(center) = read.get(cell) {
                let (sum, count) = read
                    .neighbor_values(cell)
                    .fold((center, 1u32), |(s, c), v| (s + v, c + 1));
                write.set(cell, Some(sum / f64::from(count)));
            }
        }
        read = write;
    }
    read
}

/// Stage 3. Where the original gradient exceeds `threshold`, mix back
/// `min(1, gradient / 2·threshold)` of the original value.
#[must_use]
pub fn gradient_limited_blend(
    smoothed: &Grid,
    original: &Grid,
    gradients: &Grid,
    threshold: f64,
) -> Grid {
    Grid::from_fn(|cell| {
        let value = smoothed.get(cell)?;
        match (gradients.get(cell), original.get(cell)) {
            (Some(g), Some(orig)) if g > threshold => {
                let blend = (g / (2.0 * threshold)).min(1.0);
                Some((1.0 - blend) * value + blend * orig)
            }
            _ => Some(value),
        }
    })
}

/// Stage 4. `0.2 × weighted neighbourhood mean + 0.8 × center`, with the
/// center weighted 1.25 and each populated neighbour 1.0.
#[must_use]
pub fn coverage_weighted_pass(grid: &Grid) -> Grid {
    Grid::from_fn(|cell| {
        let center = grid.get(cell)?;
        let (sum, weight) = grid.neighbor_values(cell).fold(
            (center * COVERAGE_CENTER_WEIGHT, COVERAGE_CENTER_WEIGHT),
            |(s, w), v| (s + v, w + 1.0),
        );
        Some(COVERAGE_MIX * (sum / weight) + (1.0 - COVERAGE_MIX) * center)
    })
}

/// Output of every K1 stage, for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct K1Stages {
    /// Stage 1 gradients.
    pub gradients: Grid,
    /// Stage 2 output.
    pub smoothed: Grid,
    /// Stage 3 output.
    pub blended: Grid,
    /// Stage 4 output; the kernel result.
    pub output: Grid,
}

/// The K1 kernel with its two parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct K1Kernel {
    passes: u32,
    gradient_threshold: f64,
}

impl K1Kernel {
    /// Kernel with pass count `passes` and gradient threshold
    /// `gradient_threshold` (must be > 0; validated by the configuration).
    #[must_use]
    pub fn new(passes: u32, gradient_threshold: f64) -> Self {
        Self {
            passes,
            gradient_threshold,
        }
    }

    /// Run all four stages.
    #[must_use]
    pub fn apply(&self, grid: &Grid) -> Grid {
        self.apply_staged(grid).output
    }

    /// Run all four stages and keep each intermediate grid.
    #[must_use]
    pub fn apply_staged(&self, grid: &Grid) -> K1Stages {
        let gradients = gradient_map(grid);
        let smoothed = adaptive_smooth(grid, self.passes);
        let blended = gradient_limited_blend(&smoothed, grid, &gradients, self.gradient_threshold);
        let output = coverage_weighted_pass(&blended);
        tracing::debug!(
            populated = grid.populated_count(),
            steep_cells = gradients
                .populated()
                .filter(|(_, g)| *g > self.gradient_threshold)
                .count(),
            passes = self.passes,
            "K1 kernel applied"
        );
        K1Stages {
            gradients,
            smoothed,
            blended,
            output,
        }
    }
}
