//! Symmetric clamping of correction grids.

use dyno_ve_core::{ClampLimit, Grid};

/// A clamped grid and how many cells the bound touched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clamped {
    /// Every populated value within `[-limit, +limit]`.
    pub grid: Grid,
    /// Populated cells whose value was outside the bound.
    pub clamped_cells: usize,
}

/// Clamp every populated cell of `grid` to `limit`. "No data" passes through.
#[must_use]
pub fn clamp_grid<L: ClampLimit>(grid: &Grid, limit: L) -> Clamped {
    let mut clamped_cells = 0;
    let out = grid.map(|v| {
        let c = limit.clamp(v);
        if c != v {
            clamped_cells += 1;
        }
        c
    });
    if clamped_cells > 0 {
        tracing::debug!(limit = limit.limit(), clamped_cells, "Cells hit clamp bound");
    }
    Clamped {
        grid: out,
        clamped_cells,
    }
}
