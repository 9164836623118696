//! Fixed RPM × load-pressure bin axes.
//!
//! The correction grid is always 11 RPM centers by 5 manifold-pressure
//! centers. Assignment of a sample to a cell is a pure function of the value
//! and the axis: nearest center wins, and on an exact tie the earlier (lower)
//! center is kept because a later center only replaces the current best on a
//! strict improvement.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of RPM bins (rows).
pub const RPM_BINS: usize = 11;

/// Number of load-pressure bins (columns).
pub const LOAD_BINS: usize = 5;

/// RPM bin centers, 1500..=6500 in steps of 500.
pub const RPM_CENTERS: [f64; RPM_BINS] = [
    1500.0, 2000.0, 2500.0, 3000.0, 3500.0, 4000.0, 4500.0, 5000.0, 5500.0, 6000.0, 6500.0,
];

/// Manifold absolute pressure bin centers (kPa).
pub const LOAD_CENTERS: [f64; LOAD_BINS] = [35.0, 50.0, 65.0, 80.0, 95.0];

/// Row/column address of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex {
    /// RPM bin (row), `0..RPM_BINS`.
    pub row: usize,
    /// Load bin (column), `0..LOAD_BINS`.
    pub col: usize,
}

impl CellIndex {
    /// Create a cell index. Panics in debug builds when out of range.
    #[must_use]
    pub fn new(row: usize, col: usize) -> Self {
        debug_assert!(row < RPM_BINS && col < LOAD_BINS, "cell ({row}, {col}) out of range");
        Self { row, col }
    }

    /// All 55 cells in row-major order.
    pub fn all() -> impl Iterator<Item = CellIndex> {
        (0..RPM_BINS).flat_map(|row| (0..LOAD_BINS).map(move |col| CellIndex { row, col }))
    }

    /// Up/down/left/right neighbours that lie inside the grid.
    pub fn neighbors(self) -> impl Iterator<Item = CellIndex> {
        let CellIndex { row, col } = self;
        let up = row.checked_sub(1).map(|r| CellIndex { row: r, col });
        let down = (row + 1 < RPM_BINS).then(|| CellIndex { row: row + 1, col });
        let left = col.checked_sub(1).map(|c| CellIndex { row, col: c });
        let right = (col + 1 < LOAD_BINS).then(|| CellIndex { row, col: col + 1 });
        [up, down, left, right].into_iter().flatten()
    }
}

/// Index of the nearest axis center to `value`.
///
/// Iterates the axis in ascending order and replaces the current best only
/// when the distance is strictly smaller, so a value exactly between two
/// centers lands in the lower one. Returns `None` for an empty axis or a
/// non-finite value.
#[must_use]
pub fn nearest_bin_index(value: f64, axis: &[f64]) -> Option<usize> {
    if !value.is_finite() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, &center) in axis.iter().enumerate() {
        let dist = (value - center).abs();
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((i, dist)),
        }
    }
    best.map(|(i, _)| i)
}

/// The nearest axis center to `value` (see [`nearest_bin_index`]).
#[must_use]
pub fn nearest_bin(value: f64, axis: &[f64]) -> Option<f64> {
    nearest_bin_index(value, axis).map(|i| axis[i])
}

/// The immutable pair of axes every component bins against.
///
/// Constructed once and shared through an [`Arc`]; nothing mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinAxes {
    rpm: [f64; RPM_BINS],
    load: [f64; LOAD_BINS],
}

impl BinAxes {
    /// The standard 1500–6500 RPM × 35–95 kPa axes.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            rpm: RPM_CENTERS,
            load: LOAD_CENTERS,
        }
    }

    /// Standard axes behind a shared pointer.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::standard())
    }

    /// RPM centers, ascending.
    #[must_use]
    pub fn rpm(&self) -> &[f64; RPM_BINS] {
        &self.rpm
    }

    /// Load-pressure centers, ascending.
    #[must_use]
    pub fn load(&self) -> &[f64; LOAD_BINS] {
        &self.load
    }

    /// RPM and load centers of one cell.
    #[must_use]
    pub fn centers(&self, cell: CellIndex) -> (f64, f64) {
        (self.rpm[cell.row], self.load[cell.col])
    }

    /// Cell for an (rpm, load) sample, or `None` when either value is not finite.
    #[must_use]
    pub fn locate(&self, rpm: f64, load: f64) -> Option<CellIndex> {
        let row = nearest_bin_index(rpm, &self.rpm)?;
        let col = nearest_bin_index(load, &self.load)?;
        Some(CellIndex { row, col })
    }
}

impl Default for BinAxes {
    fn default() -> Self {
        Self::standard()
    }
}
