//! Sparse 11×5 correction grid.
//!
//! Every cell is either "no data" (`None`) or a value. The shape is fixed by
//! the array type, so no stage can produce a grid of any other size.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::ops::{Index, IndexMut};

use crate::axes::{BinAxes, CellIndex, LOAD_BINS, RPM_BINS};

type Cells = [[Option<f64>; LOAD_BINS]; RPM_BINS];

/// An 11×5 grid of optional real values, indexed `[rpm row][load column]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    cells: Cells,
}

impl Grid {
    /// Number of rows (RPM bins).
    pub const ROWS: usize = RPM_BINS;
    /// Number of columns (load bins).
    pub const COLS: usize = LOAD_BINS;

    /// A grid with every cell set to "no data".
    #[must_use]
    pub fn empty() -> Self {
        Self {
            cells: [[None; LOAD_BINS]; RPM_BINS],
        }
    }

    /// A grid with every cell populated with `value`.
    #[must_use]
    pub fn filled(value: f64) -> Self {
        Self {
            cells: [[Some(value); LOAD_BINS]; RPM_BINS],
        }
    }

    /// Build a grid by evaluating `f` for every cell.
    pub fn from_fn(mut f: impl FnMut(CellIndex) -> Option<f64>) -> Self {
        let mut grid = Self::empty();
        for cell in CellIndex::all() {
            grid[cell] = f(cell);
        }
        grid
    }

    /// Build a grid from row-major nested arrays.
    #[must_use]
    pub fn from_rows(cells: [[Option<f64>; LOAD_BINS]; RPM_BINS]) -> Self {
        Self { cells }
    }

    /// The underlying rows.
    #[must_use]
    pub fn rows(&self) -> &[[Option<f64>; LOAD_BINS]; RPM_BINS] {
        &self.cells
    }

    /// Value at `cell`.
    #[must_use]
    pub fn get(&self, cell: CellIndex) -> Option<f64> {
        self.cells[cell.row][cell.col]
    }

    /// Set the value at `cell`.
    pub fn set(&mut self, cell: CellIndex, value: Option<f64>) {
        self.cells[cell.row][cell.col] = value;
    }

    /// Whether `cell` holds a value.
    #[must_use]
    pub fn is_populated(&self, cell: CellIndex) -> bool {
        self.get(cell).is_some()
    }

    /// Every cell in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (CellIndex, Option<f64>)> + '_ {
        CellIndex::all().map(move |cell| (cell, self.get(cell)))
    }

    /// Populated cells only.
    pub fn populated(&self) -> impl Iterator<Item = (CellIndex, f64)> + '_ {
        self.iter().filter_map(|(cell, v)| v.map(|v| (cell, v)))
    }

    /// Number of populated cells.
    #[must_use]
    pub fn populated_count(&self) -> usize {
        self.populated().count()
    }

    /// Values of the populated up/down/left/right neighbours of `cell`.
    pub fn neighbor_values(&self, cell: CellIndex) -> impl Iterator<Item = f64> + '_ {
        cell.neighbors().filter_map(move |n| self.get(n))
    }

    /// Apply `f` to every populated cell; "no data" stays "no data".
    #[must_use]
    pub fn map(&self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self::from_fn(|cell| self.get(cell).map(&mut f))
    }

    /// Combine two grids cell by cell.
    #[must_use]
    pub fn zip_with(
        &self,
        other: &Grid,
        mut f: impl FnMut(Option<f64>, Option<f64>) -> Option<f64>,
    ) -> Self {
        Self::from_fn(|cell| f(self.get(cell), other.get(cell)))
    }

    /// Largest absolute populated value.
    #[must_use]
    pub fn max_abs(&self) -> Option<f64> {
        self.populated().map(|(_, v)| v.abs()).reduce(f64::max)
    }

    /// Render as a delimited table: header `RPM,<load...>`, one row per RPM
    /// center, cells in signed fixed-point with `decimals` places and blank
    /// for "no data".
    #[must_use]
    pub fn to_table(&self, axes: &BinAxes, decimals: usize, delimiter: char) -> String {
        let mut out = String::with_capacity(64 * (RPM_BINS + 1));
        out.push_str("RPM");
        for &load in axes.load() {
            out.push(delimiter);
            out.push_str(&format_axis(load));
        }
        out.push('\n');
        for (row, &rpm) in axes.rpm().iter().enumerate() {
            out.push_str(&format_axis(rpm));
            for col in 0..LOAD_BINS {
                out.push(delimiter);
                if let Some(v) = self.cells[row][col] {
                    out.push_str(&format_signed(v, decimals));
                }
            }
            out.push('\n');
        }
        out
    }

    /// Signed two-decimal comma-separated rendering used by preview exports.
    #[must_use]
    pub fn to_csv(&self, axes: &BinAxes) -> String {
        self.to_table(axes, 2, ',')
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::empty()
    }
}

impl Index<CellIndex> for Grid {
    type Output = Option<f64>;

    fn index(&self, cell: CellIndex) -> &Self::Output {
        &self.cells[cell.row][cell.col]
    }
}

impl IndexMut<CellIndex> for Grid {
    fn index_mut(&mut self, cell: CellIndex) -> &mut Self::Output {
        &mut self.cells[cell.row][cell.col]
    }
}

/// Round half away from zero to `decimals` places, folding `-0.0` into `0.0`.
#[must_use]
pub fn round_to(value: f64, decimals: usize) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Signed fixed-point rendering, e.g. `+1.25`, `-0.50`, `+0.00`.
#[must_use]
pub fn format_signed(value: f64, decimals: usize) -> String {
    format!("{:+.*}", decimals, round_to(value, decimals))
}

/// Unsigned fixed-point rendering, e.g. `82.5000`.
#[must_use]
pub fn format_fixed(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, round_to(value, decimals))
}

/// Axis label: whole numbers without a fractional part, others in shortest form.
#[must_use]
pub fn format_axis(value: f64) -> String {
    let mut out = String::new();
    if value.fract() == 0.0 && value.abs() < 1e15 {
        let _ = write!(out, "{}", value as i64);
    } else {
        let _ = write!(out, "{value}");
    }
    out
}
