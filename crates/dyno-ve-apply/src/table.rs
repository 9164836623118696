//! Efficiency and factor table I/O.
//!
//! Both tables share one text layout:
//!
//! ```text
//! RPM,35,50,65,80,95
//! 1500,82.1000,84.0000,86.2500,88.0000,90.5000
//! ...
//! ```
//!
//! The header's first cell is a label; the rest are load axis values. Each
//! following row is an RPM axis value and one cell per load column.
//! Efficiency cells are absolute percentages at 4 decimals and must all be
//! present. Factor cells are signed 2-decimal percentages; a blank factor
//! cell means "no correction". Comma or tab delimiters and a leading UTF-8
//! BOM are accepted.

use ndarray::Array2;
use std::path::Path;

use dyno_ve_core::fsio::{atomic_write, content_hash, read_hashed};
use dyno_ve_core::{format_axis, format_fixed, format_signed, ApplyClamp, BinAxes, ClampLimit, Grid};

use crate::error::{ApplyError, ApplyResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Axis tolerance for alignment checks.
pub const AXIS_TOLERANCE: f64 = 1e-9;

/// Decimals written for efficiency cells.
pub const EFFICIENCY_DECIMALS: usize = 4;

/// Decimals written for factor cells.
pub const FACTOR_DECIMALS: usize = 2;

/// RPM and load axis values of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableAxes {
    /// RPM axis, one value per row.
    pub rpm: Vec<f64>,
    /// Load axis, one value per column.
    pub load: Vec<f64>,
}

impl TableAxes {
    /// Axes of the fixed bin layout.
    #[must_use]
    pub fn from_bins(axes: &BinAxes) -> Self {
        Self {
            rpm: axes.rpm().to_vec(),
            load: axes.load().to_vec(),
        }
    }

    /// `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rpm.len(), self.load.len())
    }

    /// Require `self` to match `expected` in shape and, within
    /// [`AXIS_TOLERANCE`], every axis value.
    pub fn check_matches(&self, expected: &TableAxes, what: &'static str) -> ApplyResult<()> {
        if self.shape() == expected.shape()
            && axis_eq(&self.rpm, &expected.rpm)
            && axis_eq(&self.load, &expected.load)
        {
            return Ok(());
        }
        Err(ApplyError::Alignment {
            what,
            expected_shape: expected.shape(),
            observed_shape: self.shape(),
            expected_rpm: expected.rpm.clone(),
            observed_rpm: self.rpm.clone(),
            expected_load: expected.load.clone(),
            observed_load: self.load.clone(),
        })
    }
}

fn axis_eq(a: &[f64], b: &[f64]) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() <= AXIS_TOLERANCE)
}

/// A persisted 11×5 table of absolute efficiency percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyTable {
    axes: TableAxes,
    cells: Array2<f64>,
}

impl EfficiencyTable {
    /// Table over `axes`. Fails if `cells` does not have the axes' shape.
    pub fn new(axes: TableAxes, cells: Array2<f64>) -> ApplyResult<Self> {
        if cells.dim() != axes.shape() {
            return Err(ApplyError::table_format(
                "<memory>",
                format!("cells {:?} do not match axes {:?}", cells.dim(), axes.shape()),
            ));
        }
        Ok(Self { axes, cells })
    }

    /// Table over the bin layout with every cell from `f(row, col)`.
    pub fn from_fn(axes: &BinAxes, f: impl FnMut((usize, usize)) -> f64) -> Self {
        let axes = TableAxes::from_bins(axes);
        let cells = Array2::from_shape_fn(axes.shape(), f);
        Self { axes, cells }
    }

    /// Parse table text read from `path`.
    pub fn parse(path: &Path, bytes: &[u8]) -> ApplyResult<Self> {
        let (axes, cells) = parse_table(path, bytes)?;
        if let Some(((row, col), _)) = cells.indexed_iter().find(|(_, v)| v.is_none()) {
            return Err(ApplyError::table_format(
                path,
                format!(
                    "missing efficiency value at rpm {} load {}",
                    format_axis(axes.rpm[row]),
                    format_axis(axes.load[col])
                ),
            ));
        }
        let cells = cells.mapv(|v| v.unwrap_or_default());
        Ok(Self { axes, cells })
    }

    /// Read `path`, returning the table and the content hash of its bytes.
    pub fn read(path: &Path) -> ApplyResult<(Self, String)> {
        let (bytes, hash) = read_hashed(path)?;
        Ok((Self::parse(path, &bytes)?, hash))
    }

    /// Axis values.
    #[must_use]
    pub fn axes(&self) -> &TableAxes {
        &self.axes
    }

    /// Cell values, `[rpm row, load column]`.
    #[must_use]
    pub fn cells(&self) -> &Array2<f64> {
        &self.cells
    }

    /// Require the table to lie on the bin layout.
    pub fn check_bins(&self, bins: &BinAxes) -> ApplyResult<()> {
        self.axes.check_matches(&TableAxes::from_bins(bins), "table vs bin axes")
    }

    /// Same axes, every cell rounded to the persisted precision.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            axes: self.axes.clone(),
            cells: self.cells.mapv(|v| dyno_ve_core::round_to(v, EFFICIENCY_DECIMALS)),
        }
    }

    /// Render as comma-separated text at 4 decimals.
    #[must_use]
    pub fn render(&self) -> String {
        render_table(&self.axes, |row, col| {
            format_fixed(self.cells[[row, col]], EFFICIENCY_DECIMALS)
        })
    }

    /// Atomically write the rendered table to `path` and return the content
    /// hash of the written bytes.
    pub fn write(&self, path: &Path) -> ApplyResult<String> {
        let text = self.render();
        atomic_write(path, text.as_bytes())?;
        Ok(content_hash(text.as_bytes()))
    }
}

/// A correction surface in signed percent; `None` cells are left unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorTable {
    axes: TableAxes,
    cells: Array2<Option<f64>>,
}

impl FactorTable {
    /// Factor table from a preview grid laid out on `axes`.
    #[must_use]
    pub fn from_grid(grid: &Grid, axes: &BinAxes) -> Self {
        let axes = TableAxes::from_bins(axes);
        let cells = Array2::from_shape_fn(axes.shape(), |(row, col)| grid.rows()[row][col]);
        Self { axes, cells }
    }

    /// Parse table text read from `path`.
    pub fn parse(path: &Path, bytes: &[u8]) -> ApplyResult<Self> {
        let (axes, cells) = parse_table(path, bytes)?;
        Ok(Self { axes, cells })
    }

    /// Read `path`, returning the table and the content hash of its bytes.
    pub fn read(path: &Path) -> ApplyResult<(Self, String)> {
        let (bytes, hash) = read_hashed(path)?;
        Ok((Self::parse(path, &bytes)?, hash))
    }

    /// Axis values.
    #[must_use]
    pub fn axes(&self) -> &TableAxes {
        &self.axes
    }

    /// Raw factor cells.
    #[must_use]
    pub fn cells(&self) -> &Array2<Option<f64>> {
        &self.cells
    }

    /// Every cell clamped to `limit`, with "no correction" as `0.0`.
    #[must_use]
    pub fn clamped(&self, limit: ApplyClamp) -> Array2<f64> {
        self.cells.mapv(|v| v.map_or(0.0, |v| limit.clamp(v)))
    }

    /// Render as comma-separated signed 2-decimal text, blank for `None`.
    #[must_use]
    pub fn render(&self) -> String {
        render_table(&self.axes, |row, col| {
            self.cells[[row, col]]
                .map(|v| format_signed(v, FACTOR_DECIMALS))
                .unwrap_or_default()
        })
    }

    /// Atomically write the rendered table to `path` and return the content
    /// hash of the written bytes.
    pub fn write(&self, path: &Path) -> ApplyResult<String> {
        let text = self.render();
        atomic_write(path, text.as_bytes())?;
        Ok(content_hash(text.as_bytes()))
    }
}

fn render_table(axes: &TableAxes, mut cell: impl FnMut(usize, usize) -> String) -> String {
    let mut out = String::from("RPM");
    for &load in &axes.load {
        out.push(',');
        out.push_str(&format_axis(load));
    }
    out.push('\n');
    for (row, &rpm) in axes.rpm.iter().enumerate() {
        out.push_str(&format_axis(rpm));
        for col in 0..axes.load.len() {
            out.push(',');
            out.push_str(&cell(row, col));
        }
        out.push('\n');
    }
    out
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_table(path: &Path, bytes: &[u8]) -> ApplyResult<(TableAxes, Array2<Option<f64>>)> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let header_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    let tabs = header_line.iter().filter(|&&b| b == b'\t').count();
    let commas = header_line.iter().filter(|&&b| b == b',').count();
    let delimiter = if tabs > commas { b'\t' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);
    let mut records = reader.records();

    let header = records
        .next()
        .ok_or_else(|| ApplyError::table_format(path, "empty table"))?
        .map_err(|e| ApplyError::table_format(path, e.to_string()))?;
    let load = header
        .iter()
        .skip(1)
        .map(|cell| {
            parse_number(cell)
                .ok_or_else(|| ApplyError::table_format(path, format!("bad load axis value `{cell}`")))
        })
        .collect::<ApplyResult<Vec<f64>>>()?;
    if load.is_empty() {
        return Err(ApplyError::table_format(path, "header has no load columns"));
    }

    let mut rpm = Vec::new();
    let mut cells = Vec::new();
    for (i, record) in records.enumerate() {
        let line = i + 2;
        let record = record.map_err(|e| ApplyError::table_format(path, e.to_string()))?;
        if record.len() != load.len() + 1 {
            return Err(ApplyError::table_format(
                path,
                format!(
                    "line {line}: expected {} fields, found {}",
                    load.len() + 1,
                    record.len()
                ),
            ));
        }
        let axis = &record[0];
        rpm.push(parse_number(axis).ok_or_else(|| {
            ApplyError::table_format(path, format!("line {line}: bad rpm axis value `{axis}`"))
        })?);
        for cell in record.iter().skip(1) {
            if cell.is_empty() {
                cells.push(None);
                continue;
            }
            let value = parse_number(cell).ok_or_else(|| {
                ApplyError::table_format(path, format!("line {line}: non-numeric cell `{cell}`"))
            })?;
            cells.push(Some(value));
        }
    }
    if rpm.is_empty() {
        return Err(ApplyError::table_format(path, "table has no rpm rows"));
    }

    let axes = TableAxes { rpm, load };
    let cells = Array2::from_shape_vec(axes.shape(), cells)
        .map_err(|e| ApplyError::table_format(path, e.to_string()))?;
    Ok((axes, cells))
}
