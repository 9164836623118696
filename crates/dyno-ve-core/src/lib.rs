//! # Dyno-VE Core
//!
//! Foundational types shared by the dyno-ve correction pipeline:
//!
//! - **Bin axes**: the fixed 11 RPM × 5 load-pressure centers and the
//!   nearest-center assignment rule ([`axes`]).
//! - **Grids**: the sparse 11×5 [`Grid`] where every cell is "no data" or a
//!   value, plus fixed-precision table rendering ([`grid`]).
//! - **Configuration**: [`CorrectionConfig`] with documented defaults and the
//!   distinct [`PreviewClamp`] / [`ApplyClamp`] limits.
//! - **I/O helpers**: SHA-256 content hashing and atomic file replacement
//!   ([`fsio`]).
//!
//! ## Example
//!
//! ```rust
//! use dyno_ve_core::{BinAxes, Grid, CellIndex};
//!
//! let axes = BinAxes::standard();
//! let cell = axes.locate(3200.0, 85.0).unwrap();
//! assert_eq!(axes.centers(cell), (3000.0, 80.0));
//!
//! let mut grid = Grid::empty();
//! grid.set(cell, Some(-1.25));
//! assert_eq!(grid.populated_count(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod axes;
pub mod bank;
pub mod config;
pub mod error;
pub mod fsio;
pub mod grid;
pub mod limits;

pub use axes::{
    nearest_bin, nearest_bin_index, BinAxes, CellIndex, LOAD_BINS, LOAD_CENTERS, RPM_BINS,
    RPM_CENTERS,
};
pub use bank::{Bank, PerBank};
pub use config::{CorrectionConfig, SparkConfig, WeightMode};
pub use error::{ConfigError, StorageError};
pub use grid::{format_axis, format_fixed, format_signed, round_to, Grid};
pub use limits::{ApplyClamp, ClampLimit, PreviewClamp};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
