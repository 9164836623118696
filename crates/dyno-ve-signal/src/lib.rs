//! # Dyno-VE Signal
//!
//! Turns validated dyno samples into a preview VE correction:
//!
//! - [`aggregate`]: nearest-center binning and load-weighted AFR error per
//!   bank, plus torque, power, hit-count and dispersion diagnostics.
//! - [`kernel`]: the four-stage K1 adaptive smoothing kernel.
//! - [`clamp`]: symmetric bounds for correction grids.
//! - [`spark`]: knock and temperature driven timing advisories.
//! - [`pipeline`]: the orchestrator tying ingestion to all of the above.
//!
//! ```rust,no_run
//! use dyno_ve_core::CorrectionConfig;
//! use dyno_ve_signal::CorrectionPipeline;
//! use std::path::Path;
//!
//! let pipeline = CorrectionPipeline::new(CorrectionConfig::default())?;
//! let preview = pipeline.run_path(Path::new("run1.csv"))?;
//! preview.export(Path::new("out"))?;
//! # Ok::<(), dyno_ve_signal::SignalError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod clamp;
pub mod error;
pub mod export;
pub mod kernel;
pub mod pipeline;
pub mod spark;
pub mod stats;

pub use aggregate::{combine_banks, Aggregation, Aggregator, BankAccumulator, CellAccumulator};
pub use clamp::{clamp_grid, Clamped};
pub use error::{SignalError, SignalResult};
pub use kernel::{K1Kernel, K1Stages};
pub use pipeline::{CorrectionPipeline, PreviewResult, PreviewSummary};
pub use spark::SparkAdvisor;
