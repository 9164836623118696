//! # Dyno-VE Apply
//!
//! Applies a bounded VE correction to a persisted efficiency table and
//! reverses it exactly.
//!
//! - [`table`]: efficiency and factor table text I/O with alignment checks.
//! - [`metadata`]: the [`ApplyMetadata`] provenance record.
//! - [`applier`]: hash-verified apply and rollback with dry-run support.
//!
//! ```rust,no_run
//! use dyno_ve_apply::{Applier, ApplyMetadata};
//! use dyno_ve_core::ApplyClamp;
//! use std::path::Path;
//!
//! let applier = Applier::new(ApplyClamp::default());
//! let applied = applier.apply(
//!     Path::new("ve_base.csv"),
//!     Path::new("out/VE_Correction_Delta.csv"),
//!     Path::new("ve_updated.csv"),
//!     false,
//! )?;
//!
//! let metadata = ApplyMetadata::load(&applied.metadata_path)?;
//! applier.rollback(&metadata, Path::new("ve_updated.csv"), Path::new("ve_restored.csv"), false)?;
//! # Ok::<(), dyno_ve_apply::ApplyError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod applier;
pub mod error;
pub mod metadata;
pub mod table;

pub use applier::{Applier, ApplyOutcome, RollbackOutcome};
pub use error::{ApplyError, ApplyResult};
pub use metadata::{ApplyMetadata, FORMAT_VERSION, SIDECAR_SUFFIX};
pub use table::{EfficiencyTable, FactorTable, TableAxes};
