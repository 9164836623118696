//! Apply a factor table to an efficiency table, and roll it back.
//!
//! ```text
//! apply:    updated  = base    × (1 + clamp(factor, ±M) / 100)
//! rollback: restored = updated / (1 + clamp(factor, ±M) / 100)
//! ```
//!
//! `M` is the apply clamp. Rollback uses the `clamp_used` recorded in the
//! [`ApplyMetadata`] and only proceeds once the factor file and the updated
//! table hash to the values recorded at apply time.
//!
//! Both operations read and verify everything before writing anything, and
//! every write is atomic. In dry-run mode nothing is written.

use chrono::Utc;
use ndarray::{Array2, Zip};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dyno_ve_core::fsio::{atomic_write, content_hash, read_hashed};
use dyno_ve_core::{round_to, ApplyClamp, BinAxes, ClampLimit, CorrectionConfig};

use crate::error::{ApplyError, ApplyResult};
use crate::metadata::{ApplyMetadata, FORMAT_VERSION};
use crate::table::{EfficiencyTable, FactorTable, EFFICIENCY_DECIMALS};

/// Result of [`Applier::apply`].
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Provenance of this apply.
    pub metadata: ApplyMetadata,
    /// The updated table at persisted precision.
    pub table: EfficiencyTable,
    /// Where the metadata was (or would be) written.
    pub metadata_path: PathBuf,
    /// Whether the table and metadata were written.
    pub written: bool,
}

/// Result of [`Applier::rollback`].
#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    /// The restored table as written: every cell is the 4-decimal value
    /// nearest the exact quotient that re-applies to the updated cell.
    pub table: EfficiencyTable,
    /// `updated / scale` at full precision.
    pub exact: EfficiencyTable,
    /// Content hash of the restored table as rendered.
    pub restored_hash: String,
    /// Whether the restored values equal the base values at persisted
    /// precision, whatever the base file's delimiter or formatting.
    pub matches_base: bool,
    /// Whether the restored table was written.
    pub written: bool,
}

/// Applies and rolls back VE corrections under one apply clamp.
#[derive(Debug, Clone)]
pub struct Applier {
    axes: Arc<BinAxes>,
    clamp: ApplyClamp,
}

impl Applier {
    /// Applier over the standard axes.
    #[must_use]
    pub fn new(clamp: ApplyClamp) -> Self {
        Self::with_axes(BinAxes::shared(), clamp)
    }

    /// Applier using the `apply_clamp` of `config`.
    #[must_use]
    pub fn from_config(config: &CorrectionConfig) -> Self {
        Self::new(config.apply_clamp)
    }

    /// Applier over shared `axes`.
    #[must_use]
    pub fn with_axes(axes: Arc<BinAxes>, clamp: ApplyClamp) -> Self {
        Self { axes, clamp }
    }

    /// Apply clamp in use.
    #[must_use]
    pub fn clamp(&self) -> ApplyClamp {
        self.clamp
    }

    /// Apply `factor_path` to `base_path`, writing the updated table to
    /// `updated_path` and its metadata beside it.
    #[tracing::instrument(skip(self, base_path, factor_path, updated_path), fields(
        base = %base_path.display(),
        factor = %factor_path.display(),
        updated = %updated_path.display()
    ))]
    pub fn apply(
        &self,
        base_path: &Path,
        factor_path: &Path,
        updated_path: &Path,
        dry_run: bool,
    ) -> ApplyResult<ApplyOutcome> {
        let (base, base_hash) = EfficiencyTable::read(base_path)?;
        let (factor, factor_hash) = FactorTable::read(factor_path)?;
        base.check_bins(&self.axes)?;
        factor.axes().check_matches(base.axes(), "factor vs base")?;

        let clamped = factor.clamped(self.clamp);
        let clipped = Zip::from(factor.cells())
            .and(&clamped)
            .fold(0usize, |n, raw, &c| n + usize::from(raw.is_some_and(|r| r != c)));
        if clipped > 0 {
            tracing::warn!(cells = clipped, limit = self.clamp.limit(), "Factors clipped by apply clamp");
        }

        let mut updated = base.cells().clone();
        Zip::from(&mut updated)
            .and(&scales(&clamped)?)
            .for_each(|u, &scale| *u *= scale);
        let table = EfficiencyTable::new(base.axes().clone(), updated)?.rounded();
        let rendered = table.render();

        let metadata = ApplyMetadata {
            format_version: FORMAT_VERSION.to_owned(),
            base_hash,
            base_values_hash: content_hash(base.render().as_bytes()),
            factor_hash,
            updated_hash: content_hash(rendered.as_bytes()),
            clamp_used: self.clamp.limit(),
            applied_at: Utc::now(),
            base_path: base_path.to_path_buf(),
            factor_path: factor_path.to_path_buf(),
            cells_changed: clamped.iter().filter(|&&c| c != 0.0).count(),
            max_abs_factor: max_abs(&clamped),
        };
        let metadata_path = ApplyMetadata::sidecar_path(updated_path);

        if dry_run {
            tracing::info!(
                cells_changed = metadata.cells_changed,
                max_abs_factor = metadata.max_abs_factor,
                "Dry run: apply computed, nothing written"
            );
        } else {
            atomic_write(updated_path, rendered.as_bytes())?;
            metadata.save(&metadata_path)?;
            tracing::info!(
                cells_changed = metadata.cells_changed,
                max_abs_factor = metadata.max_abs_factor,
                updated_hash = %metadata.updated_hash,
                "Correction applied"
            );
        }

        Ok(ApplyOutcome {
            metadata,
            table,
            metadata_path,
            written: !dry_run,
        })
    }

    /// Undo the apply described by `metadata`, reading the updated table
    /// from `updated_path` and writing the restored table to
    /// `restored_path`.
    #[tracing::instrument(skip(self, metadata, updated_path, restored_path), fields(
        updated = %updated_path.display(),
        restored = %restored_path.display()
    ))]
    pub fn rollback(
        &self,
        metadata: &ApplyMetadata,
        updated_path: &Path,
        restored_path: &Path,
        dry_run: bool,
    ) -> ApplyResult<RollbackOutcome> {
        metadata.check_version()?;

        // Hash before parse: tampering is always an integrity failure.
        let (factor_bytes, factor_hash) = read_hashed(&metadata.factor_path)?;
        if factor_hash != metadata.factor_hash {
            return Err(ApplyError::integrity("factor table", &metadata.factor_hash, &factor_hash));
        }
        let (updated_bytes, updated_hash) = read_hashed(updated_path)?;
        if updated_hash != metadata.updated_hash {
            return Err(ApplyError::integrity("updated table", &metadata.updated_hash, &updated_hash));
        }
        let factor = FactorTable::parse(&metadata.factor_path, &factor_bytes)?;
        let updated = EfficiencyTable::parse(updated_path, &updated_bytes)?;
        updated.check_bins(&self.axes)?;
        factor.axes().check_matches(updated.axes(), "factor vs updated")?;

        let clamp = ApplyClamp::new(metadata.clamp_used)?;
        let scale_grid = scales(&factor.clamped(clamp))?;
        let mut exact = updated.cells().clone();
        let mut persisted = updated.cells().clone();
        Zip::from(&mut exact)
            .and(&mut persisted)
            .and(&scale_grid)
            .for_each(|x, p, &scale| {
                let u = *x;
                *x = u / scale;
                *p = snap_restored(*x, u, scale);
            });
        let exact = EfficiencyTable::new(updated.axes().clone(), exact)?;
        let table = EfficiencyTable::new(updated.axes().clone(), persisted)?;
        let rendered = table.render();
        let restored_hash = content_hash(rendered.as_bytes());
        let matches_base = restored_hash == metadata.base_values_hash;

        if !matches_base {
            tracing::warn!(
                base_values_hash = %metadata.base_values_hash,
                restored_hash = %restored_hash,
                "Restored table differs from base at persisted precision"
            );
        }
        if dry_run {
            tracing::info!("Dry run: rollback verified, nothing written");
        } else {
            atomic_write(restored_path, rendered.as_bytes())?;
            tracing::info!(restored_hash = %restored_hash, matches_base, "Correction rolled back");
        }

        Ok(RollbackOutcome {
            table,
            exact,
            restored_hash,
            matches_base,
            written: !dry_run,
        })
    }
}

/// `1 + c / 100` per cell. Every scale must be positive for the apply to be
/// invertible.
fn scales(clamped: &Array2<f64>) -> ApplyResult<Array2<f64>> {
    if let Some(&factor) = clamped.iter().find(|&&c| 1.0 + c / 100.0 <= 0.0) {
        return Err(ApplyError::NonInvertible { factor });
    }
    Ok(clamped.mapv(|c| 1.0 + c / 100.0))
}

/// The persisted-precision value nearest `exact` that re-applies to
/// `updated` at `scale`, or the plain rounding of `exact` if no neighbour
/// does.
fn snap_restored(exact: f64, updated: f64, scale: f64) -> f64 {
    let nearest = round_to(exact, EFFICIENCY_DECIMALS);
    let step = 10f64.powi(-(EFFICIENCY_DECIMALS as i32));
    let (first, second) = if exact < nearest {
        (nearest - step, nearest + step)
    } else {
        (nearest + step, nearest - step)
    };
    [nearest, first, second]
        .into_iter()
        .map(|v| round_to(v, EFFICIENCY_DECIMALS))
        .find(|&v| round_to(v * scale, EFFICIENCY_DECIMALS) == updated)
        .unwrap_or(nearest)
}

fn max_abs(cells: &Array2<f64>) -> f64 {
    cells.iter().fold(0.0, |m, v| m.max(v.abs()))
}
