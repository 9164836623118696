//! Preview export.
//!
//! Every grid is written as a signed two-decimal CSV table (blank for "no
//! data") and the summary as pretty JSON. Each file is replaced atomically.

use std::path::{Path, PathBuf};

use dyno_ve_core::fsio::atomic_write;
use dyno_ve_core::{Bank, Grid};

use crate::error::SignalResult;
use crate::pipeline::PreviewResult;

/// File name of the VE correction delta grid.
pub const VE_DELTA_FILE: &str = "VE_Correction_Delta.csv";
/// File name of the run summary.
pub const SUMMARY_FILE: &str = "preview_summary.json";

impl PreviewResult {
    /// `(file name, grid)` pairs in export order.
    #[must_use]
    pub fn export_grids(&self) -> Vec<(String, &Grid)> {
        let mut grids = vec![(VE_DELTA_FILE.to_owned(), &self.ve_delta)];
        for bank in Bank::ALL {
            grids.push((format!("AFR_Error_{}.csv", bank.label()), self.afr_error.get(bank)));
        }
        for bank in Bank::ALL {
            grids.push((format!("Spark_Advisory_{}.csv", bank.label()), self.spark.get(bank)));
        }
        grids.push(("Torque_Mean.csv".to_owned(), &self.torque_mean));
        grids.push(("Power_Mean.csv".to_owned(), &self.power_mean));
        grids.push(("Hit_Count.csv".to_owned(), &self.hits));
        grids.push(("Dispersion_MAD.csv".to_owned(), &self.mad_combined));
        grids
    }

    /// Write every grid and the summary into `dir`, creating it if needed.
    /// Returns the written paths.
    #[tracing::instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub fn export(&self, dir: &Path) -> SignalResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (name, grid) in self.export_grids() {
            let path = dir.join(name);
            atomic_write(&path, grid.to_csv(&self.axes).as_bytes())?;
            written.push(path);
        }
        let path = dir.join(SUMMARY_FILE);
        atomic_write(&path, &serde_json::to_vec_pretty(&self.summary)?)?;
        written.push(path);

        tracing::info!(files = written.len(), "Preview exported");
        Ok(written)
    }
}
