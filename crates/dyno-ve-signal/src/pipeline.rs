//! Preview pipeline orchestrator.
//!
//! [`CorrectionPipeline`] runs ingestion, aggregation, the K1 kernel,
//! preview clamping and the spark advisory as one synchronous pass:
//!
//! 1. Read and normalize records ([`dyno_ve_ingest::LogReader`])
//! 2. Bin and aggregate per bank ([`Aggregator`])
//! 3. Combine banks and smooth ([`K1Kernel`])
//! 4. Clamp to the preview limit ([`clamp_grid`])
//! 5. Derive spark advisories ([`SparkAdvisor`])
//!
//! Each run owns its accumulators and grids; nothing is shared between runs
//! except the immutable [`BinAxes`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use dyno_ve_core::{BinAxes, CorrectionConfig, Grid, PerBank};
use dyno_ve_ingest::{Dialect, IngestStats, LogReader, RecordStream, RejectionTally, SampleRecord};

use crate::aggregate::{Aggregation, Aggregator};
use crate::clamp::clamp_grid;
use crate::error::{SignalError, SignalResult};
use crate::kernel::K1Kernel;
use crate::spark::SparkAdvisor;

/// Serializable run summary written next to the preview grids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewSummary {
    /// When the preview was produced.
    pub generated_at: DateTime<Utc>,
    /// Dialect of the source log, when read from one.
    pub dialect: Option<Dialect>,
    /// Data rows seen.
    pub rows_read: usize,
    /// Rows that passed validation.
    pub rows_accepted: usize,
    /// Rows rejected by validation.
    pub rows_rejected: usize,
    /// Accepted rows under the weight floor.
    pub rows_idle: usize,
    /// Rows that reached a cell.
    pub rows_binned: usize,
    /// Rejections by reason.
    pub rejections: RejectionTally,
    /// Cells with a VE delta.
    pub cells_populated: usize,
    /// Cells limited by the preview clamp.
    pub cells_clamped: usize,
    /// Largest |VE delta| (%).
    pub max_abs_ve_delta: Option<f64>,
    /// Largest spark retard magnitude per bank (degrees).
    pub max_spark_retard: PerBank<f64>,
    /// Configuration used.
    pub config: CorrectionConfig,
}

/// Every grid produced by one preview run.
#[derive(Debug, Clone)]
pub struct PreviewResult {
    /// Weighted AFR error % per bank.
    pub afr_error: PerBank<Grid>,
    /// Bank-combined AFR error %.
    pub afr_error_combined: Grid,
    /// Combined error after the K1 kernel.
    pub smoothed: Grid,
    /// Smoothed error clamped to the preview limit.
    pub ve_delta: Grid,
    /// Spark advisory per bank (degrees, ≤ 0).
    pub spark: PerBank<Grid>,
    /// Mean torque per cell.
    pub torque_mean: Grid,
    /// Mean horsepower per cell.
    pub power_mean: Grid,
    /// Records contributing an AFR error per cell.
    pub hits: Grid,
    /// AFR error dispersion per bank.
    pub mad: PerBank<Grid>,
    /// AFR error dispersion over both banks.
    pub mad_combined: Grid,
    /// Run summary.
    pub summary: PreviewSummary,
    pub(crate) axes: Arc<BinAxes>,
}

impl PreviewResult {
    /// Axes the grids are laid out on.
    #[must_use]
    pub fn axes(&self) -> &BinAxes {
        &self.axes
    }
}

/// Runs the preview pipeline for one configuration.
#[derive(Debug, Clone)]
pub struct CorrectionPipeline {
    config: CorrectionConfig,
    axes: Arc<BinAxes>,
    kernel: K1Kernel,
    spark: SparkAdvisor,
}

impl CorrectionPipeline {
    /// Pipeline over the standard axes. Fails if `config` is invalid.
    pub fn new(config: CorrectionConfig) -> SignalResult<Self> {
        Self::with_axes(config, BinAxes::shared())
    }

    /// Pipeline over shared `axes`.
    pub fn with_axes(config: CorrectionConfig, axes: Arc<BinAxes>) -> SignalResult<Self> {
        config.validate()?;
        let kernel = K1Kernel::new(config.smoothing_passes, config.gradient_threshold);
        let spark = SparkAdvisor::new(config.spark.clone(), Arc::clone(&axes));
        Ok(Self {
            config,
            axes,
            kernel,
            spark,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Run on a log file.
    #[tracing::instrument(skip(self, path), fields(path = %path.display()))]
    pub fn run_path(&self, path: &Path) -> SignalResult<PreviewResult> {
        let stream = LogReader::new().open(path)?;
        self.run_stream(stream)
    }

    /// Run on any log byte source.
    #[tracing::instrument(skip(self, reader))]
    pub fn run_reader<R: Read>(&self, reader: R) -> SignalResult<PreviewResult> {
        let stream = LogReader::new().from_reader(reader)?;
        self.run_stream(stream)
    }

    /// Run on an opened record stream.
    pub fn run_stream(&self, mut stream: RecordStream) -> SignalResult<PreviewResult> {
        let mut aggregator = Aggregator::new(Arc::clone(&self.axes), &self.config);
        for record in stream.by_ref() {
            aggregator.push(&record);
        }
        let stats = stream.into_stats();
        self.finish(aggregator.finish(), Some(stats))
    }

    /// Run on already-validated records.
    pub fn run_records<I>(&self, records: I) -> SignalResult<PreviewResult>
    where
        I: IntoIterator<Item = SampleRecord>,
    {
        let mut aggregator = Aggregator::new(Arc::clone(&self.axes), &self.config);
        for record in records {
            aggregator.push(&record);
        }
        self.finish(aggregator.finish(), None)
    }

    fn finish(&self, agg: Aggregation, ingest: Option<IngestStats>) -> SignalResult<PreviewResult> {
        let rows_accepted = agg.rows_binned + agg.rows_idle;
        let (dialect, rows_read, rejections) = match ingest {
            Some(stats) => (Some(stats.dialect), stats.rows_read, stats.rejections),
            None => (None, rows_accepted, RejectionTally::default()),
        };
        if agg.rows_binned == 0 {
            return Err(SignalError::EmptyInput {
                rows_read,
                rows_rejected: rejections.total(),
                rows_idle: agg.rows_idle,
            });
        }

        let smoothed = self.kernel.apply(&agg.combined);
        let clamped = clamp_grid(&smoothed, self.config.preview_clamp);
        let spark = self.spark.advise(&agg.knock_max, &agg.iat_max);

        let summary = PreviewSummary {
            generated_at: Utc::now(),
            dialect,
            rows_read,
            rows_accepted,
            rows_rejected: rejections.total(),
            rows_idle: agg.rows_idle,
            rows_binned: agg.rows_binned,
            rejections,
            cells_populated: clamped.grid.populated_count(),
            cells_clamped: clamped.clamped_cells,
            max_abs_ve_delta: clamped.grid.max_abs(),
            max_spark_retard: spark.map(|_, g| g.max_abs().unwrap_or(0.0)),
            config: self.config.clone(),
        };
        tracing::info!(
            rows_binned = summary.rows_binned,
            rows_idle = summary.rows_idle,
            cells = summary.cells_populated,
            clamped = summary.cells_clamped,
            max_abs_ve_delta = summary.max_abs_ve_delta.unwrap_or(0.0),
            "Preview complete"
        );

        Ok(PreviewResult {
            afr_error: agg.afr_error,
            afr_error_combined: agg.combined,
            smoothed,
            ve_delta: clamped.grid,
            spark,
            torque_mean: agg.torque_mean,
            power_mean: agg.power_mean,
            hits: agg.hits,
            mad: agg.mad,
            mad_combined: agg.mad_combined,
            summary,
            axes: Arc::clone(&self.axes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "rpm,map_kpa,torque,afr_cmd_f,afr_cmd_r,afr_meas_f,afr_meas_r,knock_f,knock_r,iat\n\
                       3200,85,90,13.2,13.2,13.8,13.4,0,0,130\n\
                       3300,82,95,13.2,13.2,13.6,13.3,0,0,128\n\
                       5000,95,120,12.5,12.5,12.2,12.4,1.5,0,110\n\
                       1500,35,2,14.0,14.0,14.6,14.6,0,0,90\n\
                       9000,95,120,12.5,12.5,12.2,12.4,0,0,110\n";

    #[test]
    fn run_reader_produces_grids_and_summary() {
        let pipeline = CorrectionPipeline::new(CorrectionConfig::default()).unwrap();
        let result = pipeline.run_reader(LOG.as_bytes()).unwrap();

        let s = &result.summary;
        assert_eq!(s.dialect, Some(Dialect::Generic));
        assert_eq!(s.rows_read, 5);
        assert_eq!(s.rows_rejected, 1);
        assert_eq!(s.rows_accepted, 4);
        assert_eq!(s.rows_idle, 1);
        assert_eq!(s.rows_binned, 3);
        assert_eq!(s.cells_populated, 3);
        assert_eq!(result.ve_delta.populated_count(), result.smoothed.populated_count());
        assert_eq!(result.spark.rear.populated_count(), 55);
    }

    #[test]
    fn all_idle_is_empty_input() {
        let pipeline = CorrectionPipeline::new(CorrectionConfig::default()).unwrap();
        let log = "rpm,map_kpa,torque,afr_cmd_f,afr_meas_f\n1500,35,1,14.0,14.6\n";
        match pipeline.run_reader(log.as_bytes()) {
            Err(SignalError::EmptyInput {
                rows_read,
                rows_rejected,
                rows_idle,
            }) => {
                assert_eq!((rows_read, rows_rejected, rows_idle), (1, 0, 1));
            }
            other => panic!("expected EmptyInput, got {other:?}"),
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = CorrectionConfig {
            gradient_threshold: 0.0,
            ..CorrectionConfig::default()
        };
        assert!(matches!(
            CorrectionPipeline::new(config),
            Err(SignalError::Config(_))
        ));
    }
}
