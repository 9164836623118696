//! Binning and load-weighted aggregation.
//!
//! Each record lands in the cell nearest to its (rpm, map) on the shared
//! [`BinAxes`]. Per bank, a cell accumulates `error × weight` and `weight`,
//! so its resolved value is the load-weighted mean AFR error. Records whose
//! weight is under the floor are idle and never reach a cell.

use std::sync::Arc;

use dyno_ve_core::{
    Bank, BinAxes, CellIndex, CorrectionConfig, Grid, PerBank, WeightMode, LOAD_BINS, RPM_BINS,
};
use dyno_ve_ingest::SampleRecord;

use crate::stats::median_absolute_deviation;

const CELLS: usize = RPM_BINS * LOAD_BINS;

fn slot(cell: CellIndex) -> usize {
    cell.row * LOAD_BINS + cell.col
}

/// Running statistics for one cell of one bank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellAccumulator {
    /// Σ error × weight.
    pub weighted_sum: f64,
    /// Σ weight.
    pub weight_total: f64,
    /// Records that contributed an AFR error.
    pub hits: u32,
    /// Raw AFR errors, for dispersion.
    pub errors: Vec<f64>,
    /// Records binned here, with or without an AFR error.
    pub samples: u32,
    /// Σ torque over `samples`.
    pub torque_sum: f64,
    /// Σ horsepower over `samples`.
    pub power_sum: f64,
    /// Largest knock retard seen.
    pub knock_max: Option<f64>,
    /// Largest intake temperature seen.
    pub iat_max: Option<f64>,
}

impl CellAccumulator {
    /// Weighted mean error, or `None` below `min_hits` or without weight.
    #[must_use]
    pub fn resolve(&self, min_hits: u32) -> Option<f64> {
        (self.hits >= min_hits && self.hits > 0 && self.weight_total > 0.0)
            .then(|| self.weighted_sum / self.weight_total)
    }

    /// Median absolute deviation of the raw errors.
    #[must_use]
    pub fn dispersion(&self) -> Option<f64> {
        median_absolute_deviation(&self.errors)
    }

    fn record_sample(&mut self, rec: &SampleRecord, knock: Option<f64>) {
        self.samples += 1;
        self.torque_sum += rec.torque;
        self.power_sum += rec.horsepower.unwrap_or(0.0);
        self.knock_max = max_opt(self.knock_max, knock);
        self.iat_max = max_opt(self.iat_max, rec.iat);
    }

    fn record_error(&mut self, error: f64, weight: f64) {
        self.weighted_sum += error * weight;
        self.weight_total += weight;
        self.hits += 1;
        self.errors.push(error);
    }
}

fn max_opt(current: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (current, value) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// The 55 cell accumulators of one bank.
#[derive(Debug, Clone, PartialEq)]
pub struct BankAccumulator {
    cells: Vec<CellAccumulator>,
}

impl Default for BankAccumulator {
    fn default() -> Self {
        Self {
            cells: vec![CellAccumulator::default(); CELLS],
        }
    }
}

impl BankAccumulator {
    /// Accumulator for `cell`.
    #[must_use]
    pub fn cell(&self, cell: CellIndex) -> &CellAccumulator {
        &self.cells[slot(cell)]
    }

    fn cell_mut(&mut self, cell: CellIndex) -> &mut CellAccumulator {
        &mut self.cells[slot(cell)]
    }

    /// Grid of per-cell values produced by `f`.
    pub fn grid(&self, mut f: impl FnMut(&CellAccumulator) -> Option<f64>) -> Grid {
        Grid::from_fn(|cell| f(self.cell(cell)))
    }
}

/// Consumes records and accumulates per-bank cell statistics.
#[derive(Debug, Clone)]
pub struct Aggregator {
    axes: Arc<BinAxes>,
    weighting: WeightMode,
    min_weight: f64,
    min_hits: u32,
    banks: PerBank<BankAccumulator>,
    hits_any: Vec<u32>,
    rows_binned: usize,
    rows_idle: usize,
}

impl Aggregator {
    /// Aggregator using the weighting, weight floor and hit threshold of
    /// `config`.
    #[must_use]
    pub fn new(axes: Arc<BinAxes>, config: &CorrectionConfig) -> Self {
        Self {
            axes,
            weighting: config.weighting,
            min_weight: config.min_weight,
            min_hits: config.min_hits,
            banks: PerBank::default(),
            hits_any: vec![0; CELLS],
            rows_binned: 0,
            rows_idle: 0,
        }
    }

    /// Aggregation weight of `rec`: the configured load metric, floored at zero.
    #[must_use]
    pub fn weight(&self, rec: &SampleRecord) -> f64 {
        let metric = match self.weighting {
            WeightMode::Torque => rec.torque,
            WeightMode::Power => rec.horsepower.unwrap_or(0.0),
        };
        metric.max(0.0)
    }

    /// Add one record. Returns the cell it landed in, or `None` if idle.
    pub fn push(&mut self, rec: &SampleRecord) -> Option<CellIndex> {
        let weight = self.weight(rec);
        if weight < self.min_weight {
            self.rows_idle += 1;
            return None;
        }
        let cell = self.axes.locate(rec.rpm, rec.map_kpa)?;
        self.rows_binned += 1;

        let mut contributed = false;
        for bank in Bank::ALL {
            let acc = self.banks.get_mut(bank).cell_mut(cell);
            acc.record_sample(rec, *rec.knock.get(bank));
            if let Some(error) = rec.afr_error(bank) {
                acc.record_error(error, weight);
                contributed = true;
            }
        }
        if contributed {
            self.hits_any[slot(cell)] += 1;
        }
        Some(cell)
    }

    /// Records that reached a cell.
    #[must_use]
    pub fn rows_binned(&self) -> usize {
        self.rows_binned
    }

    /// Records excluded by the weight floor.
    #[must_use]
    pub fn rows_idle(&self) -> usize {
        self.rows_idle
    }

    /// Resolve every accumulator into grids.
    #[must_use]
    pub fn finish(self) -> Aggregation {
        let min_hits = self.min_hits;
        let afr_error = self.banks.clone().map(|_, acc| acc.grid(|c| c.resolve(min_hits)));
        let mad = self.banks.clone().map(|_, acc| acc.grid(CellAccumulator::dispersion));
        let knock_max = self.banks.clone().map(|_, acc| acc.grid(|c| c.knock_max));

        // Torque, power and intake temperature are fed to both banks alike.
        let shared = &self.banks.front;
        let mean = |sum: fn(&CellAccumulator) -> f64| {
            shared.grid(|c| (c.samples > 0).then(|| sum(c) / f64::from(c.samples)))
        };
        let torque_mean = mean(|c| c.torque_sum);
        let power_mean = mean(|c| c.power_sum);
        let iat_max = shared.grid(|c| c.iat_max);

        let hits = Grid::from_fn(|cell| {
            let n = self.hits_any[slot(cell)];
            (n > 0).then(|| f64::from(n))
        });
        let mad_combined = Grid::from_fn(|cell| {
            let mut errors = self.banks.front.cell(cell).errors.clone();
            errors.extend_from_slice(&self.banks.rear.cell(cell).errors);
            median_absolute_deviation(&errors)
        });

        let combined = combine_banks(&afr_error.front, &afr_error.rear);
        tracing::debug!(
            rows_binned = self.rows_binned,
            rows_idle = self.rows_idle,
            front_cells = afr_error.front.populated_count(),
            rear_cells = afr_error.rear.populated_count(),
            combined_cells = combined.populated_count(),
            "Aggregation resolved"
        );

        Aggregation {
            afr_error,
            combined,
            torque_mean,
            power_mean,
            hits,
            mad,
            mad_combined,
            knock_max,
            iat_max,
            rows_binned: self.rows_binned,
            rows_idle: self.rows_idle,
        }
    }
}

/// Resolved aggregation grids.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Weighted mean AFR error % per bank.
    pub afr_error: PerBank<Grid>,
    /// Bank-combined AFR error %.
    pub combined: Grid,
    /// Mean torque per cell.
    pub torque_mean: Grid,
    /// Mean horsepower per cell.
    pub power_mean: Grid,
    /// Records contributing an AFR error on either bank.
    pub hits: Grid,
    /// AFR error dispersion per bank.
    pub mad: PerBank<Grid>,
    /// AFR error dispersion over both banks.
    pub mad_combined: Grid,
    /// Largest knock retard per bank.
    pub knock_max: PerBank<Grid>,
    /// Largest intake temperature.
    pub iat_max: Grid,
    /// Records that reached a cell.
    pub rows_binned: usize,
    /// Records excluded by the weight floor.
    pub rows_idle: usize,
}

/// Mean of both banks where both have data, else whichever has data.
#[must_use]
pub fn combine_banks(front: &Grid, rear: &Grid) -> Grid {
    front.zip_with(rear, |f, r| match (f, r) {
        (Some(f), Some(r)) => Some((f + r) / 2.0),
        (f, r) => f.or(r),
    })
}
