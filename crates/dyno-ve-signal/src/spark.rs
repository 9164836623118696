//! Ignition-timing advisory.
//!
//! Every cell gets a value in degrees, zero or negative (retard only).
//! Knock-free cells outside the rear safety zone advise 0.

use std::sync::Arc;

use dyno_ve_core::{Bank, BinAxes, CellIndex, Grid, PerBank, SparkConfig};

/// Derives per-bank spark advisories from knock and intake temperature.
#[derive(Debug, Clone)]
pub struct SparkAdvisor {
    config: SparkConfig,
    axes: Arc<BinAxes>,
}

impl SparkAdvisor {
    /// Advisor over `axes` with `config`.
    #[must_use]
    pub fn new(config: SparkConfig, axes: Arc<BinAxes>) -> Self {
        Self { config, axes }
    }

    /// Knock-based pull: 0 below the threshold, else
    /// `-clamp(knock / knock_scale_deg × knock_gain, min_pull, max_pull)`.
    #[must_use]
    pub fn knock_pull(&self, knock: f64) -> f64 {
        let c = &self.config;
        if knock < c.knock_threshold_deg {
            return 0.0;
        }
        -(knock / c.knock_scale_deg * c.knock_gain).clamp(c.min_pull_deg, c.max_pull_deg)
    }

    /// Advisory for one cell before the rear-zone overlay. Missing knock
    /// reads as none; missing temperature reads as not hot.
    #[must_use]
    pub fn cell_advance(&self, knock: Option<f64>, iat: Option<f64>) -> f64 {
        let mut pull = self.knock_pull(knock.unwrap_or(0.0));
        if pull < 0.0 && self.is_hot(iat) {
            pull -= self.config.hot_penalty_deg;
        }
        pull
    }

    fn is_hot(&self, iat: Option<f64>) -> bool {
        iat.is_some_and(|t| t >= self.config.hot_iat_f)
    }

    /// Spark advisory grids for both banks.
    ///
    /// The rear grid then receives the safety-zone overlay: a fixed retard
    /// of `|rear_rule_deg|` in every zone cell, plus `rear_hot_penalty_deg`
    /// where the cell ran hot.
    #[must_use]
    pub fn advise(&self, knock_max: &PerBank<Grid>, iat_max: &Grid) -> PerBank<Grid> {
        let advisory = PerBank::from_fn(|bank| {
            let knock = knock_max.get(bank);
            let mut grid = Grid::from_fn(|cell| Some(self.cell_advance(knock.get(cell), iat_max.get(cell))));
            if bank == Bank::Rear {
                self.rear_overlay(&mut grid, iat_max);
            }
            grid
        });
        tracing::debug!(
            front_retard_cells = retard_cells(&advisory.front),
            rear_retard_cells = retard_cells(&advisory.rear),
            "Spark advisory generated"
        );
        advisory
    }

    fn rear_overlay(&self, grid: &mut Grid, iat_max: &Grid) {
        let c = &self.config;
        for cell in CellIndex::all() {
            let (rpm, load) = self.axes.centers(cell);
            if !c.in_rear_zone(rpm, load) {
                continue;
            }
            let mut pull = grid.get(cell).unwrap_or(0.0) - c.rear_rule_deg.abs();
            if self.is_hot(iat_max.get(cell)) {
                pull -= c.rear_hot_penalty_deg;
            }
            grid.set(cell, Some(pull));
        }
    }
}

fn retard_cells(grid: &Grid) -> usize {
    grid.populated().filter(|(_, v)| *v < 0.0).count()
}
