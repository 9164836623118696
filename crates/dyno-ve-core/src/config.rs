//! Correction pipeline configuration.
//!
//! [`CorrectionConfig`] holds every tunable used by the preview pipeline and
//! the apply step. It is serializable via [`serde`] so a run's settings can be
//! stored next to its outputs and loaded back.
//!
//! # Example
//!
//! ```rust
//! use dyno_ve_core::config::{CorrectionConfig, WeightMode};
//! use dyno_ve_core::limits::ClampLimit;
//!
//! let cfg = CorrectionConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.preview_clamp.limit(), 12.0);
//! assert_eq!(cfg.apply_clamp.limit(), 7.0);
//! assert_eq!(cfg.weighting, WeightMode::Torque);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::limits::{ApplyClamp, PreviewClamp};

/// Which load metric weights each sample during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMode {
    /// Weight by measured torque (ft-lb).
    #[default]
    Torque,
    /// Weight by horsepower.
    Power,
}

/// Ignition-timing advisory settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparkConfig {
    /// Knock retard below this (degrees) produces no pull. Default: **0.5**.
    pub knock_threshold_deg: f64,
    /// Knock divisor in `knock / knock_scale_deg × knock_gain`. Default: **3.0**.
    pub knock_scale_deg: f64,
    /// Pull multiplier in `knock / knock_scale_deg × knock_gain`. Default: **2.0**.
    pub knock_gain: f64,
    /// Smallest non-zero pull magnitude. Default: **0.5**.
    pub min_pull_deg: f64,
    /// Largest knock-based pull magnitude. Default: **2.0**.
    pub max_pull_deg: f64,
    /// Intake temperature (°F) at or above which hot penalties apply. Default: **120**.
    pub hot_iat_f: f64,
    /// Extra retard for a hot cell that already has a pull. Default: **0.5**.
    pub hot_penalty_deg: f64,
    /// Fixed retard magnitude inside the rear-cylinder safety zone. Default: **2.0**.
    pub rear_rule_deg: f64,
    /// Extra retard for a hot cell inside the rear safety zone. Default: **0.5**.
    pub rear_hot_penalty_deg: f64,
    /// Inclusive RPM-center range of the rear safety zone. Default: **[2800, 3600]**.
    pub rear_zone_rpm: [f64; 2],
    /// Inclusive load-center range of the rear safety zone. Default: **[75, 95]**.
    pub rear_zone_load: [f64; 2],
}

impl Default for SparkConfig {
    fn default() -> Self {
        Self {
            knock_threshold_deg: 0.5,
            knock_scale_deg: 3.0,
            knock_gain: 2.0,
            min_pull_deg: 0.5,
            max_pull_deg: 2.0,
            hot_iat_f: 120.0,
            hot_penalty_deg: 0.5,
            rear_rule_deg: 2.0,
            rear_hot_penalty_deg: 0.5,
            rear_zone_rpm: [2800.0, 3600.0],
            rear_zone_load: [75.0, 95.0],
        }
    }
}

impl SparkConfig {
    /// Whether a cell with these centers lies in the rear safety zone.
    #[must_use]
    pub fn in_rear_zone(&self, rpm_center: f64, load_center: f64) -> bool {
        (self.rear_zone_rpm[0]..=self.rear_zone_rpm[1]).contains(&rpm_center)
            && (self.rear_zone_load[0]..=self.rear_zone_load[1]).contains(&load_center)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("spark.knock_threshold_deg", self.knock_threshold_deg)?;
        if !self.knock_scale_deg.is_finite() || self.knock_scale_deg <= 0.0 {
            return Err(ConfigError::invalid_value(
                "spark.knock_scale_deg",
                "must be a finite value > 0.0",
            ));
        }
        non_negative("spark.knock_gain", self.knock_gain)?;
        non_negative("spark.min_pull_deg", self.min_pull_deg)?;
        non_negative("spark.max_pull_deg", self.max_pull_deg)?;
        if self.min_pull_deg > self.max_pull_deg {
            return Err(ConfigError::invalid_value(
                "spark.min_pull_deg",
                "must be <= spark.max_pull_deg",
            ));
        }
        finite("spark.hot_iat_f", self.hot_iat_f)?;
        non_negative("spark.hot_penalty_deg", self.hot_penalty_deg)?;
        finite("spark.rear_rule_deg", self.rear_rule_deg)?;
        non_negative("spark.rear_hot_penalty_deg", self.rear_hot_penalty_deg)?;
        ordered("spark.rear_zone_rpm", self.rear_zone_rpm)?;
        ordered("spark.rear_zone_load", self.rear_zone_load)?;
        Ok(())
    }
}

/// Complete configuration for one correction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Bound on the smoothed AFR-error surface. Default: **12.0 %**.
    pub preview_clamp: PreviewClamp,
    /// Bound on the factor grid at apply time. Default: **7.0 %**.
    pub apply_clamp: ApplyClamp,
    /// K1 averaging pass count N. Default: **2**.
    pub smoothing_passes: u32,
    /// K1 gradient threshold T. Default: **1.0**.
    pub gradient_threshold: f64,
    /// Sample weighting metric. Default: **torque**.
    pub weighting: WeightMode,
    /// Samples weighing less than this are treated as idle. Default: **5.0**.
    pub min_weight: f64,
    /// Accepted samples a cell needs before it reports a value. Default: **1**.
    pub min_hits: u32,
    /// Spark advisory settings.
    pub spark: SparkConfig,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            preview_clamp: PreviewClamp::default(),
            apply_clamp: ApplyClamp::default(),
            smoothing_passes: 2,
            gradient_threshold: 1.0,
            weighting: WeightMode::Torque,
            min_weight: 5.0,
            min_hits: 1,
            spark: SparkConfig::default(),
        }
    }
}

impl CorrectionConfig {
    /// Load a [`CorrectionConfig`] from a JSON file and validate it.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: CorrectionConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this configuration as pretty-printed JSON, creating parent
    /// directories if necessary.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileAccess {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Validate all fields, returning the first problem found.
    ///
    /// # Validated invariants
    ///
    /// - `gradient_threshold` must be finite and > 0.
    /// - `min_weight` must be finite and >= 0.
    /// - `min_hits` must be at least 1.
    /// - Spark pull bounds must be non-negative and ordered; zone ranges ordered.
    ///
    /// The two clamp limits are validated on construction and are not
    /// required to relate to each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gradient_threshold.is_finite() || self.gradient_threshold <= 0.0 {
            return Err(ConfigError::invalid_value(
                "gradient_threshold",
                "must be a finite value > 0.0",
            ));
        }
        non_negative("min_weight", self.min_weight)?;
        if self.min_hits == 0 {
            return Err(ConfigError::invalid_value("min_hits", "must be >= 1"));
        }
        self.spark.validate()
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(field, "must be finite"))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigError::invalid_value(field, "must be >= 0.0"));
    }
    Ok(())
}

fn ordered(field: &'static str, range: [f64; 2]) -> Result<(), ConfigError> {
    finite(field, range[0])?;
    finite(field, range[1])?;
    if range[0] > range[1] {
        return Err(ConfigError::invalid_value(field, "lower bound exceeds upper bound"));
    }
    Ok(())
}
