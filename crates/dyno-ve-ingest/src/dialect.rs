//! Log dialect families and header-keyword detection.
//!
//! Three export families are recognised. Each declares a set of header
//! keywords; the family whose keywords occur most often in the header wins.
//! Ties resolve in declaration order and a header that matches nothing is
//! read as [`Dialect::Generic`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::field::Field;

/// A family of dyno log exports sharing column naming conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Dynojet WinPEP run exports (`Engine RPM`, `AFR 1`, `Torque (ft-lb)`).
    WinPep,
    /// Power Vision / Power Core logs (`Engine Speed`, `Air/Fuel Ratio Front`).
    PowerVision,
    /// Snake-case canonical names (`rpm`, `map_kpa`, `afr_meas_f`).
    Generic,
}

impl Dialect {
    /// All dialects in detection priority order.
    pub const ALL: [Dialect; 3] = [Dialect::WinPep, Dialect::PowerVision, Dialect::Generic];

    /// Header keywords that identify this family.
    #[must_use]
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Dialect::WinPep => &[
                "engine rpm",
                "torque (ft-lb)",
                "power (hp)",
                "afr 1",
                "afr 2",
                "afr target",
                "knock retard",
                "winpep",
            ],
            Dialect::PowerVision => &[
                "engine speed",
                "manifold absolute pressure",
                "air/fuel ratio",
                "target afr",
                "intake air temperature",
                "spark retard",
                "throttle position",
                "battery voltage",
            ],
            Dialect::Generic => &[
                "map_kpa",
                "afr_cmd",
                "afr_meas",
                "afr_target",
                "knock_f",
                "knock_r",
                "lambda_f",
                "lambda_r",
            ],
        }
    }

    /// Number of this family's keywords present in `headers`.
    ///
    /// `headers` must already be normalized (see [`normalize_header`]).
    #[must_use]
    pub fn score(self, headers: &[String]) -> usize {
        self.keywords()
            .iter()
            .filter(|kw| headers.iter().any(|h| h.contains(*kw)))
            .count()
    }

    /// Pick the best-scoring family for a normalized header row.
    #[must_use]
    pub fn detect(headers: &[String]) -> Dialect {
        let mut best = Dialect::Generic;
        let mut best_score = 0;
        for dialect in Dialect::ALL {
            let score = dialect.score(headers);
            if score > best_score {
                best = dialect;
                best_score = score;
            }
        }
        best
    }

    /// Candidate column names for `field`, most specific first.
    #[must_use]
    pub fn candidates(self, field: Field) -> &'static [&'static str] {
        match self {
            Dialect::WinPep => winpep_candidates(field),
            Dialect::PowerVision => power_vision_candidates(field),
            Dialect::Generic => generic_candidates(field),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::WinPep => "WinPEP",
            Dialect::PowerVision => "Power Vision",
            Dialect::Generic => "generic",
        })
    }
}

/// Trim, lowercase and collapse internal whitespace of a header cell.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn winpep_candidates(field: Field) -> &'static [&'static str] {
    match field {
        Field::Rpm => &["engine rpm", "rpm"],
        Field::MapKpa => &["map kpa", "map (kpa)", "manifold pressure", "map"],
        Field::Torque => &["torque (ft-lb)", "torque", "tq"],
        Field::Horsepower => &["power (hp)", "horsepower", "hp", "power"],
        Field::AfrCmdFront => &["afr target 1", "afr target f", "afr target front", "afr target"],
        Field::AfrCmdRear => &["afr target 2", "afr target r", "afr target rear"],
        Field::AfrMeasFront => &["afr 1", "afr meas f", "afr front", "air/fuel ratio 1", "afr"],
        Field::AfrMeasRear => &["afr 2", "afr meas r", "afr rear", "air/fuel ratio 2"],
        Field::LambdaFront => &["lambda 1", "lambda f", "lambda front", "lambda"],
        Field::LambdaRear => &["lambda 2", "lambda r", "lambda rear"],
        Field::KnockFront => &[
            "knock retard 1",
            "knock retard cyl 1",
            "knock f",
            "knock front",
            "knock",
        ],
        Field::KnockRear => &["knock retard 2", "knock retard cyl 2", "knock r", "knock rear"],
        Field::Iat => &["iat", "intake air temp", "intake temp", "air temp"],
        Field::Tps => &["tps", "throttle position", "throttle"],
        Field::Vbatt => &["battery voltage", "vbatt", "battery", "volts"],
        Field::Afr => &[],
    }
}

fn power_vision_candidates(field: Field) -> &'static [&'static str] {
    match field {
        Field::Rpm => &["engine speed", "rpm"],
        Field::MapKpa => &["manifold absolute pressure", "map"],
        Field::Torque => &["torque"],
        Field::Horsepower => &["horsepower", "power"],
        Field::AfrCmdFront => &[
            "target afr front",
            "afr target front",
            "commanded afr front",
            "target afr",
        ],
        Field::AfrCmdRear => &["target afr rear", "afr target rear", "commanded afr rear"],
        Field::AfrMeasFront => &["air/fuel ratio front", "afr front", "wbo2 front"],
        Field::AfrMeasRear => &["air/fuel ratio rear", "afr rear", "wbo2 rear"],
        Field::LambdaFront => &["lambda front", "lambda"],
        Field::LambdaRear => &["lambda rear"],
        Field::KnockFront => &["knock retard front", "spark retard front", "knock front"],
        Field::KnockRear => &["knock retard rear", "spark retard rear", "knock rear"],
        Field::Iat => &["intake air temperature", "iat"],
        Field::Tps => &["throttle position", "tps"],
        Field::Vbatt => &["battery voltage", "vbatt"],
        Field::Afr => &[],
    }
}

fn generic_candidates(field: Field) -> &'static [&'static str] {
    match field {
        Field::Rpm => &["rpm", "engine_rpm"],
        Field::MapKpa => &["map_kpa", "map"],
        Field::Torque => &["torque", "torque_ftlb", "tq"],
        Field::Horsepower => &["horsepower", "hp", "power"],
        Field::AfrCmdFront => &["afr_cmd_f", "afr_target_f", "afr_cmd_front", "afr_cmd", "afr_target"],
        Field::AfrCmdRear => &["afr_cmd_r", "afr_target_r", "afr_cmd_rear"],
        Field::AfrMeasFront => &["afr_meas_f", "afr_f", "afr_front", "afr_meas", "afr"],
        Field::AfrMeasRear => &["afr_meas_r", "afr_r", "afr_rear"],
        Field::LambdaFront => &["lambda_f", "lambda_front", "lambda"],
        Field::LambdaRear => &["lambda_r", "lambda_rear"],
        Field::KnockFront => &["knock_f", "knock_front", "knock"],
        Field::KnockRear => &["knock_r", "knock_rear"],
        Field::Iat => &["iat", "intake_temp", "iat_f"],
        Field::Tps => &["tps", "throttle"],
        Field::Vbatt => &["vbatt", "battery_v", "battery"],
        Field::Afr => &[],
    }
}
