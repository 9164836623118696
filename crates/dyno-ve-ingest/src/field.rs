//! Logical log fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical channel a dyno log may carry, independent of how a particular
/// export names its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Engine speed.
    Rpm,
    /// Manifold absolute pressure (kPa).
    MapKpa,
    /// Measured torque (ft-lb).
    Torque,
    /// Measured horsepower.
    Horsepower,
    /// Commanded air-fuel ratio, front cylinder.
    AfrCmdFront,
    /// Commanded air-fuel ratio, rear cylinder.
    AfrCmdRear,
    /// Measured air-fuel ratio, front cylinder.
    AfrMeasFront,
    /// Measured air-fuel ratio, rear cylinder.
    AfrMeasRear,
    /// Wideband lambda, front cylinder.
    LambdaFront,
    /// Wideband lambda, rear cylinder.
    LambdaRear,
    /// Knock retard (degrees), front cylinder.
    KnockFront,
    /// Knock retard (degrees), rear cylinder.
    KnockRear,
    /// Intake air temperature (°F).
    Iat,
    /// Throttle position (%).
    Tps,
    /// Battery voltage.
    Vbatt,
    /// Pseudo-field for rows with no usable air-fuel ratio on either bank.
    Afr,
}

impl Field {
    /// Every column-backed field, in resolution order.
    pub const COLUMNS: [Field; 15] = [
        Field::Rpm,
        Field::MapKpa,
        Field::Torque,
        Field::Horsepower,
        Field::AfrCmdFront,
        Field::AfrCmdRear,
        Field::AfrMeasFront,
        Field::AfrMeasRear,
        Field::LambdaFront,
        Field::LambdaRear,
        Field::KnockFront,
        Field::KnockRear,
        Field::Iat,
        Field::Tps,
        Field::Vbatt,
    ];

    /// Snake-case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Field::Rpm => "rpm",
            Field::MapKpa => "map_kpa",
            Field::Torque => "torque",
            Field::Horsepower => "horsepower",
            Field::AfrCmdFront => "afr_cmd_front",
            Field::AfrCmdRear => "afr_cmd_rear",
            Field::AfrMeasFront => "afr_meas_front",
            Field::AfrMeasRear => "afr_meas_rear",
            Field::LambdaFront => "lambda_front",
            Field::LambdaRear => "lambda_rear",
            Field::KnockFront => "knock_front",
            Field::KnockRear => "knock_rear",
            Field::Iat => "iat",
            Field::Tps => "tps",
            Field::Vbatt => "vbatt",
            Field::Afr => "afr",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
