//! Validated sample records and row rejection bookkeeping.

use serde::ser::Serializer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use dyno_ve_core::{Bank, PerBank};

use crate::field::Field;

/// Stoichiometric AFR used to convert wideband lambda to AFR.
pub const LAMBDA_TO_AFR: f64 = 14.57;

/// Horsepower ↔ torque conversion constant (hp = torque × rpm / 5252).
pub const HP_TORQUE_CONSTANT: f64 = 5252.0;

/// Signed AFR error in percent: `(commanded − measured) / measured × 100`.
///
/// Negative whenever measured is above commanded. Returns `None` when
/// `measured` is zero.
#[must_use]
pub fn afr_error_pct(commanded: f64, measured: f64) -> Option<f64> {
    if measured == 0.0 {
        return None;
    }
    Some((commanded - measured) / measured * 100.0)
}

/// One validated log row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRecord {
    /// Engine speed.
    pub rpm: f64,
    /// Manifold absolute pressure (kPa).
    pub map_kpa: f64,
    /// Torque (ft-lb), measured or reconstructed from horsepower.
    pub torque: f64,
    /// Horsepower, measured or reconstructed from torque.
    pub horsepower: Option<f64>,
    /// Commanded air-fuel ratio per bank.
    pub afr_cmd: PerBank<Option<f64>>,
    /// Measured air-fuel ratio per bank (possibly reconstructed from lambda).
    pub afr_meas: PerBank<Option<f64>>,
    /// Knock retard (degrees) per bank.
    pub knock: PerBank<Option<f64>>,
    /// Intake air temperature (°F).
    pub iat: Option<f64>,
    /// Throttle position (%).
    pub tps: Option<f64>,
    /// Battery voltage.
    pub vbatt: Option<f64>,
}

impl SampleRecord {
    /// AFR error for `bank`, when both commanded and measured are present.
    #[must_use]
    pub fn afr_error(&self, bank: Bank) -> Option<f64> {
        let cmd = (*self.afr_cmd.get(bank))?;
        let meas = (*self.afr_meas.get(bank))?;
        afr_error_pct(cmd, meas)
    }
}

/// Why a row was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectReason {
    /// A required value was absent.
    MissingField {
        /// The absent field.
        field: Field,
    },
    /// A value fell outside its declared range.
    OutOfRange {
        /// The offending field.
        field: Field,
    },
    /// An air-fuel ratio or lambda value was not plausible.
    InvalidRatio {
        /// The offending field.
        field: Field,
    },
    /// The row could not be split into cells at all.
    Malformed,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingField { field } => write!(f, "missing_field:{field}"),
            RejectReason::OutOfRange { field } => write!(f, "out_of_range:{field}"),
            RejectReason::InvalidRatio { field } => write!(f, "invalid_ratio:{field}"),
            RejectReason::Malformed => f.write_str("malformed"),
        }
    }
}

/// Ordered per-reason rejection counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionTally {
    counts: BTreeMap<RejectReason, usize>,
}

impl RejectionTally {
    /// Count one rejection.
    pub fn record(&mut self, reason: RejectReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    /// Count for one reason.
    #[must_use]
    pub fn count(&self, reason: RejectReason) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    /// Total rejected rows.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Whether nothing was rejected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Reasons and counts in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (RejectReason, usize)> + '_ {
        self.counts.iter().map(|(r, c)| (*r, *c))
    }
}

impl Serialize for RejectionTally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.counts.iter().map(|(r, c)| (r.to_string(), c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn afr_error_sign_convention() {
        // Commanded 13.2 against measured 13.8.
        let err = afr_error_pct(13.2, 13.8).unwrap();
        assert_abs_diff_eq!(err, -4.347_826_086_956_52, epsilon = 1e-9);
        assert!(err < 0.0);
    }

    #[test]
    fn afr_error_zero_measured_is_none() {
        assert_eq!(afr_error_pct(13.0, 0.0), None);
    }

    #[test]
    fn tally_counts_and_serializes_in_order() {
        let mut t = RejectionTally::default();
        t.record(RejectReason::OutOfRange { field: Field::Rpm });
        t.record(RejectReason::OutOfRange { field: Field::Rpm });
        t.record(RejectReason::MissingField { field: Field::Torque });
        assert_eq!(t.total(), 3);
        assert_eq!(t.count(RejectReason::OutOfRange { field: Field::Rpm }), 2);

        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"missing_field:torque":1,"out_of_range:rpm":2}"#);
    }
}
