//! Per-row validation and reconstruction.
//!
//! Rules run in a fixed order and the first failing rule decides the
//! rejection reason:
//!
//! 1. `rpm` and `map_kpa` present.
//! 2. `rpm` and `map_kpa` inside their ranges.
//! 3. Torque present, or reconstructed from horsepower.
//! 4. Every present AFR value (including lambda reconstructions) plausible.
//! 5. Intake temperature and throttle inside their ranges when present.
//! 6. At least one bank carries both a commanded and a measured AFR.

use std::ops::RangeInclusive;

use dyno_ve_core::{Bank, PerBank};

use crate::columns::ColumnMap;
use crate::decode::parse_number;
use crate::field::Field;
use crate::record::{RejectReason, SampleRecord, HP_TORQUE_CONSTANT, LAMBDA_TO_AFR};

/// Accepted engine speed.
pub const RPM_RANGE: RangeInclusive<f64> = 400.0..=8000.0;
/// Accepted manifold pressure (kPa).
pub const MAP_RANGE: RangeInclusive<f64> = 10.0..=110.0;
/// Accepted air-fuel ratio.
pub const AFR_RANGE: RangeInclusive<f64> = 9.0..=18.0;
/// Lambda values eligible for AFR reconstruction.
pub const LAMBDA_RANGE: RangeInclusive<f64> = 0.6..=1.3;
/// Accepted intake air temperature (°F).
pub const IAT_RANGE: RangeInclusive<f64> = 30.0..=300.0;
/// Accepted throttle position (%).
pub const TPS_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// Turns raw cell rows into [`SampleRecord`]s for one resolved column map.
#[derive(Debug, Clone)]
pub struct Normalizer {
    columns: ColumnMap,
}

impl Normalizer {
    /// Create a normalizer over resolved columns.
    #[must_use]
    pub fn new(columns: ColumnMap) -> Self {
        Self { columns }
    }

    /// Resolved columns.
    #[must_use]
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Validate one row of cells.
    pub fn normalize<S: AsRef<str>>(&self, row: &[S]) -> Result<SampleRecord, RejectReason> {
        let value = |field: Field| -> Option<f64> {
            self.columns
                .get(field)
                .and_then(|i| row.get(i))
                .and_then(|cell| parse_number(cell.as_ref()))
        };

        let rpm = value(Field::Rpm).ok_or(RejectReason::MissingField { field: Field::Rpm })?;
        let map_kpa =
            value(Field::MapKpa).ok_or(RejectReason::MissingField { field: Field::MapKpa })?;
        in_range(Field::Rpm, rpm, &RPM_RANGE)?;
        in_range(Field::MapKpa, map_kpa, &MAP_RANGE)?;

        let hp = value(Field::Horsepower);
        let torque = match (value(Field::Torque), hp) {
            (Some(t), _) => t,
            (None, Some(hp)) if rpm > 0.0 => hp * HP_TORQUE_CONSTANT / rpm,
            _ => return Err(RejectReason::MissingField { field: Field::Torque }),
        };
        let horsepower = Some(hp.unwrap_or(torque * rpm / HP_TORQUE_CONSTANT));

        let mut lambda_rejected = None;
        let mut measured = |bank: Bank| -> Option<f64> {
            let (afr_field, lambda_field) = match bank {
                Bank::Front => (Field::AfrMeasFront, Field::LambdaFront),
                Bank::Rear => (Field::AfrMeasRear, Field::LambdaRear),
            };
            if let Some(afr) = value(afr_field) {
                return Some(afr);
            }
            let lambda = value(lambda_field)?;
            if LAMBDA_RANGE.contains(&lambda) {
                Some(lambda * LAMBDA_TO_AFR)
            } else {
                lambda_rejected.get_or_insert(lambda_field);
                None
            }
        };
        let afr_meas = PerBank::from_fn(&mut measured);

        let cmd_front = value(Field::AfrCmdFront);
        // A single commanded column serves both banks.
        let cmd_rear = if self.columns.has(Field::AfrCmdRear) {
            value(Field::AfrCmdRear)
        } else {
            cmd_front
        };
        let afr_cmd = PerBank {
            front: cmd_front,
            rear: cmd_rear,
        };

        for bank in Bank::ALL {
            let (cmd_field, meas_field) = match bank {
                Bank::Front => (Field::AfrCmdFront, Field::AfrMeasFront),
                Bank::Rear => (Field::AfrCmdRear, Field::AfrMeasRear),
            };
            for (field, afr) in [(cmd_field, afr_cmd.get(bank)), (meas_field, afr_meas.get(bank))] {
                if let Some(afr) = afr {
                    if !AFR_RANGE.contains(afr) {
                        return Err(RejectReason::InvalidRatio { field });
                    }
                }
            }
        }

        let iat = value(Field::Iat);
        if let Some(iat) = iat {
            in_range(Field::Iat, iat, &IAT_RANGE)?;
        }
        let tps = value(Field::Tps);
        if let Some(tps) = tps {
            in_range(Field::Tps, tps, &TPS_RANGE)?;
        }

        let usable = Bank::ALL
            .iter()
            .any(|b| afr_cmd.get(*b).is_some() && afr_meas.get(*b).is_some());
        if !usable {
            return Err(match lambda_rejected {
                Some(field) => RejectReason::InvalidRatio { field },
                None => RejectReason::MissingField { field: Field::Afr },
            });
        }

        Ok(SampleRecord {
            rpm,
            map_kpa,
            torque,
            horsepower,
            afr_cmd,
            afr_meas,
            knock: PerBank {
                front: value(Field::KnockFront),
                rear: value(Field::KnockRear),
            },
            iat,
            tps,
            vbatt: value(Field::Vbatt),
        })
    }
}

fn in_range(field: Field, value: f64, range: &RangeInclusive<f64>) -> Result<(), RejectReason> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(RejectReason::OutOfRange { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{normalize_header, Dialect};
    use approx::assert_abs_diff_eq;

    fn normalizer(raw: &[&str]) -> Normalizer {
        let headers: Vec<String> = raw.iter().map(|h| normalize_header(h)).collect();
        Normalizer::new(ColumnMap::resolve(Dialect::Generic, &headers).unwrap())
    }

    fn full() -> Normalizer {
        normalizer(&[
            "rpm",
            "map_kpa",
            "torque",
            "hp",
            "afr_cmd_f",
            "afr_cmd_r",
            "afr_meas_f",
            "afr_meas_r",
            "knock_f",
            "knock_r",
            "iat",
            "tps",
            "vbatt",
        ])
    }

    #[test]
    fn accepts_complete_row() {
        let rec = full()
            .normalize(&["3200", "85", "90", "", "13.2", "13.0", "13.8", "13.1", "0", "1.5", "130", "80", "13.9"])
            .unwrap();
        assert_eq!(rec.rpm, 3200.0);
        assert_eq!(rec.knock.rear, Some(1.5));
        assert_abs_diff_eq!(rec.horsepower.unwrap(), 90.0 * 3200.0 / 5252.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rec.afr_error(Bank::Front).unwrap(), -4.347_826_086_956_52, epsilon = 1e-9);
    }

    #[test]
    fn rpm_out_of_range() {
        let err = full()
            .normalize(&["9000", "85", "90", "", "13.2", "13.0", "13.8", "13.1", "", "", "", "", ""])
            .unwrap_err();
        assert_eq!(err, RejectReason::OutOfRange { field: Field::Rpm });
    }

    #[test]
    fn missing_map_reported_before_range() {
        let err = full()
            .normalize(&["9000", "", "90", "", "13.2", "13.0", "13.8", "13.1", "", "", "", "", ""])
            .unwrap_err();
        assert_eq!(err, RejectReason::MissingField { field: Field::MapKpa });
    }

    #[test]
    fn torque_rebuilt_from_horsepower() {
        let rec = full()
            .normalize(&["5252", "95", "", "100", "13.0", "", "13.0", "", "", "", "", "", ""])
            .unwrap();
        assert_abs_diff_eq!(rec.torque, 100.0, epsilon = 1e-12);
        assert_eq!(rec.horsepower, Some(100.0));
    }

    #[test]
    fn missing_torque_and_horsepower() {
        let err = full()
            .normalize(&["3000", "60", "", "", "13.0", "", "13.0", "", "", "", "", "", ""])
            .unwrap_err();
        assert_eq!(err, RejectReason::MissingField { field: Field::Torque });
    }

    #[test]
    fn implausible_afr_is_invalid_ratio() {
        let err = full()
            .normalize(&["3000", "60", "50", "", "13.0", "", "19.5", "", "", "", "", "", ""])
            .unwrap_err();
        assert_eq!(err, RejectReason::InvalidRatio { field: Field::AfrMeasFront });
    }

    #[test]
    fn hot_intake_is_out_of_range() {
        let err = full()
            .normalize(&["3000", "60", "50", "", "13.0", "", "13.0", "", "", "", "350", "", ""])
            .unwrap_err();
        assert_eq!(err, RejectReason::OutOfRange { field: Field::Iat });
    }

    #[test]
    fn throttle_outside_percent_is_out_of_range() {
        for tps in ["120", "-5"] {
            let err = full()
                .normalize(&["3000", "60", "50", "", "13.0", "", "13.0", "", "", "", "", tps, ""])
                .unwrap_err();
            assert_eq!(err, RejectReason::OutOfRange { field: Field::Tps });
        }
        let rec = full()
            .normalize(&["3000", "60", "50", "", "13.0", "", "13.0", "", "", "", "", "100", ""])
            .unwrap();
        assert_eq!(rec.tps, Some(100.0));
    }

    #[test]
    fn lambda_reconstruction_and_shared_target() {
        let n = normalizer(&["rpm", "map_kpa", "torque", "afr_target", "lambda_f", "lambda_r"]);
        let rec = n.normalize(&["3000", "80", "70", "13.0", "0.9", "1.0"]).unwrap();
        assert_abs_diff_eq!(rec.afr_meas.front.unwrap(), 0.9 * 14.57, epsilon = 1e-12);
        assert_abs_diff_eq!(rec.afr_meas.rear.unwrap(), 14.57, epsilon = 1e-12);
        assert_eq!(rec.afr_cmd.rear, Some(13.0));
    }

    #[test]
    fn out_of_range_lambda_only_row_is_invalid_ratio() {
        let n = normalizer(&["rpm", "map_kpa", "torque", "afr_target", "lambda_f"]);
        let err = n.normalize(&["3000", "80", "70", "13.0", "1.6"]).unwrap_err();
        assert_eq!(err, RejectReason::InvalidRatio { field: Field::LambdaFront });
    }

    #[test]
    fn no_measured_afr_is_missing_afr() {
        let n = normalizer(&["rpm", "map_kpa", "torque", "afr_target", "lambda_f"]);
        let err = n.normalize(&["3000", "80", "70", "13.0", ""]).unwrap_err();
        assert_eq!(err, RejectReason::MissingField { field: Field::Afr });
    }
}
