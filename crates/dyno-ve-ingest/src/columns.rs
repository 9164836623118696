//! Resolution of logical fields to header columns.
//!
//! Matching is case-insensitive on normalized headers and runs in passes over
//! all fields: exact matches, then substring matches, then substring matches
//! on fallback candidates. A fallback is a candidate that another candidate
//! of the same field extends by a further word (`"knock"` and `"knock f"`),
//! so a bare name never steals a column another field matches more
//! specifically. A column claimed by one field is not reused by a later one.

use std::collections::BTreeMap;

use crate::dialect::Dialect;
use crate::error::{IngestError, IngestResult};
use crate::field::Field;

/// Column positions for every resolved field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    dialect: Dialect,
    columns: BTreeMap<Field, usize>,
    headers: Vec<String>,
}

impl ColumnMap {
    /// Resolve every field against normalized `headers` using `dialect`'s
    /// candidate lists, then enforce the required-field rules.
    ///
    /// Required: `rpm`, `map_kpa`, one of `torque`/`horsepower`, one measured
    /// AFR or lambda column, and one commanded AFR column.
    pub fn resolve(dialect: Dialect, headers: &[String]) -> IngestResult<Self> {
        let mut columns = BTreeMap::new();
        let mut claimed = vec![false; headers.len()];

        for pass in [Pass::Exact, Pass::Substring, Pass::Fallback] {
            for field in Field::COLUMNS {
                if columns.contains_key(&field) {
                    continue;
                }
                if let Some(idx) = find_column(dialect.candidates(field), headers, &claimed, pass) {
                    claimed[idx] = true;
                    columns.insert(field, idx);
                }
            }
        }

        let map = Self {
            dialect,
            columns,
            headers: headers.to_vec(),
        };
        map.check_required()?;
        Ok(map)
    }

    fn check_required(&self) -> IngestResult<()> {
        for field in [Field::Rpm, Field::MapKpa] {
            if !self.has(field) {
                return Err(IngestError::Schema {
                    field,
                    dialect: self.dialect,
                    headers: self.headers.clone(),
                });
            }
        }
        let groups: [&[Field]; 3] = [
            &[Field::Torque, Field::Horsepower],
            &[
                Field::AfrMeasFront,
                Field::AfrMeasRear,
                Field::LambdaFront,
                Field::LambdaRear,
            ],
            &[Field::AfrCmdFront, Field::AfrCmdRear],
        ];
        for group in groups {
            if !group.iter().any(|f| self.has(*f)) {
                return Err(IngestError::SchemaAlternatives {
                    alternatives: group.to_vec(),
                    dialect: self.dialect,
                    headers: self.headers.clone(),
                });
            }
        }
        Ok(())
    }

    /// Dialect used for resolution.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Column index of `field`, if resolved.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// Whether `field` resolved to a column.
    #[must_use]
    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Header name backing `field`.
    #[must_use]
    pub fn header(&self, field: Field) -> Option<&str> {
        self.get(field).map(|i| self.headers[i].as_str())
    }

    /// Fields without a column.
    pub fn unresolved(&self) -> impl Iterator<Item = Field> + '_ {
        Field::COLUMNS.into_iter().filter(|f| !self.has(*f))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Exact,
    Substring,
    Fallback,
}

/// Whether another candidate of the field extends `cand` by a further word.
fn is_fallback(cand: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|other| {
        other
            .strip_prefix(cand)
            .is_some_and(|rest| rest.starts_with([' ', '_']))
    })
}

fn find_column(
    candidates: &[&str],
    headers: &[String],
    claimed: &[bool],
    pass: Pass,
) -> Option<usize> {
    candidates
        .iter()
        .filter(|cand| match pass {
            Pass::Exact => true,
            Pass::Substring => !is_fallback(cand, candidates),
            Pass::Fallback => is_fallback(cand, candidates),
        })
        .find_map(|cand| {
            headers.iter().enumerate().find_map(|(i, h)| {
                let hit = match pass {
                    Pass::Exact => h == cand,
                    Pass::Substring | Pass::Fallback => h.contains(cand),
                };
                (hit && !claimed[i]).then_some(i)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::normalize_header;

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|h| normalize_header(h)).collect()
    }

    #[test]
    fn exact_match_beats_substring() {
        // "rpm" is a substring of "engine rpm target" but "engine rpm" is exact.
        let h = headers(&["Engine RPM Target", "Engine RPM", "MAP kPa", "Torque", "AFR 1", "AFR Target"]);
        let map = ColumnMap::resolve(Dialect::WinPep, &h).unwrap();
        assert_eq!(map.get(Field::Rpm), Some(1));
    }

    #[test]
    fn claimed_columns_are_not_reused() {
        let h = headers(&["Engine RPM", "MAP", "Torque", "Knock Rear", "AFR 1", "AFR Target"]);
        let map = ColumnMap::resolve(Dialect::WinPep, &h).unwrap();
        // Front candidate "knock" would substring-match "knock rear",
        // but the rear field takes it exactly first.
        assert_eq!(map.header(Field::KnockRear), Some("knock rear"));
        assert!(!map.has(Field::KnockFront));
    }

    #[test]
    fn bare_fallback_does_not_steal_bank_column() {
        // "knock" substring-matches both headers; the rear field's
        // "knock retard 2" must claim the first one.
        let h = headers(&[
            "Engine RPM",
            "MAP kPa",
            "Torque",
            "AFR 1",
            "AFR Target",
            "Knock Retard 2 (deg)",
            "Knock (deg)",
        ]);
        let map = ColumnMap::resolve(Dialect::WinPep, &h).unwrap();
        assert_eq!(map.header(Field::KnockRear), Some("knock retard 2 (deg)"));
        assert_eq!(map.header(Field::KnockFront), Some("knock (deg)"));
    }

    #[test]
    fn cylinder_suffixed_knock_resolves_to_rear() {
        let h = headers(&["Engine RPM", "MAP kPa", "Torque", "AFR 1", "AFR Target", "Knock Retard Cyl 2"]);
        let map = ColumnMap::resolve(Dialect::WinPep, &h).unwrap();
        assert_eq!(map.header(Field::KnockRear), Some("knock retard cyl 2"));
        assert!(!map.has(Field::KnockFront));
    }

    #[test]
    fn bare_afr_yields_to_rear_meter() {
        let h = headers(&["rpm", "map_kpa", "torque", "afr_cmd_f", "wb_afr_r", "wb_afr"]);
        let map = ColumnMap::resolve(Dialect::Generic, &h).unwrap();
        assert_eq!(map.header(Field::AfrMeasRear), Some("wb_afr_r"));
        assert_eq!(map.header(Field::AfrMeasFront), Some("wb_afr"));
    }

    #[test]
    fn fallbacks_are_word_extensions() {
        let knock = Dialect::WinPep.candidates(Field::KnockFront);
        assert!(is_fallback("knock", knock));
        assert!(!is_fallback("knock f", knock));
        let rear = Dialect::Generic.candidates(Field::AfrCmdRear);
        assert!(!is_fallback("afr_cmd_r", rear));
    }

    #[test]
    fn case_insensitive_substring_resolution() {
        let h = headers(&[
            "Engine Speed (RPM)",
            "Manifold Absolute Pressure (kPa)",
            "Torque",
            "Air/Fuel Ratio Front",
            "Target AFR Front",
        ]);
        let map = ColumnMap::resolve(Dialect::PowerVision, &h).unwrap();
        assert_eq!(map.get(Field::Rpm), Some(0));
        assert_eq!(map.get(Field::MapKpa), Some(1));
        assert_eq!(map.get(Field::AfrMeasFront), Some(3));
        assert_eq!(map.get(Field::AfrCmdFront), Some(4));
    }

    #[test]
    fn missing_rpm_is_schema_error() {
        let h = headers(&["map_kpa", "torque", "afr_meas_f", "afr_cmd_f"]);
        let err = ColumnMap::resolve(Dialect::Generic, &h).unwrap_err();
        assert!(matches!(err, IngestError::Schema { field: Field::Rpm, .. }));
    }

    #[test]
    fn horsepower_satisfies_load_requirement() {
        let h = headers(&["rpm", "map_kpa", "hp", "afr_meas_f", "afr_cmd_f"]);
        let map = ColumnMap::resolve(Dialect::Generic, &h).unwrap();
        assert!(!map.has(Field::Torque));
        assert!(map.has(Field::Horsepower));
    }

    #[test]
    fn missing_all_afr_sources_is_schema_error() {
        let h = headers(&["rpm", "map_kpa", "torque", "afr_cmd_f"]);
        let err = ColumnMap::resolve(Dialect::Generic, &h).unwrap_err();
        assert!(matches!(err, IngestError::SchemaAlternatives { .. }));
    }
}
