//! Symmetric clamp limits.
//!
//! The preview surface and the apply step use different limits. They are
//! separate types so a preview limit can never be passed where the apply
//! limit is expected, or the reverse.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A symmetric bound `[-limit, +limit]`.
pub trait ClampLimit: Copy {
    /// The positive bound.
    fn limit(self) -> f64;

    /// `max(-limit, min(limit, value))`.
    fn clamp(self, value: f64) -> f64 {
        let limit = self.limit();
        value.min(limit).max(-limit)
    }
}

macro_rules! clamp_limit {
    ($(#[$meta:meta])* $name:ident, $field:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        #[serde(try_from = "f64", into = "f64")]
        pub struct $name(f64);

        impl $name {
            /// Exclusive upper bound on the limit.
            pub const MAX: f64 = $max;

            /// Create a limit; it must be finite, strictly positive and
            /// below [`Self::MAX`].
            pub fn new(limit: f64) -> Result<Self, ConfigError> {
                if !limit.is_finite() || limit <= 0.0 || limit >= Self::MAX {
                    return Err(ConfigError::invalid_value(
                        $field,
                        format!("must be a finite value in (0, {}), got {limit}", Self::MAX),
                    ));
                }
                Ok(Self(limit))
            }
        }

        impl ClampLimit for $name {
            fn limit(self) -> f64 {
                self.0
            }
        }

        impl TryFrom<f64> for $name {
            type Error = ConfigError;

            fn try_from(limit: f64) -> Result<Self, Self::Error> {
                Self::new(limit)
            }
        }

        impl From<$name> for f64 {
            fn from(limit: $name) -> f64 {
                limit.0
            }
        }
    };
}

clamp_limit!(
    /// Limit applied to the smoothed AFR-error surface (default 12 %).
    PreviewClamp,
    "preview_clamp",
    f64::INFINITY
);

clamp_limit!(
    /// Limit applied to the factor grid at apply time (default 7 %).
    ///
    /// Must stay below 100 % so every scale `1 + factor / 100` is positive
    /// and rollback can divide by it.
    ApplyClamp,
    "apply_clamp",
    100.0
);

impl Default for PreviewClamp {
    fn default() -> Self {
        Self(12.0)
    }
}

impl Default for ApplyClamp {
    fn default() -> Self {
        Self(7.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(PreviewClamp::default().limit(), 12.0);
        assert_eq!(ApplyClamp::default().limit(), 7.0);
    }

    #[test]
    fn clamps_symmetrically() {
        let m = ApplyClamp::default();
        assert_eq!(m.clamp(9.0), 7.0);
        assert_eq!(m.clamp(-9.0), -7.0);
        assert_eq!(m.clamp(3.25), 3.25);
    }

    #[test]
    fn rejects_non_positive_limits() {
        assert!(PreviewClamp::new(0.0).is_err());
        assert!(ApplyClamp::new(-1.0).is_err());
        assert!(ApplyClamp::new(f64::NAN).is_err());
    }

    #[test]
    fn apply_limit_stays_below_100() {
        assert!(ApplyClamp::new(99.9).is_ok());
        assert!(ApplyClamp::new(100.0).is_err());
        assert!(ApplyClamp::new(150.0).is_err());
        assert!(PreviewClamp::new(150.0).is_ok());
        assert!(serde_json::from_str::<ApplyClamp>("150").is_err());
    }

    #[test]
    fn serde_validates_on_load() {
        let ok: ApplyClamp = serde_json::from_str("5.5").unwrap();
        assert_eq!(ok.limit(), 5.5);
        assert!(serde_json::from_str::<ApplyClamp>("-2").is_err());
    }
}
