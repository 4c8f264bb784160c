//! Pass/fail decision over an analysis result.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LivenessError, Result};

/// Status the remote service reports for a live subject.
pub const STATUS_CONFIRMED: &str = "LIVENESS_CONFIRMED";

/// Minimum confidence, inclusive, for a confirmed verdict.
pub const CONFIDENCE_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub confirmed: bool,
    pub confidence: f64,
    pub raw_status: String,
}

/// Confirms only when both the confidence clears the threshold and the status says so.
///
/// Malformed input is an error rather than `confirmed = false`, so callers can tell a
/// broken result apart from a genuine negative one.
pub fn decide(confidence: f64, status: Option<&str>) -> Result<Verdict> {
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(LivenessError::invalid_result(format!(
            "confidence must be a finite number in [0, 1], got {confidence}"
        )));
    }

    let status = status
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LivenessError::invalid_result("status is missing"))?;

    Ok(Verdict {
        confirmed: confidence >= CONFIDENCE_THRESHOLD && status == STATUS_CONFIRMED,
        confidence,
        raw_status: status.to_string(),
    })
}

/// Scale the remote service reports confidence on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceScale {
    /// Fraction in [0, 1]
    #[default]
    Unit,
    /// Percentage in [0, 100]
    Percent,
}

impl ConfidenceScale {
    /// Converts a raw score onto [0, 1].
    ///
    /// Scores outside the configured range are `InvalidResult`; nothing is guessed
    /// from the magnitude of the value.
    pub fn normalize(self, raw: f64) -> Result<f64> {
        let max = match self {
            Self::Unit => 1.0,
            Self::Percent => 100.0,
        };
        if !raw.is_finite() || !(0.0..=max).contains(&raw) {
            return Err(LivenessError::invalid_result(format!(
                "confidence must be a finite number in [0, {max}], got {raw}"
            )));
        }
        Ok(raw / max)
    }
}

impl FromStr for ConfidenceScale {
    type Err = LivenessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit" | "fraction" => Ok(Self::Unit),
            "percent" | "percentage" => Ok(Self::Percent),
            other => Err(LivenessError::configuration(format!(
                "unknown confidence scale `{other}`, expected `unit` or `percent`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_table() {
        assert!(decide(0.95, Some("LIVENESS_CONFIRMED")).unwrap().confirmed);
        assert!(!decide(0.95, Some("LIVENESS_NOT_CONFIRMED")).unwrap().confirmed);
        assert!(!decide(0.5, Some("LIVENESS_CONFIRMED")).unwrap().confirmed);
        assert!(decide(0.8, Some("LIVENESS_CONFIRMED")).unwrap().confirmed);
    }

    #[test]
    fn test_verdict_keeps_raw_fields() {
        let verdict = decide(0.42, Some("LIVENESS_NOT_CONFIRMED")).unwrap();
        assert_eq!(verdict.confidence, 0.42);
        assert_eq!(verdict.raw_status, "LIVENESS_NOT_CONFIRMED");
    }

    #[test]
    fn test_malformed_results_are_errors() {
        for confidence in [f64::NAN, f64::INFINITY, -0.1, 1.5] {
            let err = decide(confidence, Some(STATUS_CONFIRMED)).unwrap_err();
            assert!(matches!(err, LivenessError::InvalidResult { .. }));
        }
        assert!(decide(0.9, None).is_err());
        assert!(decide(0.9, Some("  ")).is_err());
    }

    #[test]
    fn test_unit_scale_passes_fractions_through() {
        assert_eq!(ConfidenceScale::Unit.normalize(0.95).unwrap(), 0.95);
        assert_eq!(ConfidenceScale::Unit.normalize(1.0).unwrap(), 1.0);
        for raw in [1.5, 95.0, -0.01, f64::NAN] {
            let err = ConfidenceScale::Unit.normalize(raw).unwrap_err();
            assert!(matches!(err, LivenessError::InvalidResult { .. }));
        }
    }

    #[test]
    fn test_percent_scale_divides_only_when_configured() {
        assert_eq!(ConfidenceScale::Percent.normalize(95.0).unwrap(), 0.95);
        // 0.9 percent stays 0.9 percent.
        let low = ConfidenceScale::Percent.normalize(0.9).unwrap();
        assert!((low - 0.009).abs() < 1e-12);
        assert!(ConfidenceScale::Percent.normalize(150.0).is_err());
        assert!(ConfidenceScale::Percent.normalize(f64::INFINITY).is_err());
    }

    #[test]
    fn test_confidence_scale_from_str() {
        assert_eq!("unit".parse::<ConfidenceScale>().unwrap(), ConfidenceScale::Unit);
        assert_eq!(" Percent ".parse::<ConfidenceScale>().unwrap(), ConfidenceScale::Percent);
        assert!(matches!(
            "basis-points".parse::<ConfidenceScale>(),
            Err(LivenessError::Configuration { .. })
        ));
    }

    #[test]
    fn test_verdict_serialization() {
        let verdict = decide(0.9, Some(STATUS_CONFIRMED)).unwrap();
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["confirmed"], true);
        assert_eq!(json["rawStatus"], "LIVENESS_CONFIRMED");
    }
}
