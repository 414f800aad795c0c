//! Context pressure classification (spec §4.O, component H).
//!
//! Pressure levels from usage ratio:
//! `none < 0.5 ≤ low < 0.7 ≤ medium < hardLimit ≤ high < 1.0 ≤ critical`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Classify a usage ratio (`tokensUsed / windowSize`, typically 0.0..=1.0+)
/// against the fixed bands and the configured `hard_limit`.
///
/// `hard_limit` sits between the `medium` and `high` bands: usage below it
/// (but >= 0.7) is `medium`; usage at or above it (but below 1.0) is `high`.
pub fn classify(usage_ratio: f32, hard_limit: f32) -> PressureLevel {
    if usage_ratio >= 1.0 {
        PressureLevel::Critical
    } else if usage_ratio >= hard_limit {
        PressureLevel::High
    } else if usage_ratio >= 0.7 {
        PressureLevel::Medium
    } else if usage_ratio >= 0.5 {
        PressureLevel::Low
    } else {
        PressureLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_match_spec_thresholds() {
        assert_eq!(classify(0.0, 0.8), PressureLevel::None);
        assert_eq!(classify(0.49, 0.8), PressureLevel::None);
        assert_eq!(classify(0.5, 0.8), PressureLevel::Low);
        assert_eq!(classify(0.69, 0.8), PressureLevel::Low);
        assert_eq!(classify(0.7, 0.8), PressureLevel::Medium);
        assert_eq!(classify(0.79, 0.8), PressureLevel::Medium);
        assert_eq!(classify(0.8, 0.8), PressureLevel::High);
        assert_eq!(classify(0.99, 0.8), PressureLevel::High);
        assert_eq!(classify(1.0, 0.8), PressureLevel::Critical);
        assert_eq!(classify(1.2, 0.8), PressureLevel::Critical);
    }

    #[test]
    fn custom_hard_limit_shifts_high_band() {
        assert_eq!(classify(0.72, 0.75), PressureLevel::Medium);
        assert_eq!(classify(0.75, 0.75), PressureLevel::High);
    }
}
