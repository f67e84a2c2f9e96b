//! Risk tier classification.
//!
//! Two divergent threshold rules exist for the same concept across the
//! display surfaces (tables and exports vs map markers). Both are kept as
//! named policies behind one trait; callers pick the granularity they need.

use crate::models::{RiskTier, SensorReading};

/// pH assumed when a reading did not measure it.
const DEFAULT_PH: f64 = 7.0;

/// TDS (ppm) assumed when a reading did not measure it.
const DEFAULT_TDS: f64 = 300.0;

/// A rule set mapping a reading to a risk tier.
///
/// Implementations are pure and total: every reading, however sparse,
/// yields a tier. Missing pH and TDS fall back to neutral defaults inside
/// `classify` only; the defaults never reach displayed or aggregated
/// values.
pub trait RiskPolicy {
    fn classify(&self, reading: &SensorReading) -> RiskTier;
}

/// Three-tier rule used for tables, exports, and the follow-mode re-tag.
///
/// High when pH leaves the 6.5–8.5 safe range or TDS exceeds 1000 ppm;
/// medium when pH leaves the narrower 7.0–8.0 band or TDS exceeds 500 ppm.
pub struct ThreeTierPolicy;

impl RiskPolicy for ThreeTierPolicy {
    fn classify(&self, reading: &SensorReading) -> RiskTier {
        let ph = reading.ph_level.unwrap_or(DEFAULT_PH);
        let tds = reading.tds_level.unwrap_or(DEFAULT_TDS);

        if ph < 6.5 || ph > 8.5 || tds > 1000.0 {
            RiskTier::High
        } else if ph < 7.0 || ph > 8.0 || tds > 500.0 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Two-tier rule used for map marker coloring: low inside the safe band
/// (pH 6.5–8.5 and TDS below 500 ppm), high everywhere else.
pub struct TwoTierPolicy;

impl RiskPolicy for TwoTierPolicy {
    fn classify(&self, reading: &SensorReading) -> RiskTier {
        let ph = reading.ph_level.unwrap_or(DEFAULT_PH);
        let tds = reading.tds_level.unwrap_or(DEFAULT_TDS);

        if (6.5..=8.5).contains(&ph) && tds < 500.0 {
            RiskTier::Low
        } else {
            RiskTier::High
        }
    }
}
