//! Data models for the water quality monitor.
//!
//! This module contains the core data structures shared by the
//! classifier, the aggregation engine, and the analysis orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Risk tier of a water quality reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// Water quality is within safe parameters.
    Low,
    /// Some parameters require monitoring.
    Medium,
    /// Immediate attention required.
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

impl RiskTier {
    /// Returns an emoji representation of the tier.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskTier::Low => "🟢",
            RiskTier::Medium => "🟡",
            RiskTier::High => "🔴",
        }
    }
}

/// One of the seven measured water quality parameters.
///
/// The discriminant order matches [`Parameter::ALL`]; summaries index
/// their per-parameter slots by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    PhLevel,
    Turbidity,
    Temperature,
    BacterialCount,
    DissolvedOxygen,
    ChlorineLevel,
    TdsLevel,
}

impl Parameter {
    /// All parameters, in discriminant order.
    pub const ALL: [Parameter; 7] = [
        Parameter::PhLevel,
        Parameter::Turbidity,
        Parameter::Temperature,
        Parameter::BacterialCount,
        Parameter::DissolvedOxygen,
        Parameter::ChlorineLevel,
        Parameter::TdsLevel,
    ];

    /// Human-readable label, as shown in tables and exports.
    pub fn label(&self) -> &'static str {
        match self {
            Parameter::PhLevel => "pH Level",
            Parameter::Turbidity => "Turbidity",
            Parameter::Temperature => "Temperature",
            Parameter::BacterialCount => "Bacterial Count",
            Parameter::DissolvedOxygen => "Dissolved Oxygen",
            Parameter::ChlorineLevel => "Chlorine",
            Parameter::TdsLevel => "TDS",
        }
    }

    /// Measurement unit. pH is dimensionless and returns an empty string.
    pub fn unit(&self) -> &'static str {
        match self {
            Parameter::PhLevel => "",
            Parameter::Turbidity => "NTU",
            Parameter::Temperature => "°C",
            Parameter::BacterialCount => "CFU/ml",
            Parameter::DissolvedOxygen => "mg/L",
            Parameter::ChlorineLevel => "mg/L",
            Parameter::TdsLevel => "ppm",
        }
    }

    /// Projects this parameter's value out of a reading.
    pub fn value_of(&self, reading: &SensorReading) -> Option<f64> {
        match self {
            Parameter::PhLevel => reading.ph_level,
            Parameter::Turbidity => reading.turbidity,
            Parameter::Temperature => reading.temperature,
            Parameter::BacterialCount => reading.bacterial_count,
            Parameter::DissolvedOxygen => reading.dissolved_oxygen,
            Parameter::ChlorineLevel => reading.chlorine_level,
            Parameter::TdsLevel => reading.tds_level,
        }
    }
}

impl FromStr for Parameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ph_level" => Ok(Parameter::PhLevel),
            "turbidity" => Ok(Parameter::Turbidity),
            "temperature" => Ok(Parameter::Temperature),
            "bacterial_count" => Ok(Parameter::BacterialCount),
            "dissolved_oxygen" => Ok(Parameter::DissolvedOxygen),
            "chlorine_level" => Ok(Parameter::ChlorineLevel),
            "tds_level" => Ok(Parameter::TdsLevel),
            other => Err(format!("unknown parameter: {}", other)),
        }
    }
}

/// A single timestamped measurement set from a water source.
///
/// Readings are immutable facts: once created, the parameter values never
/// change; only the membership of the working set changes as new readings
/// arrive. An absent parameter means "not measured" and must never be
/// treated as zero in statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: i64,
    /// Weak reference to a [`WaterSource`]; the source need not exist for
    /// the reading to be valid for display.
    #[serde(default)]
    pub source_id: Option<i64>,
    /// Free-text location description.
    pub location: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub ph_level: Option<f64>,
    /// Turbidity in NTU.
    #[serde(default)]
    pub turbidity: Option<f64>,
    /// Temperature in °C.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Bacterial count in CFU/ml.
    #[serde(default)]
    pub bacterial_count: Option<f64>,
    /// Dissolved oxygen in mg/L.
    #[serde(default)]
    pub dissolved_oxygen: Option<f64>,
    /// Chlorine in mg/L.
    #[serde(default)]
    pub chlorine_level: Option<f64>,
    /// Total dissolved solids in ppm.
    #[serde(default)]
    pub tds_level: Option<f64>,
}

/// Operational status of a water source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Active,
    Maintenance,
    Inactive,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Active => write!(f, "active"),
            SourceStatus::Maintenance => write!(f, "maintenance"),
            SourceStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// A monitored physical water point.
///
/// Created administratively; status is mutated out-of-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterSource {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub status: SourceStatus,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Resolves a reading's source reference against the known sources.
///
/// A dangling or absent reference renders as "Unknown Source".
pub fn source_name(sources: &[WaterSource], source_id: Option<i64>) -> String {
    let Some(id) = source_id else {
        return "Unknown Source".to_string();
    };
    sources
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| format!("Source {}", id))
}

/// Bilingual narrative produced by the analysis orchestrator.
///
/// The five fields mirror the completion endpoint's output contract; the
/// caller decides persistence and caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterAnalysis {
    pub causes_en: String,
    pub precautions_en: String,
    pub causes_te: String,
    pub precautions_te: String,
    pub risk_level: RiskTier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(id: i64, ph: Option<f64>, tds: Option<f64>) -> SensorReading {
        SensorReading {
            id,
            source_id: Some(1),
            location: "Community Well A".to_string(),
            recorded_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
            ph_level: ph,
            turbidity: None,
            temperature: None,
            bacterial_count: None,
            dissolved_oxygen: None,
            chlorine_level: None,
            tds_level: tds,
        }
    }

    #[test]
    fn test_risk_tier_ordering() {
        assert!(RiskTier::Low < RiskTier::Medium);
        assert!(RiskTier::Medium < RiskTier::High);
    }

    #[test]
    fn test_risk_tier_display() {
        assert_eq!(RiskTier::Low.to_string(), "low");
        assert_eq!(RiskTier::High.to_string(), "high");
        assert_eq!(RiskTier::Medium.emoji(), "🟡");
    }

    #[test]
    fn test_risk_tier_serde_lowercase() {
        assert_eq!(serde_json::to_string(&RiskTier::High).unwrap(), "\"high\"");
        let tier: RiskTier = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(tier, RiskTier::Medium);
    }

    #[test]
    fn test_parameter_projection() {
        let r = reading(1, Some(7.2), Some(320.0));
        assert_eq!(Parameter::PhLevel.value_of(&r), Some(7.2));
        assert_eq!(Parameter::TdsLevel.value_of(&r), Some(320.0));
        assert_eq!(Parameter::Turbidity.value_of(&r), None);
    }

    #[test]
    fn test_parameter_from_str() {
        assert_eq!("ph_level".parse::<Parameter>(), Ok(Parameter::PhLevel));
        assert_eq!(
            "dissolved_oxygen".parse::<Parameter>(),
            Ok(Parameter::DissolvedOxygen)
        );
        assert!("depth".parse::<Parameter>().is_err());
    }

    #[test]
    fn test_reading_deserializes_with_absent_parameters() {
        let json = r#"{
            "id": 7,
            "location": "Borehole B",
            "recorded_at": "2024-06-01T10:00:00Z",
            "ph_level": 6.8
        }"#;
        let r: SensorReading = serde_json::from_str(json).unwrap();
        assert_eq!(r.id, 7);
        assert_eq!(r.source_id, None);
        assert_eq!(r.ph_level, Some(6.8));
        assert_eq!(r.tds_level, None);
    }

    #[test]
    fn test_source_name_resolution() {
        let sources = vec![WaterSource {
            id: 1,
            name: "Community Well A".to_string(),
            location: "Sector 1".to_string(),
            status: SourceStatus::Active,
            latitude: None,
            longitude: None,
        }];
        assert_eq!(source_name(&sources, Some(1)), "Community Well A");
        assert_eq!(source_name(&sources, Some(9)), "Source 9");
        assert_eq!(source_name(&sources, None), "Unknown Source");
    }
}
