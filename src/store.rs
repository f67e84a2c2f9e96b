//! In-memory readings store, insert validation, and dataset loading.
//!
//! The store is the working set the aggregation engine and the analysis
//! orchestrator operate on. Range violations are rejected on insert,
//! never clamped, so the core only ever sees validated records.

use crate::models::{SensorReading, WaterSource};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// A reading submitted by data entry, before it is assigned an identity.
///
/// Source id and location are mandatory; every numeric parameter is
/// optional ("not measured").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReading {
    pub source_id: i64,
    pub location: String,
    #[serde(default)]
    pub ph_level: Option<f64>,
    #[serde(default)]
    pub turbidity: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub bacterial_count: Option<f64>,
    #[serde(default)]
    pub dissolved_oxygen: Option<f64>,
    #[serde(default)]
    pub chlorine_level: Option<f64>,
    #[serde(default)]
    pub tds_level: Option<f64>,
    /// Timestamp override for imported data; defaults to the insert time.
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Rejection reason for a manually entered reading.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("location is required")]
    MissingLocation,
    #[error("{name} must be between {min} and {max}")]
    OutOfRange {
        name: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{name} must be at least {min}")]
    BelowMinimum { name: &'static str, min: f64 },
}

fn check_range(
    name: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < min || v > max => Err(ValidationError::OutOfRange { name, min, max }),
        _ => Ok(()),
    }
}

fn check_min(name: &'static str, value: Option<f64>, min: f64) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < min => Err(ValidationError::BelowMinimum { name, min }),
        _ => Ok(()),
    }
}

/// Validates a new reading against the documented acceptance ranges.
pub fn validate(reading: &NewReading) -> Result<(), ValidationError> {
    if reading.location.trim().is_empty() {
        return Err(ValidationError::MissingLocation);
    }

    check_range("pH Level", reading.ph_level, 0.0, 14.0)?;
    check_min("Turbidity", reading.turbidity, 0.0)?;
    check_range("Temperature", reading.temperature, -10.0, 50.0)?;
    check_min("Bacterial Count", reading.bacterial_count, 0.0)?;
    check_range("Dissolved Oxygen", reading.dissolved_oxygen, 0.0, 20.0)?;
    check_range("Chlorine Level", reading.chlorine_level, 0.0, 10.0)?;
    check_range("TDS Level", reading.tds_level, 0.0, 3000.0)?;

    Ok(())
}

/// In-memory working set of readings.
///
/// Readings are immutable once stored; only the membership of the set
/// changes as new readings arrive. The real-time feed gives no
/// deduplication guarantee, so a duplicate is appended as another
/// reading rather than merged.
#[derive(Debug)]
pub struct ReadingStore {
    readings: Vec<SensorReading>,
    next_id: i64,
}

impl Default for ReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingStore {
    pub fn new() -> Self {
        Self {
            readings: Vec::new(),
            next_id: 1,
        }
    }

    /// Seeds the store with an existing dataset.
    pub fn with_readings(readings: Vec<SensorReading>) -> Self {
        let next_id = readings.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        Self { readings, next_id }
    }

    /// Validates and stores a manually entered reading.
    pub fn insert(&mut self, new: NewReading) -> Result<SensorReading, ValidationError> {
        validate(&new)?;

        let reading = SensorReading {
            id: self.next_id,
            source_id: Some(new.source_id),
            location: new.location,
            recorded_at: new.recorded_at.unwrap_or_else(Utc::now),
            ph_level: new.ph_level,
            turbidity: new.turbidity,
            temperature: new.temperature,
            bacterial_count: new.bacterial_count,
            dissolved_oxygen: new.dissolved_oxygen,
            chlorine_level: new.chlorine_level,
            tds_level: new.tds_level,
        };
        self.next_id += 1;

        debug!("Stored reading {} at {}", reading.id, reading.location);
        self.readings.push(reading.clone());
        Ok(reading)
    }

    /// Appends an already-formed reading pushed by the real-time feed.
    pub fn push(&mut self, reading: SensorReading) {
        self.next_id = self.next_id.max(reading.id + 1);
        self.readings.push(reading);
    }

    /// Snapshot ordered by timestamp descending (newest first).
    pub fn readings(&self) -> Vec<SensorReading> {
        let mut snapshot = self.readings.clone();
        snapshot.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        snapshot
    }

    /// The most recent reading, if any.
    pub fn latest(&self) -> Option<&SensorReading> {
        self.readings.iter().max_by_key(|r| r.recorded_at)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Loads a readings dataset (JSON array of sensor readings).
pub fn load_readings(path: &Path) -> Result<Vec<SensorReading>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read readings file: {}", path.display()))?;

    let readings: Vec<SensorReading> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse readings file: {}", path.display()))?;

    Ok(readings)
}

/// Loads a water sources dataset (JSON array of sources).
pub fn load_sources(path: &Path) -> Result<Vec<WaterSource>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sources file: {}", path.display()))?;

    let sources: Vec<WaterSource> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse sources file: {}", path.display()))?;

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_reading() -> NewReading {
        NewReading {
            source_id: 1,
            location: "Community Well A".to_string(),
            ph_level: Some(7.2),
            turbidity: Some(2.1),
            temperature: Some(24.5),
            bacterial_count: Some(10.0),
            dissolved_oxygen: None,
            chlorine_level: None,
            tds_level: Some(320.0),
            recorded_at: None,
        }
    }

    #[test]
    fn test_validate_accepts_in_range_reading() {
        assert_eq!(validate(&new_reading()), Ok(()));
    }

    #[test]
    fn test_validate_accepts_all_absent_parameters() {
        let mut reading = new_reading();
        reading.ph_level = None;
        reading.turbidity = None;
        reading.temperature = None;
        reading.bacterial_count = None;
        reading.tds_level = None;
        assert_eq!(validate(&reading), Ok(()));
    }

    #[test]
    fn test_validate_rejects_out_of_range_ph() {
        let mut reading = new_reading();
        reading.ph_level = Some(15.0);
        assert_eq!(
            validate(&reading),
            Err(ValidationError::OutOfRange {
                name: "pH Level",
                min: 0.0,
                max: 14.0
            })
        );
    }

    #[test]
    fn test_validate_rejects_negative_turbidity() {
        let mut reading = new_reading();
        reading.turbidity = Some(-1.0);
        assert_eq!(
            validate(&reading),
            Err(ValidationError::BelowMinimum {
                name: "Turbidity",
                min: 0.0
            })
        );
    }

    #[test]
    fn test_validate_rejects_blank_location() {
        let mut reading = new_reading();
        reading.location = "   ".to_string();
        assert_eq!(validate(&reading), Err(ValidationError::MissingLocation));
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut store = ReadingStore::new();
        let first = store.insert(new_reading()).unwrap();
        let second = store.insert(new_reading()).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_insert_rejects_invalid_reading_without_storing() {
        let mut store = ReadingStore::new();
        let mut reading = new_reading();
        reading.tds_level = Some(5000.0);
        assert!(store.insert(reading).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_is_ordered_newest_first() {
        let mut store = ReadingStore::new();
        let mut older = new_reading();
        older.recorded_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let mut newer = new_reading();
        newer.recorded_at = Some(Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap());

        store.insert(older).unwrap();
        store.insert(newer).unwrap();

        let snapshot = store.readings();
        assert_eq!(snapshot[0].id, 2);
        assert_eq!(snapshot[1].id, 1);
        assert_eq!(store.latest().unwrap().id, 2);
    }

    #[test]
    fn test_duplicate_feed_readings_are_appended_not_merged() {
        let mut store = ReadingStore::new();
        let reading = store.insert(new_reading()).unwrap();
        store.push(reading.clone());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_load_readings_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("readings.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "location": "Borehole B", "recorded_at": "2024-06-01T10:00:00Z", "ph_level": 6.8}]"#,
        )
        .unwrap();

        let readings = load_readings(&path).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].ph_level, Some(6.8));

        let store = ReadingStore::with_readings(readings);
        assert_eq!(store.latest().unwrap().id, 1);
    }

    #[test]
    fn test_load_readings_rejects_malformed_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("readings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_readings(&path).is_err());
    }
}
