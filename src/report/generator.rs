//! Rendering of reading views: CSV export, readings table, summary and
//! comparison output for the terminal.

use crate::aggregate::{ReadingSummary, SourceComparison};
use crate::classify::{RiskPolicy, ThreeTierPolicy};
use crate::models::{source_name, Parameter, SensorReading, WaterSource};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Fixed CSV header row. Column order is part of the export contract.
const CSV_HEADER: &str = "Date & Time,Water Source,Location,pH Level,Turbidity (NTU),\
Temperature (°C),Bacterial Count (CFU/ml),TDS (ppm),Dissolved Oxygen (mg/L),\
Chlorine (mg/L),Risk Level";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn csv_value(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// Renders readings as CSV, one row per reading.
///
/// Fields are comma-joined without quoting or escaping: a location that
/// contains a comma shifts the columns of its row. Downstream consumers
/// depend on the exact naive format, so this is documented rather than
/// fixed.
pub fn generate_csv(readings: &[SensorReading], sources: &[WaterSource]) -> String {
    let mut rows = Vec::with_capacity(readings.len() + 1);
    rows.push(CSV_HEADER.to_string());

    for reading in readings {
        let tier = ThreeTierPolicy.classify(reading);
        let row = [
            reading.recorded_at.format(TIMESTAMP_FORMAT).to_string(),
            source_name(sources, reading.source_id),
            reading.location.clone(),
            csv_value(reading.ph_level),
            csv_value(reading.turbidity),
            csv_value(reading.temperature),
            csv_value(reading.bacterial_count),
            csv_value(reading.tds_level),
            csv_value(reading.dissolved_oxygen),
            csv_value(reading.chlorine_level),
            tier.to_string(),
        ];
        rows.push(row.join(","));
    }

    rows.join("\n")
}

/// File name for an export created on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("water_quality_data_{}.csv", date.format("%Y-%m-%d"))
}

/// Writes the CSV export into `dir`, returning the path written.
pub fn write_csv(
    readings: &[SensorReading],
    sources: &[WaterSource],
    dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf> {
    let path = dir.join(export_file_name(date));
    std::fs::write(&path, generate_csv(readings, sources))
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    Ok(path)
}

fn cell(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.*}", decimals, v))
}

fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Renders readings as a plain-text table for the terminal.
pub fn generate_table(readings: &[SensorReading], sources: &[WaterSource]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<19}  {:<20}  {:<20}  {:>5}  {:>6}  {:>9}  {:>6}  {:>8}  {:<6}\n",
        "Date & Time", "Source", "Location", "pH", "TDS", "Turbidity", "Temp", "Bacteria", "Risk"
    ));

    for reading in readings {
        let tier = ThreeTierPolicy.classify(reading);
        out.push_str(&format!(
            "{:<19}  {:<20}  {:<20}  {:>5}  {:>6}  {:>9}  {:>6}  {:>8}  {:<6}\n",
            reading.recorded_at.format(TIMESTAMP_FORMAT),
            clip(&source_name(sources, reading.source_id), 20),
            clip(&reading.location, 20),
            cell(reading.ph_level, 1),
            cell(reading.tds_level, 0),
            cell(reading.turbidity, 1),
            cell(reading.temperature, 1),
            cell(reading.bacterial_count, 0),
            tier,
        ));
    }

    out
}

/// Renders summary statistics as text.
pub fn generate_summary_text(summary: &ReadingSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Total Readings: {}", summary.total_readings));
    lines.push(format!("Distinct Sources: {}", summary.distinct_sources));
    lines.push(String::new());
    lines.push("Parameter Means (over readings where measured):".to_string());

    for param in Parameter::ALL {
        let value = match summary.mean(param) {
            Some(mean) => format!("{:.2} {}", mean, param.unit()).trim_end().to_string(),
            None => "unavailable".to_string(),
        };
        lines.push(format!("- {}: {}", param.label(), value));
    }

    lines.join("\n")
}

/// Renders the source comparison rows as a plain-text table.
pub fn generate_comparison_table(
    comparisons: &[SourceComparison],
    sources: &[WaterSource],
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<20}  {:>5}  {:>9}  {:>15}  {:>9}  {:>9}  {:>8}  {:<19}\n",
        "Source", "pH", "TDS (ppm)", "Turbidity (NTU)", "Temp (°C)", "DO (mg/L)", "Readings",
        "Last Reading"
    ));

    for row in comparisons {
        out.push_str(&format!(
            "{:<20}  {:>5}  {:>9}  {:>15}  {:>9}  {:>9}  {:>8}  {:<19}\n",
            clip(&source_name(sources, Some(row.source_id)), 20),
            cell(row.mean(Parameter::PhLevel), 1),
            cell(row.mean(Parameter::TdsLevel), 0),
            cell(row.mean(Parameter::Turbidity), 1),
            cell(row.mean(Parameter::Temperature), 1),
            cell(row.mean(Parameter::DissolvedOxygen), 1),
            row.reading_count,
            row.latest
                .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_else(|| "never".to_string()),
        ));
    }

    out
}
