//! Aggregation engine: filtered, sorted, summarized views over a reading
//! collection.
//!
//! Every operation here is a pure transformation over the supplied slice;
//! the underlying collection is never mutated.

use crate::models::{Parameter, SensorReading};
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Source restriction for historical views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
    /// Pass-through: no restriction.
    All,
    /// Exact match on the reading's source reference.
    Id(i64),
}

/// Field a reading list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    RecordedAt,
    Parameter(Parameter),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters readings to the inclusive date range `[start, end]`.
///
/// Both bounds must be present to filter; a single bound applies no
/// filtering at all (the check is conjunctive).
pub fn filter_by_date_range(
    readings: &[SensorReading],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<SensorReading> {
    let (Some(start), Some(end)) = (start, end) else {
        return readings.to_vec();
    };

    readings
        .iter()
        .filter(|r| {
            let day = r.recorded_at.date_naive();
            day >= start && day <= end
        })
        .cloned()
        .collect()
}

/// Filters readings by their source reference.
pub fn filter_by_source(readings: &[SensorReading], filter: SourceFilter) -> Vec<SensorReading> {
    match filter {
        SourceFilter::All => readings.to_vec(),
        SourceFilter::Id(id) => readings
            .iter()
            .filter(|r| r.source_id == Some(id))
            .cloned()
            .collect(),
    }
}

fn compare(field: SortField, a: &SensorReading, b: &SensorReading) -> Ordering {
    match field {
        SortField::RecordedAt => a.recorded_at.cmp(&b.recorded_at),
        SortField::Parameter(param) => {
            // Absent values order as 0.0 here only; statistics never see
            // this default.
            let av = param.value_of(a).unwrap_or(0.0);
            let bv = param.value_of(b).unwrap_or(0.0);
            av.partial_cmp(&bv).unwrap_or(Ordering::Equal)
        }
    }
}

/// Returns a sorted copy of `readings`.
///
/// Equal keys keep their relative input order in both directions; ties
/// are not broken further.
pub fn sort_by(readings: &[SensorReading], field: SortField, order: SortOrder) -> Vec<SensorReading> {
    let mut sorted = readings.to_vec();
    match order {
        SortOrder::Asc => sorted.sort_by(|a, b| compare(field, a, b)),
        SortOrder::Desc => sorted.sort_by(|a, b| compare(field, b, a)),
    }
    sorted
}

/// Summary statistics over a reading collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSummary {
    pub total_readings: usize,
    /// Number of distinct source ids present among the readings.
    pub distinct_sources: usize,
    means: [Option<f64>; Parameter::ALL.len()],
}

impl ReadingSummary {
    /// Mean of `param` over readings where it was measured, or `None`
    /// when no reading carries the parameter.
    pub fn mean(&self, param: Parameter) -> Option<f64> {
        self.means[param as usize]
    }
}

/// Arithmetic mean of `param` over readings where it is present.
///
/// Returns `None` rather than zero or NaN when no reading carries the
/// parameter.
fn mean_of(readings: &[SensorReading], param: Parameter) -> Option<f64> {
    let values: Vec<f64> = readings.iter().filter_map(|r| param.value_of(r)).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Computes per-parameter means, distinct source count, and total count.
pub fn summarize(readings: &[SensorReading]) -> ReadingSummary {
    let mut means = [None; Parameter::ALL.len()];
    for (slot, param) in means.iter_mut().zip(Parameter::ALL) {
        *slot = mean_of(readings, param);
    }

    let distinct_sources = readings
        .iter()
        .filter_map(|r| r.source_id)
        .collect::<HashSet<_>>()
        .len();

    ReadingSummary {
        total_readings: readings.len(),
        distinct_sources,
        means,
    }
}

/// Per-source comparison row.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceComparison {
    pub source_id: i64,
    pub reading_count: usize,
    /// Timestamp of the source's most recent reading, if it has any.
    pub latest: Option<DateTime<Utc>>,
    means: [Option<f64>; Parameter::ALL.len()],
}

impl SourceComparison {
    /// Rounded mean of `param` for this source, or `None` when the source
    /// has no readings carrying the parameter.
    pub fn mean(&self, param: Parameter) -> Option<f64> {
        self.means[param as usize]
    }
}

/// Means are displayed to one decimal; TDS reads better as a whole number.
fn round_for(param: Parameter, value: f64) -> f64 {
    match param {
        Parameter::TdsLevel => value.round(),
        _ => (value * 10.0).round() / 10.0,
    }
}

/// Builds one comparison row per requested source.
///
/// A source with no readings reports all parameter means as unavailable
/// rather than zero.
pub fn compare_sources(readings: &[SensorReading], source_ids: &[i64]) -> Vec<SourceComparison> {
    source_ids
        .iter()
        .map(|&id| {
            let rows = filter_by_source(readings, SourceFilter::Id(id));

            let mut means = [None; Parameter::ALL.len()];
            for (slot, param) in means.iter_mut().zip(Parameter::ALL) {
                *slot = mean_of(&rows, param).map(|m| round_for(param, m));
            }

            SourceComparison {
                source_id: id,
                reading_count: rows.len(),
                latest: rows.iter().map(|r| r.recorded_at).max(),
                means,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading_at(id: i64, source_id: Option<i64>, day: u32, ph: Option<f64>) -> SensorReading {
        SensorReading {
            id,
            source_id,
            location: "Sector 1".to_string(),
            recorded_at: Utc.with_ymd_and_hms(2024, 6, day, 10, 0, 0).unwrap(),
            ph_level: ph,
            turbidity: None,
            temperature: None,
            bacterial_count: None,
            dissolved_oxygen: None,
            chlorine_level: None,
            tds_level: None,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn test_date_filter_is_inclusive_on_both_bounds() {
        let readings = vec![
            reading_at(1, Some(1), 1, None),
            reading_at(2, Some(1), 5, None),
            reading_at(3, Some(1), 10, None),
        ];

        let filtered = filter_by_date_range(&readings, Some(date(1)), Some(date(5)));
        let ids: Vec<i64> = filtered.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_date_filter_with_single_bound_is_a_no_op() {
        let readings = vec![
            reading_at(1, Some(1), 1, None),
            reading_at(2, Some(1), 10, None),
        ];

        assert_eq!(
            filter_by_date_range(&readings, Some(date(5)), None).len(),
            2
        );
        assert_eq!(
            filter_by_date_range(&readings, None, Some(date(5))).len(),
            2
        );
    }

    #[test]
    fn test_filter_by_source() {
        let readings = vec![
            reading_at(1, Some(1), 1, None),
            reading_at(2, Some(2), 1, None),
            reading_at(3, None, 1, None),
        ];

        assert_eq!(filter_by_source(&readings, SourceFilter::All).len(), 3);

        let filtered = filter_by_source(&readings, SourceFilter::Id(2));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 2);
    }

    #[test]
    fn test_sort_desc_places_missing_values_last() {
        let readings = vec![
            reading_at(1, Some(1), 1, Some(6.8)),
            reading_at(2, Some(1), 2, None),
            reading_at(3, Some(1), 3, Some(7.9)),
        ];

        let sorted = sort_by(
            &readings,
            SortField::Parameter(Parameter::PhLevel),
            SortOrder::Desc,
        );
        let ids: Vec<i64> = sorted.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_sort_preserves_relative_order_of_equal_keys() {
        let readings = vec![
            reading_at(1, Some(1), 1, Some(7.0)),
            reading_at(2, Some(1), 2, Some(7.0)),
            reading_at(3, Some(1), 3, Some(6.0)),
        ];

        let sorted = sort_by(
            &readings,
            SortField::Parameter(Parameter::PhLevel),
            SortOrder::Desc,
        );
        let ids: Vec<i64> = sorted.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_by_timestamp_asc() {
        let readings = vec![
            reading_at(1, Some(1), 9, None),
            reading_at(2, Some(1), 2, None),
        ];

        let sorted = sort_by(&readings, SortField::RecordedAt, SortOrder::Asc);
        let ids: Vec<i64> = sorted.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_mean_over_present_values_only() {
        // pH present in exactly 2 of 5 readings; the mean divides by 2.
        let readings = vec![
            reading_at(1, Some(1), 1, Some(6.0)),
            reading_at(2, Some(1), 2, None),
            reading_at(3, Some(1), 3, Some(8.0)),
            reading_at(4, Some(1), 4, None),
            reading_at(5, Some(1), 5, None),
        ];

        let summary = summarize(&readings);
        assert_eq!(summary.mean(Parameter::PhLevel), Some(7.0));
        assert_eq!(summary.total_readings, 5);
    }

    #[test]
    fn test_absent_parameter_is_unavailable_not_zero() {
        let readings = vec![reading_at(1, Some(1), 1, Some(7.0))];
        let summary = summarize(&readings);
        assert_eq!(summary.mean(Parameter::Turbidity), None);
    }

    #[test]
    fn test_distinct_source_count_ignores_unsourced_readings() {
        let readings = vec![
            reading_at(1, Some(1), 1, None),
            reading_at(2, Some(1), 2, None),
            reading_at(3, Some(2), 3, None),
            reading_at(4, None, 4, None),
        ];

        let summary = summarize(&readings);
        assert_eq!(summary.distinct_sources, 2);
        assert_eq!(summary.total_readings, 4);
    }

    #[test]
    fn test_compare_sources_rounding() {
        let mut first = reading_at(1, Some(1), 1, Some(7.04));
        first.tds_level = Some(320.4);
        let mut second = reading_at(2, Some(1), 2, Some(7.11));
        second.tds_level = Some(330.4);

        let rows = compare_sources(&[first, second], &[1]);
        assert_eq!(rows.len(), 1);
        // One decimal for pH, whole number for TDS.
        assert_eq!(rows[0].mean(Parameter::PhLevel), Some(7.1));
        assert_eq!(rows[0].mean(Parameter::TdsLevel), Some(325.0));
        assert_eq!(rows[0].reading_count, 2);
    }

    #[test]
    fn test_compare_sources_without_readings_reports_unavailable() {
        let readings = vec![reading_at(1, Some(1), 1, Some(7.0))];
        let rows = compare_sources(&readings, &[1, 9]);

        assert_eq!(rows[1].source_id, 9);
        assert_eq!(rows[1].reading_count, 0);
        assert_eq!(rows[1].latest, None);
        for param in Parameter::ALL {
            assert_eq!(rows[1].mean(param), None);
        }
    }

    #[test]
    fn test_compare_sources_latest_timestamp() {
        let readings = vec![
            reading_at(1, Some(1), 2, None),
            reading_at(2, Some(1), 8, None),
            reading_at(3, Some(1), 5, None),
        ];

        let rows = compare_sources(&readings, &[1]);
        assert_eq!(
            rows[0].latest,
            Some(Utc.with_ymd_and_hms(2024, 6, 8, 10, 0, 0).unwrap())
        );
    }
}
