//! Row normalization: raw CSV text in, typed [`PlotRecord`] out.
//!
//! Each row goes through the same steps, in order:
//!
//! 1. `Monitoring_Year` is reduced to its digits; a missing or zero year
//!    falls back to the UTC year of `Timestamp`.
//! 2. A blank `Data_Source` is filled in by the injected [`SourcePolicy`].
//! 3. Every measurement is coerced with `parseFloat` semantics, NaN on failure.
//! 4. GPS fields become a [`Location`] plus the raw parsed pair.
//! 5. `Timestamp` is read as UTC.
//!
//! Nothing here fails: bad input degrades to NaN or `None`.

use crate::plot::{columns, Location, Measurement, Measurements, PlotRecord};
use crate::raw::RawPlotRow;
use crate::source::SourcePolicy;
use bcr_utils::dates::parse_timestamp;
use bcr_utils::numbers::{digits_only, parse_float_prefix};
use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeMap;

/// A normalized row together with how its year was resolved.
#[derive(Debug, Clone)]
pub struct NormalizedPlot {
    pub record: PlotRecord,
    /// `Monitoring_Year` as it appeared in the source, if present.
    pub raw_year: Option<String>,
}

impl NormalizedPlot {
    /// One line describing the year resolution for this row.
    pub fn diagnostic(&self) -> String {
        let raw = self.raw_year.as_deref().unwrap_or("(none)");
        let year = self
            .record
            .monitoring_year
            .map_or_else(|| "null".to_string(), |y| y.to_string());
        format!("Parsed year for {}: {} → {}", self.record.id, raw, year)
    }
}

/// Turns raw rows into plot records, delegating missing sources to a policy.
pub struct Normalizer<P: SourcePolicy> {
    policy: P,
}

impl<P: SourcePolicy> Normalizer<P> {
    pub fn new(policy: P) -> Self {
        Normalizer { policy }
    }

    pub fn normalize(&mut self, row: &RawPlotRow) -> NormalizedPlot {
        let id = row.get(columns::ID).unwrap_or_default().to_string();
        let timestamp = row.get(columns::TIMESTAMP).and_then(parse_timestamp);
        let raw_year = row.get(columns::MONITORING_YEAR).map(str::to_string);
        let monitoring_year = resolve_year(raw_year.as_deref(), timestamp.as_ref());

        let data_source = match row.get(columns::DATA_SOURCE) {
            Some(source) => source.to_string(),
            None => self.policy.default_source(&id).to_string(),
        };

        let mut measurements = Measurements::default();
        for m in Measurement::ALL {
            measurements.set(m, coerce(row.get(m.field_name())));
        }

        let lat = row.get(columns::GPS_LAT).map(parse_number);
        let long = row.get(columns::GPS_LONG).map(parse_number);
        let location = Location::classify(lat, long);
        if matches!(location, Location::Invalid) {
            log::warn!("[BCR Debug] normalize: Plot {} has unusable GPS fields", id);
        }

        let record = PlotRecord {
            id,
            project_type: row.get(columns::PROJECT_TYPE).map(str::to_string),
            data_source,
            monitoring_year,
            timestamp,
            gps_lat: lat.unwrap_or(f64::NAN),
            gps_long: long.unwrap_or(f64::NAN),
            location,
            measurements,
            attributes: extra_columns(row),
        };
        NormalizedPlot { record, raw_year }
    }

    pub fn normalize_all(&mut self, rows: &[RawPlotRow]) -> Vec<NormalizedPlot> {
        rows.iter().map(|row| self.normalize(row)).collect()
    }
}

/// Resolve the monitoring year from the raw year text, falling back to the
/// timestamp's year when the text has no usable digits.
pub fn resolve_year(raw_year: Option<&str>, timestamp: Option<&DateTime<Utc>>) -> Option<i32> {
    let explicit = raw_year
        .map(digits_only)
        .and_then(|digits| digits.parse::<i32>().ok())
        .filter(|year| *year > 0);
    explicit.or_else(|| timestamp.map(|ts| ts.year()).filter(|year| *year > 0))
}

/// Coerce optional text to a float, NaN when absent or not numeric.
pub fn coerce(raw: Option<&str>) -> f64 {
    raw.map_or(f64::NAN, parse_number)
}

/// `parseFloat` with negative zero folded into zero, so every stored value
/// reads back with the same bits.
fn parse_number(text: &str) -> f64 {
    let value = parse_float_prefix(text);
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

fn extra_columns(row: &RawPlotRow) -> BTreeMap<String, String> {
    const TYPED: [&str; 7] = [
        columns::ID,
        columns::PROJECT_TYPE,
        columns::DATA_SOURCE,
        columns::MONITORING_YEAR,
        columns::TIMESTAMP,
        columns::GPS_LAT,
        columns::GPS_LONG,
    ];
    row.columns()
        .filter(|(name, _)| !TYPED.contains(name) && Measurement::from_field_name(name).is_none())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}
