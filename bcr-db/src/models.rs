//! Query result model structs for plot and registry reports.
//!
//! All structs derive `Serialize` so the report battery can be emitted as JSON.

use bcr_plots::plot::PlotRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A plot as stored, with its bookkeeping timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct StoredPlot {
    #[serde(flatten)]
    pub record: PlotRecord,
    /// First time this `ID` was written. Preserved across re-ingestion.
    pub created_at: DateTime<Utc>,
    /// Last time the stored content changed.
    pub updated_at: DateTime<Utc>,
}

/// Counts reported by an upsert batch.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UpsertSummary {
    /// Rows whose `ID` was not yet stored.
    pub upserted: usize,
    /// Rows whose `ID` was already stored.
    pub matched: usize,
    /// Matched rows whose content differed from what was stored.
    pub modified: usize,
    /// Rows that could not be written.
    pub failures: Vec<WriteFailure>,
}

impl UpsertSummary {
    /// Rows that were written or matched.
    pub fn succeeded(&self) -> usize {
        self.upserted + self.matched
    }
}

/// One row of an upsert batch that could not be written.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WriteFailure {
    /// Zero-based position of the row in the batch.
    pub index: usize,
    pub id: String,
    pub message: String,
}

/// One component of a grouping key.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Text(String),
}

/// Output of the generic aggregation: one group key and its reductions,
/// in the order they were requested.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupStats {
    pub key: Vec<KeyValue>,
    pub count: i64,
    pub values: Vec<Option<f64>>,
}

/// Number of documents sharing a categorical value. `key` is `None` for
/// documents without the field.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryCount {
    pub key: Option<String>,
    pub count: i64,
}

/// Mean of a measurement per project type, optionally split by data source.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryAverage {
    pub project_type: String,
    pub data_source: Option<String>,
    pub count: i64,
    /// `None` when no plot in the group has a numeric value.
    pub average: Option<f64>,
}

/// Mean of a measurement per monitoring year, optionally split by data source.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct YearlyAverage {
    pub year: i32,
    pub data_source: Option<String>,
    pub count: i64,
    pub average: Option<f64>,
}

/// Biomass per monitoring year, optionally split by data source.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BiomassByYear {
    pub year: i32,
    pub data_source: Option<String>,
    pub count: i64,
    /// Mean above-ground biomass in kg.
    pub avg_above: Option<f64>,
    /// Mean below-ground biomass in kg.
    pub avg_below: Option<f64>,
    /// `avg_above + avg_below`.
    pub total: Option<f64>,
    /// Sum of above + below over plots that have both.
    pub total_sum: Option<f64>,
}

/// Mean of a measurement per calendar month of `Timestamp`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyAverage {
    pub year: i32,
    /// 1-12.
    pub month: u32,
    pub data_source: Option<String>,
    pub count: i64,
    pub average: Option<f64>,
}

/// A plot returned by a proximity query.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NearbyPlot {
    pub id: String,
    pub gps_lat: f64,
    pub gps_long: f64,
    /// Great-circle distance from the reference point in meters.
    pub distance_m: f64,
}

/// Registry project with its credit balances.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectSummary {
    pub project_id: String,
    pub name: String,
    pub status: String,
    pub total_issued: i64,
    pub total_retired: i64,
    pub circulating: i64,
}

/// Registry transaction as shown in the recent activity report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionSummary {
    pub tx_type: String,
    pub project_id: Option<String>,
    pub amount: Option<i64>,
    pub timestamp: String,
}

/// A collection and how many documents it holds.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CollectionCount {
    pub name: String,
    pub count: i64,
}
