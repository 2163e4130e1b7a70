//! Typed report queries over plots and the registry collections.
//!
//! All queries are read-only and return structs from [`crate::models`].
//!
//! # Grouped averages
//!
//! Every categorical, yearly and monthly average goes through
//! [`Database::aggregate`], which takes a list of grouping [`Dimension`]s and
//! a list of [`Reduction`]s. Splitting a report by data source is the same
//! call with [`Dimension::DataSource`] appended.
//!
//! A plot lacking the value of any requested dimension is left out. A
//! measurement stored as NULL (NaN at ingestion) is skipped by the SQL
//! aggregates, and a group with no numeric values reports `None`.

use crate::error::{Result, StoreError};
use crate::geo::{bounding_box, haversine_m, GeoPoint};
use crate::models::{
    BiomassByYear, CategoryAverage, CategoryCount, CollectionCount, GroupStats, KeyValue,
    MonthlyAverage, NearbyPlot, ProjectSummary, TransactionSummary, YearlyAverage,
};
use crate::schema::{COLLECTIONS, SPATIAL_INDEX};
use crate::Database;
use bcr_plots::plot::Measurement;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde::Serialize;

/// A field plots can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dimension {
    ProjectType,
    DataSource,
    MonitoringYear,
    /// Calendar year and month of `Timestamp`; contributes two key parts.
    Month,
}

impl Dimension {
    fn key_exprs(self) -> &'static [&'static str] {
        match self {
            Dimension::ProjectType => &["project_type"],
            Dimension::DataSource => &["data_source"],
            Dimension::MonitoringYear => &["monitoring_year"],
            Dimension::Month => &[
                "CAST(strftime('%Y', timestamp) AS INTEGER)",
                "CAST(strftime('%m', timestamp) AS INTEGER)",
            ],
        }
    }

    fn presence(self) -> &'static str {
        match self {
            Dimension::ProjectType => "project_type IS NOT NULL",
            Dimension::DataSource => "data_source IS NOT NULL",
            Dimension::MonitoringYear => "monitoring_year IS NOT NULL",
            Dimension::Month => "strftime('%Y', timestamp) IS NOT NULL",
        }
    }
}

/// A reduction computed per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean(Measurement),
    /// Sum over the group of `a + b`, skipping plots missing either.
    PairSum(Measurement, Measurement),
}

impl Reduction {
    fn sql(self) -> String {
        match self {
            Reduction::Mean(m) => format!("AVG({})", m.column()),
            Reduction::PairSum(a, b) => format!("SUM({} + {})", a.column(), b.column()),
        }
    }
}

fn with_source(base: Dimension, by_source: bool) -> Vec<Dimension> {
    if by_source {
        vec![base, Dimension::DataSource]
    } else {
        vec![base]
    }
}

fn key_value(value: ValueRef<'_>, idx: usize) -> rusqlite::Result<KeyValue> {
    match value {
        ValueRef::Integer(i) => Ok(KeyValue::Int(i)),
        ValueRef::Text(t) => Ok(KeyValue::Text(String::from_utf8_lossy(t).into_owned())),
        ValueRef::Real(r) => Ok(KeyValue::Text(r.to_string())),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "group key".to_string(),
            other.data_type(),
        )),
    }
}

fn text_key(group: &GroupStats, idx: usize) -> Result<String> {
    match group.key.get(idx) {
        Some(KeyValue::Text(s)) => Ok(s.clone()),
        Some(KeyValue::Int(n)) => Ok(n.to_string()),
        None => Err(StoreError::UnexpectedValue(format!("no key part {idx}"))),
    }
}

fn int_key(group: &GroupStats, idx: usize) -> Result<i32> {
    match group.key.get(idx) {
        Some(KeyValue::Int(n)) => i32::try_from(*n)
            .map_err(|_| StoreError::UnexpectedValue(format!("key {n} out of range"))),
        other => Err(StoreError::UnexpectedValue(format!(
            "expected integer key part {idx}, got {other:?}"
        ))),
    }
}

fn source_key(group: &GroupStats, idx: usize, by_source: bool) -> Result<Option<String>> {
    if by_source {
        text_key(group, idx).map(Some)
    } else {
        Ok(None)
    }
}

fn index_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

impl Database {
    // ───────────────────── Generic Aggregation ─────────────────────

    /// Group plots by `dimensions` and compute `reductions` for each group.
    ///
    /// Groups are ordered ascending by their key tuple. With no dimensions
    /// the whole collection is one group (present even when empty, with a
    /// count of 0 and `None` values).
    pub fn aggregate(
        &self,
        dimensions: &[Dimension],
        reductions: &[Reduction],
    ) -> Result<Vec<GroupStats>> {
        let keys: Vec<&str> = dimensions
            .iter()
            .flat_map(|d| d.key_exprs().iter().copied())
            .collect();
        let mut select: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        select.push("COUNT(*)".to_string());
        select.extend(reductions.iter().map(|r| r.sql()));

        let mut sql = format!("SELECT {} FROM plots", select.join(", "));
        if !dimensions.is_empty() {
            let presence: Vec<&str> = dimensions.iter().map(|d| d.presence()).collect();
            sql.push_str(&format!(
                " WHERE {} GROUP BY {} ORDER BY {}",
                presence.join(" AND "),
                keys.join(", "),
                keys.join(", ")
            ));
        }

        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(&sql)?;
        let key_len = keys.len();
        let rows = stmt
            .query_map([], |row| {
                let key = (0..key_len)
                    .map(|i| key_value(row.get_ref(i)?, i))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                let values = (0..reductions.len())
                    .map(|j| row.get::<_, Option<f64>>(key_len + 1 + j))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(GroupStats {
                    key,
                    count: row.get(key_len)?,
                    values,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        log::info!(
            "[BCR Debug] query: aggregate {:?} returned {} groups",
            dimensions,
            rows.len()
        );
        Ok(rows)
    }

    // ───────────────────── Plot Reports ─────────────────────

    /// Total number of stored plots.
    pub fn count_plots(&self) -> Result<i64> {
        let conn = self.conn.borrow();
        Ok(conn.query_row("SELECT COUNT(*) FROM plots", [], |row| row.get(0))?)
    }

    /// Plot counts per project type, largest first.
    pub fn plots_by_project_type(&self) -> Result<Vec<CategoryCount>> {
        self.count_grouped("plots", "project_type")
    }

    /// Mean of `metric` per project type, optionally split by data source.
    pub fn average_by_project_type(
        &self,
        metric: Measurement,
        by_source: bool,
    ) -> Result<Vec<CategoryAverage>> {
        let groups = self.aggregate(
            &with_source(Dimension::ProjectType, by_source),
            &[Reduction::Mean(metric)],
        )?;
        groups
            .iter()
            .map(|g| {
                Ok(CategoryAverage {
                    project_type: text_key(g, 0)?,
                    data_source: source_key(g, 1, by_source)?,
                    count: g.count,
                    average: g.values.first().copied().flatten(),
                })
            })
            .collect()
    }

    /// Mean of `metric` per monitoring year, optionally split by data source.
    /// Plots without a monitoring year are excluded.
    pub fn yearly_average(
        &self,
        metric: Measurement,
        by_source: bool,
    ) -> Result<Vec<YearlyAverage>> {
        let groups = self.aggregate(
            &with_source(Dimension::MonitoringYear, by_source),
            &[Reduction::Mean(metric)],
        )?;
        groups
            .iter()
            .map(|g| {
                Ok(YearlyAverage {
                    year: int_key(g, 0)?,
                    data_source: source_key(g, 1, by_source)?,
                    count: g.count,
                    average: g.values.first().copied().flatten(),
                })
            })
            .collect()
    }

    /// Above/below-ground biomass per monitoring year, optionally split by data source.
    pub fn biomass_by_year(&self, by_source: bool) -> Result<Vec<BiomassByYear>> {
        let groups = self.aggregate(
            &with_source(Dimension::MonitoringYear, by_source),
            &[
                Reduction::Mean(Measurement::BiomassAbove),
                Reduction::Mean(Measurement::BiomassBelow),
                Reduction::PairSum(Measurement::BiomassAbove, Measurement::BiomassBelow),
            ],
        )?;
        groups
            .iter()
            .map(|g| {
                let value = |j: usize| g.values.get(j).copied().flatten();
                let (avg_above, avg_below) = (value(0), value(1));
                Ok(BiomassByYear {
                    year: int_key(g, 0)?,
                    data_source: source_key(g, 1, by_source)?,
                    count: g.count,
                    avg_above,
                    avg_below,
                    total: avg_above.zip(avg_below).map(|(a, b)| a + b),
                    total_sum: value(2),
                })
            })
            .collect()
    }

    /// Mean of `metric` per calendar month of `Timestamp`, optionally split by
    /// data source. Plots without a timestamp are excluded.
    pub fn monthly_average(
        &self,
        metric: Measurement,
        by_source: bool,
    ) -> Result<Vec<MonthlyAverage>> {
        let groups = self.aggregate(
            &with_source(Dimension::Month, by_source),
            &[Reduction::Mean(metric)],
        )?;
        groups
            .iter()
            .map(|g| {
                let month = int_key(g, 1)?;
                Ok(MonthlyAverage {
                    year: int_key(g, 0)?,
                    month: u32::try_from(month).map_err(|_| {
                        StoreError::UnexpectedValue(format!("month {month} out of range"))
                    })?,
                    data_source: source_key(g, 2, by_source)?,
                    count: g.count,
                    average: g.values.first().copied().flatten(),
                })
            })
            .collect()
    }

    /// Plots with a valid location within `max_distance_m` of `center`,
    /// nearest first, at most `limit` of them.
    ///
    /// Requires the spatial index (see [`Database::prepare_spatial_index`]).
    pub fn plots_near(
        &self,
        center: GeoPoint,
        max_distance_m: f64,
        limit: usize,
    ) -> Result<Vec<NearbyPlot>> {
        let conn = self.conn.borrow();
        if !index_exists(&conn, SPATIAL_INDEX)? {
            return Err(StoreError::SpatialIndexMissing(SPATIAL_INDEX));
        }

        let bbox = bounding_box(center, max_distance_m);
        let mut stmt = conn.prepare(
            "SELECT id, location_lon, location_lat FROM plots
             WHERE location_status = 'valid'
               AND location_lat BETWEEN ?1 AND ?2
               AND location_lon BETWEEN ?3 AND ?4",
        )?;
        let mut hits = stmt
            .query_map(
                params![bbox.min_lat, bbox.max_lat, bbox.min_lon, bbox.max_lon],
                |row| {
                    let lon: f64 = row.get(1)?;
                    let lat: f64 = row.get(2)?;
                    Ok(NearbyPlot {
                        id: row.get(0)?,
                        gps_lat: lat,
                        gps_long: lon,
                        distance_m: haversine_m(center, GeoPoint::new(lon, lat)),
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        hits.retain(|p| p.distance_m <= max_distance_m);
        hits.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        log::info!(
            "[BCR Debug] query: plots_near returned {} records",
            hits.len()
        );
        Ok(hits)
    }

    // ───────────────────── Registry Reports ─────────────────────

    /// Projects whose status is `active`, in insertion order.
    pub fn active_projects(&self) -> Result<Vec<ProjectSummary>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT project_id, name, status, total_issued, total_retired, circulating
             FROM projects
             WHERE status = 'active'
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProjectSummary {
                    project_id: row.get(0)?,
                    name: row.get(1)?,
                    status: row.get(2)?,
                    total_issued: row.get(3)?,
                    total_retired: row.get(4)?,
                    circulating: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        log::info!(
            "[BCR Debug] query: active_projects returned {} records",
            rows.len()
        );
        Ok(rows)
    }

    /// Sum of issued credits across all projects.
    pub fn total_credits_issued(&self) -> Result<i64> {
        let conn = self.conn.borrow();
        Ok(conn.query_row(
            "SELECT COALESCE(SUM(total_issued), 0) FROM projects",
            [],
            |row| row.get(0),
        )?)
    }

    /// The `limit` most recent transactions, newest first.
    ///
    /// Timestamps are compared as instants, so offsets and sub-second
    /// precision written by other clients order correctly.
    pub fn recent_transactions(&self, limit: usize) -> Result<Vec<TransactionSummary>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(
            "SELECT type, project_id, amount, timestamp FROM transactions
             ORDER BY julianday(timestamp) DESC, timestamp DESC
             LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(TransactionSummary {
                    tx_type: row.get(0)?,
                    project_id: row.get(1)?,
                    amount: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// User counts per profile role, largest first.
    pub fn users_by_role(&self) -> Result<Vec<CategoryCount>> {
        self.count_grouped("users", "role")
    }

    /// Document count of every collection.
    pub fn collection_counts(&self) -> Result<Vec<CollectionCount>> {
        let conn = self.conn.borrow();
        COLLECTIONS
            .iter()
            .map(|name| {
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |row| {
                        row.get(0)
                    })?;
                Ok(CollectionCount {
                    name: name.to_string(),
                    count,
                })
            })
            .collect()
    }

    fn count_grouped(&self, table: &str, column: &str) -> Result<Vec<CategoryCount>> {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(&format!(
            "SELECT {column}, COUNT(*) AS n FROM {table}
             GROUP BY {column}
             ORDER BY n DESC, {column} ASC"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CategoryCount {
                    key: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        log::info!(
            "[BCR Debug] query: {}.{} counts returned {} groups",
            table,
            column,
            rows.len()
        );
        Ok(rows)
    }
}
