//! Upsert of normalized plots into the `plots` table.
//!
//! A batch is a list of insert-or-update operations keyed on `id`. Every row
//! is attempted: one that fails is recorded in the summary and the rest of the
//! batch carries on. The batch runs inside one transaction, and a failing
//! statement only rolls back its own row.
//!
//! `created_at` is set on first insert and never rewritten. `updated_at`
//! moves only when the stored content actually changes, so re-ingesting an
//! identical row counts as matched but not modified.

use crate::error::{Result, StoreError};
use crate::models::{StoredPlot, UpsertSummary, WriteFailure};
use crate::Database;
use bcr_plots::plot::{Location, Measurement, Measurements, PlotRecord};
use bcr_utils::dates::{format_timestamp, parse_stored_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

/// Columns written for each plot, in bind order.
const LEADING_COLUMNS: [&str; 10] = [
    "id",
    "project_type",
    "data_source",
    "monitoring_year",
    "timestamp",
    "gps_lat",
    "gps_long",
    "location_status",
    "location_lon",
    "location_lat",
];

enum Outcome {
    Inserted,
    Matched { modified: bool },
}

impl Database {
    /// Upsert a batch of plots, stamping writes with the current time.
    pub fn upsert_plots(&self, plots: &[PlotRecord]) -> Result<UpsertSummary> {
        self.upsert_plots_at(plots, Utc::now())
    }

    /// Upsert a batch of plots, stamping writes with `now`.
    pub fn upsert_plots_at(
        &self,
        plots: &[PlotRecord],
        now: DateTime<Utc>,
    ) -> Result<UpsertSummary> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        let stamp = format_timestamp(&now);
        let sql = upsert_sql();

        let mut summary = UpsertSummary::default();
        for (index, plot) in plots.iter().enumerate() {
            match upsert_one(&tx, &sql, plot, &stamp) {
                Ok(Outcome::Inserted) => summary.upserted += 1,
                Ok(Outcome::Matched { modified }) => {
                    summary.matched += 1;
                    if modified {
                        summary.modified += 1;
                    }
                }
                Err(e) => {
                    log::warn!(
                        "[BCR Debug] loader: Row {} ({}) failed: {}",
                        index,
                        plot.id,
                        e
                    );
                    summary.failures.push(WriteFailure {
                        index,
                        id: plot.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
        tx.commit()?;

        log::info!(
            "[BCR Debug] loader: Upserted {} plots, matched {}, modified {}, failed {}",
            summary.upserted,
            summary.matched,
            summary.modified,
            summary.failures.len()
        );
        Ok(summary)
    }

    /// Fetch one stored plot by `ID`.
    pub fn get_plot(&self, id: &str) -> Result<Option<StoredPlot>> {
        let conn = self.conn.borrow();
        let sql = format!(
            "SELECT {}, created_at, updated_at FROM plots WHERE id = ?1",
            plot_columns().join(", ")
        );
        let stored = conn
            .query_row(&sql, [id], |row| {
                let record = row_to_plot(row)?;
                let base = LEADING_COLUMNS.len() + Measurement::ALL.len() + 1;
                Ok(StoredPlot {
                    record,
                    created_at: stored_instant(row, base)?,
                    updated_at: stored_instant(row, base + 1)?,
                })
            })
            .optional()?;
        Ok(stored)
    }
}

fn upsert_one(conn: &Connection, sql: &str, plot: &PlotRecord, stamp: &str) -> Result<Outcome> {
    if plot.id.trim().is_empty() {
        return Err(StoreError::InvalidDocument("missing ID".to_string()));
    }

    let existing = read_plot(conn, &plot.id)?;
    let outcome = match &existing {
        None => Outcome::Inserted,
        Some(stored) if stored.same_content(plot) => {
            return Ok(Outcome::Matched { modified: false });
        }
        Some(_) => Outcome::Matched { modified: true },
    };

    let mut values = plot_values(plot)?;
    values.push(Value::Text(stamp.to_string()));
    values.push(Value::Text(stamp.to_string()));
    conn.prepare_cached(sql)?
        .execute(params_from_iter(values))?;
    Ok(outcome)
}

fn read_plot(conn: &Connection, id: &str) -> Result<Option<PlotRecord>> {
    let sql = format!(
        "SELECT {} FROM plots WHERE id = ?1",
        plot_columns().join(", ")
    );
    Ok(conn
        .prepare_cached(&sql)?
        .query_row([id], row_to_plot)
        .optional()?)
}

/// Content columns of `plots`, in the order [`row_to_plot`] reads them.
fn plot_columns() -> Vec<&'static str> {
    LEADING_COLUMNS
        .iter()
        .copied()
        .chain(Measurement::ALL.iter().map(|m| m.column()))
        .chain(std::iter::once("attributes"))
        .collect()
}

fn upsert_sql() -> String {
    let mut columns = plot_columns();
    columns.push("created_at");
    columns.push("updated_at");
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !matches!(**c, "id" | "created_at"))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    format!(
        "INSERT INTO plots ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

fn real(v: f64) -> Value {
    if v.is_nan() {
        Value::Null
    } else {
        Value::Real(v)
    }
}

fn plot_values(plot: &PlotRecord) -> Result<Vec<Value>> {
    let [lon, lat] = plot.coordinates();
    let mut values = vec![
        Value::Text(plot.id.clone()),
        plot.project_type.clone().map_or(Value::Null, Value::Text),
        Value::Text(plot.data_source.clone()),
        plot.monitoring_year
            .map_or(Value::Null, |y| Value::Integer(i64::from(y))),
        plot.timestamp
            .map_or(Value::Null, |ts| Value::Text(format_timestamp(&ts))),
        real(plot.gps_lat),
        real(plot.gps_long),
        Value::Text(plot.location.status().to_string()),
        Value::Real(lon),
        Value::Real(lat),
    ];
    values.extend(plot.measurements.iter().map(|(_, v)| real(v)));
    values.push(Value::Text(serde_json::to_string(&plot.attributes)?));
    Ok(values)
}

fn nan_if_null(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

fn stored_instant(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_stored_timestamp(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn row_to_plot(row: &Row<'_>) -> rusqlite::Result<PlotRecord> {
    let timestamp = match row.get::<_, Option<String>>(4)? {
        Some(_) => Some(stored_instant(row, 4)?),
        None => None,
    };
    let status: String = row.get(7)?;
    let location = match status.as_str() {
        "valid" => Location::Valid {
            longitude: row.get(8)?,
            latitude: row.get(9)?,
        },
        "invalid" => Location::Invalid,
        _ => Location::Absent,
    };

    let mut measurements = Measurements::default();
    for (offset, m) in Measurement::ALL.iter().enumerate() {
        measurements.set(*m, nan_if_null(row, LEADING_COLUMNS.len() + offset)?);
    }

    let attributes_idx = LEADING_COLUMNS.len() + Measurement::ALL.len();
    let attributes_json: String = row.get(attributes_idx)?;
    let attributes: BTreeMap<String, String> = serde_json::from_str(&attributes_json)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(attributes_idx, Type::Text, Box::new(e))
        })?;

    Ok(PlotRecord {
        id: row.get(0)?,
        project_type: row.get(1)?,
        data_source: row.get(2)?,
        monitoring_year: row.get(3)?,
        timestamp,
        gps_lat: nan_if_null(row, 5)?,
        gps_long: nan_if_null(row, 6)?,
        location,
        measurements,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use bcr_plots::normalize::Normalizer;
    use bcr_plots::plot::{Location, Measurement, PlotRecord};
    use bcr_plots::raw::read_plot_rows;
    use bcr_plots::source::{DataSource, FixedSource};
    use chrono::{Duration, TimeZone, Utc};

    const HEADER: &str = "ID,Project_Type,Data_Source,Monitoring_Year,Timestamp,GPS_Lat,GPS_Long,NDVI,Biomass_above_kg,Site_Name";

    fn plots(csv: &str) -> Vec<PlotRecord> {
        let rows = read_plot_rows(csv).unwrap();
        Normalizer::new(FixedSource(DataSource::Sensor))
            .normalize_all(&rows)
            .into_iter()
            .map(|p| p.record)
            .collect()
    }

    fn count(db: &Database) -> i64 {
        db.conn
            .borrow()
            .query_row("SELECT COUNT(*) FROM plots", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn upsert_inserts_new_plots() {
        let db = Database::new().unwrap();
        let csv = format!(
            "{HEADER}
P-001,Mangrove,Drone,2021,2021-05-01 08:00:00,1.236204,90.944851,0.41,120.5,Delta
P-002,Seagrass,,2022,,1.3,90.9,0.22,80,
"
        );
        let summary = db.upsert_plots(&plots(&csv)).unwrap();
        assert_eq!(summary.upserted, 2);
        assert_eq!(summary.matched, 0);
        assert_eq!(summary.modified, 0);
        assert!(summary.failures.is_empty());
        assert_eq!(count(&db), 2);

        let stored = db.get_plot("P-002").unwrap().unwrap();
        assert_eq!(stored.record.data_source, "Sensor");
        assert_eq!(stored.record.monitoring_year, Some(2022));
        assert!(stored.record.timestamp.is_none());
    }

    #[test]
    fn summary_counts_new_and_changed_rows() {
        let db = Database::new().unwrap();
        let first = format!("{HEADER}\nP-003,Mangrove,Manual,2020,,1.2,90.9,0.30,100,\n");
        db.upsert_plots(&plots(&first)).unwrap();

        let second = format!(
            "{HEADER}
P-001,Mangrove,Drone,2021,,1.2,90.9,0.41,120,
P-002,Seagrass,Drone,2021,,1.2,90.9,0.22,80,
P-003,Mangrove,Manual,2020,,1.2,90.9,0.35,100,
"
        );
        let summary = db.upsert_plots(&plots(&second)).unwrap();
        assert_eq!(summary.upserted, 2);
        assert_eq!(summary.modified, 1);
        assert_eq!(summary.matched, 1);
        assert_eq!(count(&db), 3);

        let updated = db.get_plot("P-003").unwrap().unwrap();
        assert_eq!(updated.record.measurements.get(Measurement::Ndvi), 0.35);
    }

    #[test]
    fn identical_reingest_is_matched_not_modified() {
        let db = Database::new().unwrap();
        let csv = format!("{HEADER}\nP-001,Mangrove,Drone,2021,2021-05-01 08:00:00,1.236204,90.944851,0.41,120.5,Delta\n");
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        db.upsert_plots_at(&plots(&csv), t0).unwrap();

        let summary = db
            .upsert_plots_at(&plots(&csv), t0 + Duration::days(1))
            .unwrap();
        assert_eq!((summary.upserted, summary.matched, summary.modified), (0, 1, 0));

        let stored = db.get_plot("P-001").unwrap().unwrap();
        assert_eq!(stored.updated_at, t0);
    }

    #[test]
    fn negative_zero_reingest_is_not_modified() {
        let db = Database::new().unwrap();
        let csv = format!("{HEADER}\nP-001,Mangrove,Drone,2021,,1.2,-0,-0,-0.0,\n");
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = plots(&csv);
        db.upsert_plots_at(&first, t0).unwrap();

        let stored = db.get_plot("P-001").unwrap().unwrap();
        assert_eq!(stored.record.gps_long.to_bits(), first[0].gps_long.to_bits());
        assert_eq!(
            stored.record.measurements.get(Measurement::Ndvi).to_bits(),
            first[0].measurements.get(Measurement::Ndvi).to_bits()
        );

        let summary = db
            .upsert_plots_at(&plots(&csv), t0 + Duration::days(1))
            .unwrap();
        assert_eq!((summary.upserted, summary.matched, summary.modified), (0, 1, 0));
        assert_eq!(db.get_plot("P-001").unwrap().unwrap().updated_at, t0);
    }

    #[test]
    fn created_at_survives_updates() {
        let db = Database::new().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::hours(6);
        let before = format!("{HEADER}\nP-001,Mangrove,Drone,2021,,1.2,90.9,0.41,120,\n");
        let after = format!("{HEADER}\nP-001,Mangrove,Drone,2021,,1.2,90.9,0.50,120,\n");

        db.upsert_plots_at(&plots(&before), t0).unwrap();
        db.upsert_plots_at(&plots(&after), t1).unwrap();

        let stored = db.get_plot("P-001").unwrap().unwrap();
        assert_eq!(stored.created_at, t0);
        assert_eq!(stored.updated_at, t1);
    }

    #[test]
    fn numeric_and_spatial_fields_round_trip_bitwise() {
        let db = Database::new().unwrap();
        let csv = format!("{HEADER}\nP-001,Mangrove,Drone,2021,2021-05-01 08:00:00,1.236204,90.944851,0.41,120.5,Delta\n");
        let input = plots(&csv);
        db.upsert_plots(&input).unwrap();
        db.upsert_plots(&input).unwrap();

        let stored = db.get_plot("P-001").unwrap().unwrap().record;
        assert!(stored.same_content(&input[0]));
        assert_eq!(stored.gps_lat.to_bits(), 1.236204f64.to_bits());
        assert_eq!(
            stored.measurements.get(Measurement::BiomassAbove).to_bits(),
            120.5f64.to_bits()
        );
        assert!(stored.measurements.get(Measurement::SoilPh).is_nan());
        assert_eq!(stored.attributes["Site_Name"], "Delta");
        assert_eq!(stored.coordinates(), [90.944851, 1.236204]);
    }

    #[test]
    fn invalid_location_keeps_zero_coordinates() {
        let db = Database::new().unwrap();
        let csv = format!("{HEADER}\nP-009,Mangrove,Drone,2021,,bad,,0.41,120,\n");
        db.upsert_plots(&plots(&csv)).unwrap();

        let stored = db.get_plot("P-009").unwrap().unwrap().record;
        assert_eq!(stored.location, Location::Invalid);
        assert_eq!(stored.coordinates(), [0.0, 0.0]);
        let (lon, lat): (f64, f64) = db
            .conn
            .borrow()
            .query_row(
                "SELECT location_lon, location_lat FROM plots WHERE id = 'P-009'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!((lon, lat), (0.0, 0.0));
    }

    #[test]
    fn failing_rows_are_counted_and_do_not_abort_the_batch() {
        let db = Database::new().unwrap();
        let csv = format!(
            "{HEADER}
P-001,Mangrove,Drone,2021,,1.2,90.9,0.41,120,
,Mangrove,Drone,2021,,1.2,90.9,0.41,120,
P-002,Seagrass,Drone,2021,,1.2,90.9,0.22,80,
"
        );
        let summary = db.upsert_plots(&plots(&csv)).unwrap();
        assert_eq!(summary.upserted, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].index, 1);
        assert_eq!(summary.failures[0].message, "Invalid document: missing ID");
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(count(&db), 2);
    }

    #[test]
    fn get_plot_missing_is_none() {
        let db = Database::new().unwrap();
        assert!(db.get_plot("nope").unwrap().is_none());
    }
}
