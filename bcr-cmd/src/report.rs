//! The report battery: registry summaries and plot aggregations.
//!
//! Each section runs on its own. A section whose query fails is rendered as
//! an error and the remaining sections still run; the command fails at the
//! end if any section did.

use crate::config::StoreArgs;
use anyhow::bail;
use bcr_db::geo::GeoPoint;
use bcr_db::models::{CategoryCount, TransactionSummary};
use bcr_db::Database;
use bcr_plots::plot::Measurement;
use bcr_utils::numbers::{fixed, NO_DATA};
use clap::Args;
use log::{error, info};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::io::Write;

/// Label for a categorical count whose field is absent.
const UNSPECIFIED: &str = "unspecified";

/// Reference point and limits for the nearby-plots section.
#[derive(Args, Debug, Clone)]
pub struct ProximityArgs {
    /// Longitude of the reference point, in degrees
    #[arg(
        long,
        default_value_t = 90.944851,
        allow_hyphen_values = true,
        value_parser = parse_longitude
    )]
    pub ref_lon: f64,

    /// Latitude of the reference point, in degrees
    #[arg(
        long,
        default_value_t = 1.236204,
        allow_hyphen_values = true,
        value_parser = parse_latitude
    )]
    pub ref_lat: f64,

    /// Search radius in meters
    #[arg(long, default_value_t = 10_000.0, value_parser = parse_radius)]
    pub radius_m: f64,

    /// Maximum number of nearby plots listed
    #[arg(long, default_value_t = 3)]
    pub near_limit: usize,
}

fn parse_bounded(text: &str, what: &str, min: f64, max: f64) -> Result<f64, String> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| format!("{what} must be a number, got `{text}`"))?;
    if !value.is_finite() || value < min || value > max {
        return Err(format!("{what} must be between {min} and {max}, got {value}"));
    }
    Ok(value)
}

fn parse_longitude(text: &str) -> Result<f64, String> {
    parse_bounded(text, "longitude", -180.0, 180.0)
}

fn parse_latitude(text: &str) -> Result<f64, String> {
    parse_bounded(text, "latitude", -90.0, 90.0)
}

fn parse_radius(text: &str) -> Result<f64, String> {
    parse_bounded(text, "radius", 0.0, f64::MAX)
}

impl Default for ProximityArgs {
    fn default() -> Self {
        ProximityArgs {
            ref_lon: 90.944851,
            ref_lat: 1.236204,
            radius_m: 10_000.0,
            near_limit: 3,
        }
    }
}

impl ProximityArgs {
    fn center(&self) -> GeoPoint {
        GeoPoint::new(self.ref_lon, self.ref_lat)
    }
}

/// One report section, rendered both as text lines and as JSON.
#[derive(Debug)]
pub struct Section {
    /// Key of the section in the JSON document.
    pub key: &'static str,
    /// Heading printed above the error when the section fails.
    pub heading: String,
    pub body: Result<SectionBody, String>,
}

#[derive(Debug)]
pub struct SectionBody {
    pub lines: Vec<String>,
    pub json: Value,
}

impl Section {
    fn from_result<T: Serialize>(
        key: &'static str,
        heading: String,
        result: bcr_db::Result<T>,
        render: impl FnOnce(&T) -> Vec<String>,
    ) -> Section {
        let body = result.map_err(|e| e.to_string()).and_then(|value| {
            let json = serde_json::to_value(&value).map_err(|e| e.to_string())?;
            Ok(SectionBody {
                lines: render(&value),
                json,
            })
        });
        if let Err(e) = &body {
            error!("Report section {} failed: {}", key, e);
        }
        Section { key, heading, body }
    }

    /// A heading followed by one indented line per item.
    fn listing<T: Serialize>(
        key: &'static str,
        heading: &str,
        result: bcr_db::Result<Vec<T>>,
        item: impl Fn(&T) -> String,
    ) -> Section {
        let heading = heading.to_string();
        let title = heading.clone();
        Section::from_result(key, heading, result, move |items| {
            std::iter::once(title)
                .chain(items.iter().map(|i| format!("  {}", item(i))))
                .collect()
        })
    }

    /// A single `label: value` line.
    fn scalar<T: Serialize + Display>(
        key: &'static str,
        label: &str,
        result: bcr_db::Result<T>,
    ) -> Section {
        let line_label = label.to_string();
        Section::from_result(key, format!("{label}:"), result, move |value| {
            vec![format!("{line_label}: {value}")]
        })
    }

    fn failed(&self) -> bool {
        self.body.is_err()
    }
}

#[derive(Serialize)]
struct PlotsOverview {
    total_plots: i64,
    by_project_type: Vec<CategoryCount>,
}

fn category(key: &Option<String>) -> &str {
    key.as_deref().unwrap_or(UNSPECIFIED)
}

fn source(data_source: &Option<String>) -> &str {
    data_source.as_deref().unwrap_or(NO_DATA)
}

fn transaction_line(tx: &TransactionSummary) -> String {
    let project = tx.project_id.as_deref().unwrap_or("N/A");
    let amount = tx
        .amount
        .map_or_else(|| "N/A".to_string(), |a| a.to_string());
    format!("{}: {} ({} credits)", tx.tx_type, project, amount)
}

fn overview_section(db: &Database) -> Section {
    let result = db.count_plots().and_then(|total_plots| {
        Ok(PlotsOverview {
            total_plots,
            by_project_type: db.plots_by_project_type()?,
        })
    });
    Section::from_result(
        "overview",
        "Total plots:".to_string(),
        result,
        |overview| {
            let mut lines = vec![
                format!("Total plots: {}", overview.total_plots),
                String::new(),
                "Plots by Project_Type:".to_string(),
            ];
            lines.extend(
                overview
                    .by_project_type
                    .iter()
                    .map(|c| format!("  {}: {}", category(&c.key), c.count)),
            );
            lines
        },
    )
}

fn flux_sections(
    db: &Database,
    metric: Measurement,
    label: &str,
    keys: [&'static str; 2],
) -> [Section; 2] {
    [
        Section::listing(
            keys[0],
            &format!("Average {label} Flux (mg/m2/day) by Monitoring_Year:"),
            db.yearly_average(metric, false),
            |r| format!("Year {}: {} mg/m2/day", r.year, fixed(r.average, 2)),
        ),
        Section::listing(
            keys[1],
            &format!("Average {label} Flux by Year & Data_Source:"),
            db.yearly_average(metric, true),
            |r| {
                format!(
                    "Year {} ({}): {} mg/m2/day",
                    r.year,
                    source(&r.data_source),
                    fixed(r.average, 2)
                )
            },
        ),
    ]
}

/// Run every report section against `db`, in order.
pub fn build_sections(db: &Database, proximity: &ProximityArgs) -> Vec<Section> {
    let mut sections = vec![
        // Registry
        Section::listing(
            "active_projects",
            "Active Projects:",
            db.active_projects(),
            |p| {
                format!(
                    "{}: {} ({} issued, {} retired, {} circulating)",
                    p.project_id, p.name, p.total_issued, p.total_retired, p.circulating
                )
            },
        ),
        Section::scalar(
            "total_credits_issued",
            "Total credits issued",
            db.total_credits_issued(),
        ),
        Section::listing(
            "recent_transactions",
            "Recent Transactions:",
            db.recent_transactions(3),
            transaction_line,
        ),
        Section::listing("users_by_role", "Users by Role:", db.users_by_role(), |r| {
            format!("{}: {} users", category(&r.key), r.count)
        }),
        // Plots
        overview_section(db),
        Section::listing(
            "ndvi_by_project_type",
            "Average NDVI by Project_Type:",
            db.average_by_project_type(Measurement::Ndvi, false),
            |r| format!("{}: {}", r.project_type, fixed(r.average, 2)),
        ),
        Section::listing(
            "ndvi_by_project_type_and_source",
            "Average NDVI by Project_Type & Data_Source:",
            db.average_by_project_type(Measurement::Ndvi, true),
            |r| {
                format!(
                    "{} ({}): {}",
                    r.project_type,
                    source(&r.data_source),
                    fixed(r.average, 2)
                )
            },
        ),
        Section::listing(
            "nearby_plots",
            &format!(
                "Plots near ({}, {}) within {}km:",
                proximity.ref_lon,
                proximity.ref_lat,
                proximity.radius_m / 1000.0
            ),
            db.plots_near(proximity.center(), proximity.radius_m, proximity.near_limit),
            |p| format!("{} at [{}, {}]", p.id, p.gps_lat, p.gps_long),
        ),
        // Trends
        Section::listing(
            "biomass_by_year",
            "Biomass (above + below ground) by Monitoring_Year:",
            db.biomass_by_year(false),
            |r| {
                format!(
                    "Year {}: Above={}kg, Below={}kg, Total={}kg",
                    r.year,
                    fixed(r.avg_above, 1),
                    fixed(r.avg_below, 1),
                    fixed(r.total_sum, 1)
                )
            },
        ),
        Section::listing(
            "biomass_by_year_and_source",
            "Biomass by Monitoring_Year & Data_Source:",
            db.biomass_by_year(true),
            |r| {
                format!(
                    "Year {} ({}): Above={}kg, Below={}kg",
                    r.year,
                    source(&r.data_source),
                    fixed(r.avg_above, 1),
                    fixed(r.avg_below, 1)
                )
            },
        ),
    ];
    sections.extend(flux_sections(
        db,
        Measurement::Co2Flux,
        "CO2",
        ["co2_flux_by_year", "co2_flux_by_year_and_source"],
    ));
    sections.extend(flux_sections(
        db,
        Measurement::Ch4Flux,
        "CH4",
        ["ch4_flux_by_year", "ch4_flux_by_year_and_source"],
    ));
    sections.push(Section::listing(
        "ndvi_monthly",
        "NDVI monthly average trend:",
        db.monthly_average(Measurement::Ndvi, false),
        |r| format!("{}-{}: NDVI={}", r.year, r.month, fixed(r.average, 2)),
    ));
    sections.push(Section::listing(
        "ndvi_monthly_by_source",
        "NDVI monthly trend by Data_Source:",
        db.monthly_average(Measurement::Ndvi, true),
        |r| {
            format!(
                "{}-{} ({}): NDVI={}",
                r.year,
                r.month,
                source(&r.data_source),
                fixed(r.average, 2)
            )
        },
    ));
    sections
}

/// Write sections as text, separated by blank lines.
pub fn write_text(sections: &[Section], out: &mut impl Write) -> std::io::Result<()> {
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        match &section.body {
            Ok(body) => {
                for line in &body.lines {
                    writeln!(out, "{line}")?;
                }
            }
            Err(message) => {
                writeln!(out, "{}", section.heading)?;
                writeln!(out, "  error: {message}")?;
            }
        }
    }
    Ok(())
}

/// Collect sections into one JSON object keyed by section, with failed
/// sections listed under `errors`.
pub fn to_json(sections: &[Section]) -> Value {
    let mut document = Map::new();
    let mut errors = Map::new();
    for section in sections {
        match &section.body {
            Ok(body) => {
                document.insert(section.key.to_string(), body.json.clone());
            }
            Err(message) => {
                errors.insert(section.key.to_string(), Value::String(message.clone()));
            }
        }
    }
    if !errors.is_empty() {
        document.insert("errors".to_string(), Value::Object(errors));
    }
    Value::Object(document)
}

/// Run the `report` command against the configured store.
pub async fn run_report(
    store: &StoreArgs,
    proximity: &ProximityArgs,
    json: bool,
) -> anyhow::Result<()> {
    let db = store.open()?;
    if let Err(e) = db.prepare_spatial_index() {
        error!("Failed to prepare spatial index: {}", e);
    }

    let sections = build_sections(&db, proximity);
    {
        let mut out = std::io::stdout().lock();
        if json {
            serde_json::to_writer_pretty(&mut out, &to_json(&sections))?;
            writeln!(out)?;
        } else {
            write_text(&sections, &mut out)?;
        }
    }
    db.close()?;

    let failed = sections.iter().filter(|s| s.failed()).count();
    if failed > 0 {
        bail!("{} of {} report sections failed", failed, sections.len());
    }
    info!("Report complete: {} sections", sections.len());
    Ok(())
}
