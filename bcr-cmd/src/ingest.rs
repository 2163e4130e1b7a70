//! Plot ingestion: read a CSV file, normalize it, upsert every row.

use crate::config::StoreArgs;
use anyhow::Context;
use bcr_db::models::UpsertSummary;
use bcr_db::Database;
use bcr_plots::normalize::Normalizer;
use bcr_plots::raw::read_plot_rows;
use bcr_plots::source::{RandomSource, SourcePolicy};
use log::{info, warn};
use std::io::Write;
use std::path::Path;

/// Run the `upsert-plots` command against the configured store.
///
/// Rows that fail to write are reported and counted but do not fail the
/// command; failing to reach the store or read the input does.
pub async fn run_upsert_plots(store: &StoreArgs, input: &Path) -> anyhow::Result<()> {
    let db = store.open()?;
    let csv_data = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read plot CSV {}", input.display()))?;

    let mut out = std::io::stdout().lock();
    let summary = ingest_csv(&db, &csv_data, RandomSource::new(), &mut out)?;
    db.close()?;

    if !summary.failures.is_empty() {
        warn!(
            "{} of {} rows were not written",
            summary.failures.len(),
            summary.failures.len() + summary.succeeded()
        );
    }
    info!("Upsert complete. Input: {}", input.display());
    Ok(())
}

/// Normalize `csv_data` with `policy`, upsert the rows into `db`, and write
/// the per-row diagnostics and the batch summary to `out`.
pub fn ingest_csv<P: SourcePolicy>(
    db: &Database,
    csv_data: &str,
    policy: P,
    out: &mut impl Write,
) -> anyhow::Result<UpsertSummary> {
    let rows = read_plot_rows(csv_data).context("Failed to parse plot CSV")?;
    writeln!(out, "Loaded {} rows from CSV", rows.len())?;

    let normalized = Normalizer::new(policy).normalize_all(&rows);
    for plot in &normalized {
        writeln!(out, "{}", plot.diagnostic())?;
    }

    let records: Vec<_> = normalized.into_iter().map(|p| p.record).collect();
    let summary = db.upsert_plots(&records)?;

    writeln!(
        out,
        "Upsert complete: {{ upserted: {}, modified: {}, matched: {} }}",
        summary.upserted, summary.modified, summary.matched
    )?;
    for failure in &summary.failures {
        writeln!(
            out,
            "Upsert failed for row {} ({}): {}",
            failure.index, failure.id, failure.message
        )?;
    }
    Ok(summary)
}
