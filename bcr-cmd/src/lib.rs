//! Command implementations for BCR CLI.
//!
//! Provides subcommands for loading plot CSV files into the store and for
//! running the aggregation reports over it.

use clap::Subcommand;
use std::path::PathBuf;

pub mod collections;
pub mod config;
pub mod ingest;
pub mod report;

pub use config::StoreArgs;
pub use report::ProximityArgs;

#[derive(Subcommand)]
pub enum Command {
    /// Normalize a plot CSV file and upsert every row into the store
    UpsertPlots {
        #[command(flatten)]
        store: StoreArgs,

        /// Path to the plot CSV file (header row required)
        #[arg(short = 'i', long, default_value = "./plots.csv")]
        input: PathBuf,
    },

    /// Run the full battery of plot and registry reports
    Report {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        proximity: ProximityArgs,

        /// Emit every report as one JSON document instead of text
        #[arg(long)]
        json: bool,
    },

    /// List every collection with its document count
    Collections {
        #[command(flatten)]
        store: StoreArgs,
    },
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::UpsertPlots { store, input } => ingest::run_upsert_plots(&store, &input).await,
        Command::Report {
            store,
            proximity,
            json,
        } => report::run_report(&store, &proximity, json).await,
        Command::Collections { store } => collections::run_collections(&store).await,
    }
}
