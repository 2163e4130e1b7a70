//! SQLite store for blue carbon plot data.
//!
//! This crate persists normalized [`bcr_plots::plot::PlotRecord`]s and runs
//! the aggregation reports over them and over the registry collections
//! (projects, transactions, users).
//!
//! # Architecture
//!
//! - `Rc<RefCell<Connection>>` wrapper; a store is used by one batch job at a time
//! - SQLite via `rusqlite` (bundled), either on disk or in memory
//! - Upserts keyed on the `plots.id` primary key ([`loader`])
//! - Typed report queries returning serializable structs ([`models`])
//!
//! # Usage
//!
//! ```rust
//! use bcr_db::Database;
//! use bcr_plots::normalize::Normalizer;
//! use bcr_plots::raw::read_plot_rows;
//! use bcr_plots::source::{DataSource, FixedSource};
//!
//! let db = Database::new().unwrap();
//! let rows = read_plot_rows("ID,Project_Type,NDVI\nP-1,Mangrove,0.4\n").unwrap();
//! let mut normalizer = Normalizer::new(FixedSource(DataSource::Sensor));
//! let plots: Vec<_> = normalizer.normalize_all(&rows).into_iter().map(|p| p.record).collect();
//!
//! let summary = db.upsert_plots(&plots).unwrap();
//! assert_eq!(summary.upserted, 1);
//! assert_eq!(db.count_plots().unwrap(), 1);
//! ```
//!
//! # Tables
//!
//! See [`schema::create_schema`] for the full SQL schema.

pub mod error;
pub mod geo;
mod loader;
pub mod models;
mod queries;
pub mod schema;

pub use error::{Result, StoreError};
pub use queries::{Dimension, Reduction};

use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Handle to the plot store.
///
/// Cheaply cloneable (via `Rc`); clones share one connection.
#[derive(Clone, Debug)]
pub struct Database {
    conn: Rc<RefCell<Connection>>,
}

impl Database {
    /// Create a new in-memory database with the full schema applied.
    pub fn new() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Connect {
            path: ":memory:".to_string(),
            source,
        })?;
        Self::with_schema(conn, ":memory:")
    }

    /// Open (creating if needed) the database file at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let conn = Connection::open(path).map_err(|source| StoreError::Connect {
            path: display.clone(),
            source,
        })?;
        Self::with_schema(conn, &display)
    }

    fn with_schema(conn: Connection, path: &str) -> Result<Self> {
        conn.execute_batch(schema::create_schema())
            .map_err(|source| StoreError::Connect {
                path: path.to_string(),
                source,
            })?;
        log::info!("[BCR Debug] db: Opened store at {}", path);
        Ok(Self {
            conn: Rc::new(RefCell::new(conn)),
        })
    }

    /// Create the index proximity queries depend on. Safe to call repeatedly.
    pub fn prepare_spatial_index(&self) -> Result<()> {
        self.conn
            .borrow()
            .execute_batch(schema::create_spatial_index())?;
        log::info!("[BCR Debug] db: Spatial index {} ready", schema::SPATIAL_INDEX);
        Ok(())
    }

    /// Close the connection, reporting any error SQLite raises while doing so.
    ///
    /// If other clones of this handle are still alive the connection stays
    /// open until the last one is dropped.
    pub fn close(self) -> Result<()> {
        match Rc::try_unwrap(self.conn) {
            Ok(cell) => cell
                .into_inner()
                .close()
                .map_err(|(_, e)| StoreError::Sqlite(e)),
            Err(_) => Ok(()),
        }
    }
}
