//! Store configuration taken from the command line or the environment.

use anyhow::{bail, Context};
use bcr_db::Database;
use clap::Args;
use std::path::{Path, PathBuf};

/// Environment variable naming the store location.
pub const STORE_URI_VAR: &str = "BLUECARBON_STORE_URI";
/// Environment variable naming the database within the store.
pub const DB_NAME_VAR: &str = "BLUECARBON_DB";
/// Store location that keeps everything in memory.
pub const MEMORY_URI: &str = ":memory:";

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Directory holding the database file, or `:memory:`
    #[arg(long, env = STORE_URI_VAR)]
    pub store_uri: Option<String>,

    /// Database name; the file is `<store-uri>/<db>.sqlite3`
    #[arg(long = "db", env = DB_NAME_VAR, default_value = "bluecarbon")]
    pub db_name: String,
}

/// Where the store lives once configuration is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl StoreArgs {
    /// Resolve the configured location, failing if no store was named.
    pub fn location(&self) -> anyhow::Result<StoreLocation> {
        let uri = match self.store_uri.as_deref().map(str::trim) {
            Some(uri) if !uri.is_empty() => uri,
            _ => bail!(
                "{} is not set; point it at the store directory (or {})",
                STORE_URI_VAR,
                MEMORY_URI
            ),
        };
        if uri == MEMORY_URI {
            return Ok(StoreLocation::Memory);
        }

        let name = self.db_name.trim();
        if name.is_empty() {
            bail!("{} must not be blank", DB_NAME_VAR);
        }
        Ok(StoreLocation::File(
            Path::new(uri).join(format!("{name}.sqlite3")),
        ))
    }

    /// Open the configured store with its schema applied.
    pub fn open(&self) -> anyhow::Result<Database> {
        match self.location()? {
            StoreLocation::Memory => Ok(Database::new()?),
            StoreLocation::File(path) => Database::open(&path)
                .with_context(|| format!("Failed to connect to store {}", path.display())),
        }
    }
}
