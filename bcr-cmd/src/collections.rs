//! Collection listing, doubling as a store connectivity check.

use crate::config::StoreArgs;
use bcr_db::Database;
use std::io::Write;

/// Run the `collections` command against the configured store.
pub async fn run_collections(store: &StoreArgs) -> anyhow::Result<()> {
    let db = store.open()?;
    {
        let mut out = std::io::stdout().lock();
        write_collections(&db, &mut out)?;
    }
    db.close()?;
    Ok(())
}

/// Write one `name: count documents` line per collection.
pub fn write_collections(db: &Database, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "Collections:")?;
    for collection in db.collection_counts()? {
        writeln!(out, "  {}: {} documents", collection.name, collection.count)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_csv;
    use bcr_plots::source::{DataSource, FixedSource};

    #[test]
    fn lists_every_collection() {
        let db = Database::new().unwrap();
        let mut sink = Vec::new();
        ingest_csv(
            &db,
            "ID,NDVI\nP-1,0.4\nP-2,0.5\n",
            FixedSource(DataSource::Drone),
            &mut sink,
        )
        .unwrap();

        let mut out = Vec::new();
        write_collections(&db, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Collections:\n  plots: 2 documents\n  projects: 0 documents\n  transactions: 0 documents\n  users: 0 documents\n"
        );
    }

    #[tokio::test]
    async fn collections_command_on_memory_store() {
        let store = StoreArgs {
            store_uri: Some(":memory:".to_string()),
            db_name: "bluecarbon".to_string(),
        };
        run_collections(&store).await.unwrap();
    }
}
