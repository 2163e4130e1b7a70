//! SQL schema definitions for the plot store.
//!
//! Contains CREATE TABLE statements for the plot collection and the registry
//! collections (projects, transactions, users) that the reports read from.
//! The schema is applied as a single batch when the database is opened.

/// Name of the index backing proximity queries over plot locations.
pub const SPATIAL_INDEX: &str = "idx_plots_location";

/// Collections that may be listed and counted.
pub const COLLECTIONS: [&str; 4] = ["plots", "projects", "transactions", "users"];

/// Returns the full SQL schema as a single batch string.
///
/// **Plot table:**
/// - `plots` - one normalized plot per `id`; the primary key is the unique
///   constraint the upsert relies on. Measurement columns hold NULL where the
///   source value was not numeric. `location_lon`/`location_lat` always hold a
///   coordinate pair (0 for an unusable axis); `location_status` says whether
///   that pair is a real position.
///
/// **Registry tables** (written by the registry API, read-only here):
/// - `projects` - credit projects with issued/retired/circulating balances
/// - `transactions` - registry transactions
/// - `users` - registry users and their roles
pub fn create_schema() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS plots (
        id TEXT PRIMARY KEY NOT NULL,
        project_type TEXT,
        data_source TEXT NOT NULL,
        monitoring_year INTEGER,
        timestamp TEXT,
        gps_lat REAL,
        gps_long REAL,
        location_status TEXT NOT NULL
            CHECK (location_status IN ('valid', 'invalid', 'absent')),
        location_lon REAL NOT NULL,
        location_lat REAL NOT NULL,
        tree_height_m REAL,
        dbh_cm REAL,
        biomass_above_kg REAL,
        biomass_below_kg REAL,
        soil_organic_carbon_g_per_kg REAL,
        soil_salinity_psu REAL,
        soil_moisture_percent REAL,
        soil_ph REAL,
        water_salinity_psu REAL,
        water_temperature_c REAL,
        co2_flux_mg_m2_day REAL,
        ch4_flux_mg_m2_day REAL,
        ndvi REAL,
        canopy_cover_percent REAL,
        plot_area_ha REAL,
        soil_bulk_density_g_cm3 REAL,
        soil_depth_cm REAL,
        attributes TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_plots_project_type ON plots(project_type);
    CREATE INDEX IF NOT EXISTS idx_plots_year ON plots(monitoring_year);

    CREATE TABLE IF NOT EXISTS projects (
        project_id TEXT PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        project_type TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        total_issued INTEGER NOT NULL DEFAULT 0,
        total_retired INTEGER NOT NULL DEFAULT 0,
        circulating INTEGER NOT NULL DEFAULT 0,
        created_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);

    CREATE TABLE IF NOT EXISTS transactions (
        tx_hash TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        project_id TEXT,
        amount INTEGER,
        status TEXT,
        timestamp TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_timestamp ON transactions(timestamp);

    CREATE TABLE IF NOT EXISTS users (
        user_id TEXT PRIMARY KEY,
        wallet_address TEXT,
        email TEXT,
        name TEXT,
        role TEXT
    );
    "#
}

/// Index over valid plot positions, used to prefilter proximity queries
/// with a bounding box. Creating it again is a no-op.
pub fn create_spatial_index() -> &'static str {
    r#"
    CREATE INDEX IF NOT EXISTS idx_plots_location
        ON plots(location_lat, location_lon)
        WHERE location_status = 'valid';
    "#
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcr_plots::plot::Measurement;
    use rusqlite::Connection;

    fn object_exists(conn: &Connection, kind: &str, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                [kind, name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn schema_is_valid_sql() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema())
            .expect("Schema SQL should be valid");
    }

    #[test]
    fn schema_creates_all_collections() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        for table in &COLLECTIONS {
            assert!(object_exists(&conn, "table", table), "Table '{}' should exist", table);
        }
    }

    #[test]
    fn plots_table_has_every_measurement_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('plots')").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        for m in Measurement::ALL {
            assert!(
                columns.iter().any(|c| c == m.column()),
                "Column '{}' should exist",
                m.column()
            );
        }
    }

    #[test]
    fn spatial_index_is_separate_and_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        assert!(!object_exists(&conn, "index", SPATIAL_INDEX));

        conn.execute_batch(create_spatial_index()).unwrap();
        conn.execute_batch(create_spatial_index())
            .expect("Creating the spatial index twice should succeed");
        assert!(object_exists(&conn, "index", SPATIAL_INDEX));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        conn.execute_batch(create_schema())
            .expect("Applying schema twice should succeed due to IF NOT EXISTS");
    }

    #[test]
    fn plot_id_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        let insert = "INSERT INTO plots (id, data_source, location_status, location_lon,
                      location_lat, created_at, updated_at)
                      VALUES ('P-1', 'Sensor', 'absent', 0, 0, 'x', 'x')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err(), "Duplicate id should be rejected");
    }
}
