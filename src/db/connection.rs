use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::info;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Open the SQLite database at `url` (a file path or `:memory:`) with foreign keys enforced.
pub fn establish(url: &str) -> Result<SqliteConnection, String> {
    let mut conn = SqliteConnection::establish(url).map_err(|e| format!("DB connection failed: {}", e))?;
    conn.batch_execute(&format!(
        "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
        BUSY_TIMEOUT_MS
    ))
    .map_err(|e| format!("configuring connection failed: {}", e))?;
    Ok(conn)
}

pub fn apply_database_migrations(conn: &mut SqliteConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

#[cfg(test)]
pub fn in_memory() -> SqliteConnection {
    let mut conn = establish(":memory:").expect("open in-memory sqlite");
    apply_database_migrations(&mut conn).expect("migrations apply cleanly");
    conn
}
