use crate::db::models::{Location, NewLocation};
use crate::schema;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::{debug, info};

pub fn find_by_query(conn: &mut SqliteConnection, query_key: &str) -> Result<Option<Location>, String> {
    use schema::locations::dsl as L;

    L::locations
        .filter(L::query_key.eq(query_key))
        .select(Location::as_select())
        .first(conn)
        .optional()
        .map_err(|e| format!("fetch location failed: {}", e))
}

/// Map a location query to its row id, creating the row on first use.
///
/// Existing rows are returned untouched (first write wins).
pub fn resolve(
    conn: &mut SqliteConnection,
    query_key: &str,
    city_name: &str,
    latitude: f64,
    longitude: f64,
) -> Result<i64, String> {
    if let Some(existing) = find_by_query(conn, query_key)? {
        debug!("Location '{}' already known as id {}", query_key, existing.id);
        return Ok(existing.id);
    }

    let new_row = NewLocation {
        query_key,
        city_name,
        latitude,
        longitude,
    };
    insert_or_get(conn, &new_row).map(|row| row.id)
}

/// Insert `new_row` unless its `query_key` exists, then read the stored row back.
///
/// A row written by another connection between our lookup and this insert wins
/// the unique `query_key` constraint; its values are returned unchanged.
pub fn insert_or_get(conn: &mut SqliteConnection, new_row: &NewLocation<'_>) -> Result<Location, String> {
    use schema::locations::dsl as L;

    let inserted = diesel::insert_into(L::locations)
        .values(new_row)
        .on_conflict(L::query_key)
        .do_nothing()
        .execute(conn)
        .map_err(|e| format!("insert location failed: {}", e))?;

    let row = find_by_query(conn, new_row.query_key)?
        .ok_or_else(|| format!("location '{}' missing after insert", new_row.query_key))?;
    if inserted == 0 {
        debug!("Location '{}' was created concurrently; using id {}", new_row.query_key, row.id);
    } else {
        info!("Created location '{}' ({}) with id {}", new_row.query_key, new_row.city_name, row.id);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::{apply_database_migrations, establish, in_memory};
    use diesel::dsl::count_star;

    fn location_rows(conn: &mut SqliteConnection) -> i64 {
        schema::locations::table.select(count_star()).first(conn).unwrap()
    }

    #[test]
    fn resolving_twice_returns_same_id() {
        let mut conn = in_memory();
        let first = resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();
        let second = resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();
        assert_eq!(first, second);
        assert_eq!(location_rows(&mut conn), 1);
    }

    #[test]
    fn existing_location_is_not_refreshed() {
        let mut conn = in_memory();
        let id = resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();
        let again = resolve(&mut conn, "94043", "Renamed", 0.0, 0.0).unwrap();
        assert_eq!(id, again);

        let row = find_by_query(&mut conn, "94043").unwrap().unwrap();
        assert_eq!(row.city_name, "Mountain View");
        assert_eq!(row.latitude, 37.4);
    }

    #[test]
    fn distinct_queries_get_distinct_rows() {
        let mut conn = in_memory();
        let a = resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();
        let b = resolve(&mut conn, "London,uk", "London", 51.5, -0.1).unwrap();
        assert_ne!(a, b);
        assert_eq!(location_rows(&mut conn), 2);
    }

    #[test]
    fn unique_constraint_rejects_duplicate_query_key() {
        let mut conn = in_memory();
        resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();

        let dup = NewLocation {
            query_key: "94043",
            city_name: "Elsewhere",
            latitude: 0.0,
            longitude: 0.0,
        };
        let result = diesel::insert_into(schema::locations::table).values(&dup).execute(&mut conn);
        assert!(result.is_err());
        assert_eq!(location_rows(&mut conn), 1);
    }

    #[test]
    fn insert_after_concurrent_writer_returns_existing_row() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("forecast.sqlite3");
        let url = url.to_str().unwrap();
        let mut ours = establish(url).unwrap();
        apply_database_migrations(&mut ours).unwrap();
        let mut theirs = establish(url).unwrap();

        // Both looked the key up and found nothing; the other connection inserts first.
        assert!(find_by_query(&mut ours, "94043").unwrap().is_none());
        let winner = resolve(&mut theirs, "94043", "Mountain View", 37.4, -122.1).unwrap();

        let late = NewLocation {
            query_key: "94043",
            city_name: "Mountain View, CA",
            latitude: 37.39,
            longitude: -122.08,
        };
        let row = insert_or_get(&mut ours, &late).unwrap();
        assert_eq!(row.id, winner);
        assert_eq!(row.city_name, "Mountain View");
        assert_eq!((row.latitude, row.longitude), (37.4, -122.1));
        assert_eq!(location_rows(&mut ours), 1);
    }

    #[test]
    fn unknown_query_is_none() {
        let mut conn = in_memory();
        assert!(find_by_query(&mut conn, "nowhere").unwrap().is_none());
    }
}
