use crate::db::models::{DailyForecast, NewDailyForecast};
use crate::schema;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::debug;

/// Insert or replace one row per `(location_id, date)`; the batch runs in a single transaction.
///
/// Returns the number of affected rows, at most `rows.len()`.
pub fn upsert_daily_forecasts(conn: &mut SqliteConnection, rows: &[NewDailyForecast]) -> Result<usize, String> {
    if rows.is_empty() {
        return Ok(0);
    }

    use schema::daily_forecasts::dsl as D;

    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        let mut affected = 0;
        for row in rows {
            affected += diesel::insert_into(D::daily_forecasts)
                .values(row)
                .on_conflict((D::location_id, D::date))
                .do_update()
                .set(row)
                .execute(conn)?;
        }
        Ok(affected)
    })
    .map(|count| {
        debug!("Upserted {} forecast row(s)", count);
        count
    })
    .map_err(|e| format!("upsert forecast rows failed: {}", e))
}

pub fn latest_for_date(
    conn: &mut SqliteConnection,
    location_id: i64,
    date: NaiveDate,
) -> Result<Option<DailyForecast>, String> {
    use schema::daily_forecasts::dsl as D;

    D::daily_forecasts
        .filter(D::location_id.eq(location_id).and(D::date.eq(date)))
        .order(D::updated_at.desc())
        .select(DailyForecast::as_select())
        .first(conn)
        .optional()
        .map_err(|e| format!("fetch forecast for {} failed: {}", date, e))
}

/// Same as [`latest_for_date`], addressed by the location's query key.
pub fn latest_for_query_and_date(
    conn: &mut SqliteConnection,
    query_key: &str,
    date: NaiveDate,
) -> Result<Option<DailyForecast>, String> {
    use schema::daily_forecasts::dsl as D;
    use schema::locations::dsl as L;

    D::daily_forecasts
        .inner_join(L::locations)
        .filter(L::query_key.eq(query_key).and(D::date.eq(date)))
        .order(D::updated_at.desc())
        .select(DailyForecast::as_select())
        .first(conn)
        .optional()
        .map_err(|e| format!("fetch forecast for '{}' on {} failed: {}", query_key, date, e))
}

/// Stored days for a location starting at `from`, oldest first.
pub fn forecasts_from(
    conn: &mut SqliteConnection,
    location_id: i64,
    from: NaiveDate,
) -> Result<Vec<DailyForecast>, String> {
    use schema::daily_forecasts::dsl as D;

    D::daily_forecasts
        .filter(D::location_id.eq(location_id).and(D::date.ge(from)))
        .order(D::date.asc())
        .select(DailyForecast::as_select())
        .load(conn)
        .map_err(|e| format!("fetch forecasts failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::in_memory;
    use crate::services::locations::resolve;
    use chrono::NaiveDateTime;
    use diesel::dsl::count_star;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn stamp(h: u32) -> NaiveDateTime {
        date(1).and_hms_opt(h, 0, 0).unwrap()
    }

    fn row(location_id: i64, day: u32, max: f64, desc: &str) -> NewDailyForecast {
        NewDailyForecast {
            location_id,
            date: date(day),
            humidity: 50.0,
            pressure: 1012.0,
            wind_speed: 3.0,
            wind_degrees: 200.0,
            max_temp_c: max,
            min_temp_c: max - 8.0,
            short_desc: desc.into(),
            condition_code: 800,
            updated_at: stamp(8),
        }
    }

    fn forecast_rows(conn: &mut SqliteConnection) -> i64 {
        schema::daily_forecasts::table.select(count_star()).first(conn).unwrap()
    }

    #[test]
    fn empty_batch_is_noop() {
        let mut conn = in_memory();
        assert_eq!(upsert_daily_forecasts(&mut conn, &[]).unwrap(), 0);
    }

    #[test]
    fn replaces_rows_for_same_location_and_date() {
        let mut conn = in_memory();
        let loc = resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();

        let first = vec![row(loc, 1, 18.0, "clear sky"), row(loc, 2, 15.0, "light rain")];
        assert_eq!(upsert_daily_forecasts(&mut conn, &first).unwrap(), 2);

        let mut updated = row(loc, 1, 21.0, "few clouds");
        updated.updated_at = stamp(9);
        assert_eq!(upsert_daily_forecasts(&mut conn, &[updated]).unwrap(), 1);

        assert_eq!(forecast_rows(&mut conn), 2);
        let today = latest_for_date(&mut conn, loc, date(1)).unwrap().unwrap();
        assert_eq!(today.max_temp_c, 21.0);
        assert_eq!(today.short_desc, "few clouds");
        assert_eq!(today.updated_at, stamp(9));
    }

    #[test]
    fn same_date_for_other_location_is_separate() {
        let mut conn = in_memory();
        let a = resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();
        let b = resolve(&mut conn, "London,uk", "London", 51.5, -0.1).unwrap();
        upsert_daily_forecasts(&mut conn, &[row(a, 1, 18.0, "clear sky"), row(b, 1, 7.0, "drizzle")]).unwrap();

        assert_eq!(forecast_rows(&mut conn), 2);
        let london = latest_for_query_and_date(&mut conn, "London,uk", date(1)).unwrap().unwrap();
        assert_eq!(london.location_id, b);
        assert_eq!(london.short_desc, "drizzle");
    }

    #[test]
    fn failing_batch_leaves_store_unchanged() {
        let mut conn = in_memory();
        let loc = resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();
        // unknown location id violates the foreign key
        let batch = vec![row(loc, 1, 18.0, "clear sky"), row(loc + 100, 2, 15.0, "light rain")];
        assert!(upsert_daily_forecasts(&mut conn, &batch).is_err());
        assert_eq!(forecast_rows(&mut conn), 0);
    }

    #[test]
    fn missing_day_is_none() {
        let mut conn = in_memory();
        let loc = resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();
        upsert_daily_forecasts(&mut conn, &[row(loc, 2, 15.0, "light rain")]).unwrap();
        assert!(latest_for_date(&mut conn, loc, date(1)).unwrap().is_none());
        assert!(latest_for_query_and_date(&mut conn, "unknown", date(2)).unwrap().is_none());
    }

    #[test]
    fn lists_days_from_start_in_order() {
        let mut conn = in_memory();
        let loc = resolve(&mut conn, "94043", "Mountain View", 37.4, -122.1).unwrap();
        let batch = vec![
            row(loc, 3, 14.0, "broken clouds"),
            row(loc, 1, 18.0, "clear sky"),
            row(loc, 2, 15.0, "light rain"),
        ];
        upsert_daily_forecasts(&mut conn, &batch).unwrap();

        let days: Vec<_> = forecasts_from(&mut conn, loc, date(2)).unwrap().into_iter().map(|f| f.date).collect();
        assert_eq!(days, vec![date(2), date(3)]);
    }
}
