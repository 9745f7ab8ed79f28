//! Diesel model structs for locations, per-day forecasts and notification bookkeeping.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::locations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Location {
    pub id: i64,
    /// The string sent as `q` to the weather API; unique per row.
    pub query_key: String,
    pub city_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::locations)]
pub struct NewLocation<'a> {
    pub query_key: &'a str,
    pub city_name: &'a str,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::daily_forecasts)]
#[diesel(belongs_to(Location))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DailyForecast {
    pub id: i64,
    pub location_id: i64,
    pub date: NaiveDate,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_degrees: f64,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub short_desc: String,
    pub condition_code: i32,
    pub updated_at: NaiveDateTime,
}

/// Row written by a sync run. Doubles as the changeset when `(location_id, date)` already exists.
#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = schema::daily_forecasts)]
pub struct NewDailyForecast {
    pub location_id: i64,
    pub date: NaiveDate,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_degrees: f64,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub short_desc: String,
    pub condition_code: i32,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::notification_state)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NotificationState {
    pub last_notified_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::notification_state)]
pub struct NewNotificationState {
    pub id: i64,
    pub last_notified_at: NaiveDateTime,
}

/// Key of the only `notification_state` row.
pub const NOTIFICATION_STATE_ROW: i64 = 1;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::sync_lease)]
pub struct NewSyncLease {
    pub id: i64,
    pub token: i64,
    pub acquired_at: NaiveDateTime,
}

/// Key of the only `sync_lease` row.
pub const SYNC_LEASE_ROW: i64 = 1;
