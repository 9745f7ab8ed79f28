//! Turns a raw forecast document into dated per-day records.
//!
//! The API's `list` carries no usable dates: the entry at index `i` is the
//! forecast for `today + i` days, where `today` is captured once per run.

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::db::models::NewDailyForecast;
use crate::models::owm::ForecastDocument;

/// Days requested from the API and the most the parser will consume.
pub const FORECAST_DAYS: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct DayForecast {
    pub date: NaiveDate,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_degrees: f64,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub short_desc: String,
    pub condition_code: i32,
}

impl DayForecast {
    pub fn into_row(self, location_id: i64, updated_at: NaiveDateTime) -> NewDailyForecast {
        NewDailyForecast {
            location_id,
            date: self.date,
            humidity: self.humidity,
            pressure: self.pressure,
            wind_speed: self.wind_speed,
            wind_degrees: self.wind_degrees,
            max_temp_c: self.max_temp_c,
            min_temp_c: self.min_temp_c,
            short_desc: self.short_desc,
            condition_code: self.condition_code,
            updated_at,
        }
    }
}

/// Entries without any weather condition are skipped but still consume their day offset.
pub fn to_daily_records(doc: &ForecastDocument, today: NaiveDate) -> Vec<DayForecast> {
    doc.list
        .iter()
        .take(FORECAST_DAYS)
        .enumerate()
        .filter_map(|(offset, entry)| {
            let condition = entry.primary_condition()?;
            let date = today.checked_add_days(Days::new(offset as u64))?;
            Some(DayForecast {
                date,
                humidity: entry.humidity,
                pressure: entry.pressure,
                wind_speed: entry.speed,
                wind_degrees: entry.deg,
                max_temp_c: entry.temp.max,
                min_temp_c: entry.temp.min,
                short_desc: condition.description.clone(),
                condition_code: condition.id,
            })
        })
        .collect()
}
