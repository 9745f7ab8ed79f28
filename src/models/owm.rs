//! Response types for the OpenWeatherMap daily forecast endpoint (`/data/2.5/forecast/daily`).
//!
//! Only the fields the sync pipeline consumes are modeled; everything else in the
//! payload (`dt`, `temp.day`, `weather[].icon`, ...) is ignored by serde.
//!
//! Numeric per-day fields default to zero when absent or `null`; a `null` condition
//! list reads as empty. City name and coordinates are required: without them there
//! is no location to attach the forecast to.

use serde::{Deserialize, Deserializer};

/// `null` reads as the type's default, same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecastDocument {
    pub city: City,
    /// One entry per day, ordered from today. Carries no explicit date.
    #[serde(default, deserialize_with = "null_as_default")]
    pub list: Vec<DayEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct City {
    pub name: String,
    pub coord: Coord,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DayEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub temp: Temperature,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pressure: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub humidity: f64,
    /// Wind speed, m/s for metric requests.
    #[serde(default, deserialize_with = "null_as_default")]
    pub speed: f64,
    /// Wind direction, meteorological degrees.
    #[serde(default, deserialize_with = "null_as_default")]
    pub deg: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weather: Vec<Condition>,
}

impl DayEntry {
    /// Primary condition; secondary descriptors ("light rain" + "mist") are dropped.
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.weather.first()
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Deserialize)]
pub struct Temperature {
    #[serde(default, deserialize_with = "null_as_default")]
    pub min: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Condition {
    /// OpenWeatherMap condition code, e.g. 800 for clear sky.
    pub id: i32,
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_numeric_fields_default_to_zero() {
        let json = r#"{
            "city": {"name": "Oslo", "coord": {"lat": 59.9, "lon": 10.7}},
            "list": [{"weather": [{"id": 500, "main": "Rain", "description": "light rain"}]}]
        }"#;
        let doc: ForecastDocument = serde_json::from_str(json).expect("parse");
        let day = &doc.list[0];
        assert_eq!(day.temp, Temperature::default());
        assert_eq!(day.pressure, 0.0);
        assert_eq!(day.deg, 0.0);
        assert_eq!(day.primary_condition().map(|c| c.id), Some(500));
    }

    #[test]
    fn null_fields_read_as_missing() {
        let json = r#"{
            "city": {"name": "Oslo", "coord": {"lat": 59.9, "lon": 10.7}},
            "list": [
                {"temp": {"min": null, "max": 4.5}, "pressure": null, "humidity": null, "speed": null, "deg": null,
                 "weather": [{"id": 600, "main": "Snow", "description": "light snow"}]},
                {"temp": null, "weather": null}
            ]
        }"#;
        let doc: ForecastDocument = serde_json::from_str(json).expect("parse");
        let first = &doc.list[0];
        assert_eq!(first.temp, Temperature { min: 0.0, max: 4.5 });
        assert_eq!((first.pressure, first.humidity, first.speed, first.deg), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(doc.list[1].temp, Temperature::default());
        assert!(doc.list[1].weather.is_empty());
    }

    #[test]
    fn null_list_is_empty() {
        let json = r#"{"city": {"name": "Oslo", "coord": {"lat": 59.9, "lon": 10.7}}, "list": null}"#;
        let doc: ForecastDocument = serde_json::from_str(json).expect("parse");
        assert!(doc.list.is_empty());
    }

    #[test]
    fn missing_city_is_rejected() {
        let json = r#"{"list": []}"#;
        assert!(serde_json::from_str::<ForecastDocument>(json).is_err());
    }

    #[test]
    fn only_first_condition_is_primary() {
        let json = r#"{
            "city": {"name": "London", "coord": {"lat": 51.5, "lon": -0.1}},
            "list": [{"weather": [
                {"id": 500, "main": "Rain", "description": "light rain"},
                {"id": 701, "main": "Mist", "description": "mist"}
            ]}]
        }"#;
        let doc: ForecastDocument = serde_json::from_str(json).expect("parse");
        assert_eq!(doc.list[0].primary_condition().map(|c| c.description.as_str()), Some("light rain"));
    }
}
