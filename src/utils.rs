use chrono::{Datelike, NaiveDate};
use core::fmt;
use std::str::FromStr;

/// Unit system used when rendering temperatures. Stored values are always Celsius.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            other => Err(format!("unknown unit system '{}', expected metric or imperial", other)),
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::Metric => write!(f, "metric"),
            Units::Imperial => write!(f, "imperial"),
        }
    }
}

pub fn format_temperature(celsius: f64, units: Units) -> String {
    let value = match units {
        Units::Metric => celsius,
        Units::Imperial => celsius * 9.0 / 5.0 + 32.0,
    };
    format!("{:.0}\u{00B0}", value)
}

/// Human-friendly label for a forecast day relative to `today`.
///
/// - today: "Today, January 1"
/// - tomorrow: "Tomorrow"
/// - rest of the coming week: weekday name
/// - anything else: "Mon Jan 08"
pub fn friendly_day(date: NaiveDate, today: NaiveDate) -> String {
    let diff = (date - today).num_days();
    match diff {
        0 => format!("Today, {} {}", date.format("%B"), date.day()),
        1 => "Tomorrow".to_string(),
        2..=6 => date.format("%A").to_string(),
        _ => date.format("%a %b %d").to_string(),
    }
}
