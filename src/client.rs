//! Blocking HTTP client for the OpenWeatherMap daily forecast API.
//!
//! - Uses `ureq` (no async), one request per sync run, no retries.
//! - Always requests metric units; display conversion happens elsewhere.
//! - Response bodies are decoded through `serde_path_to_error` so shape errors
//!   name the offending JSON path.

use http::StatusCode;
use log::debug;
use std::time::Duration;

use crate::models::owm::ForecastDocument;
use crate::services::forecast::FORECAST_DAYS;

pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org";
const FORECAST_PATH: &str = "/data/2.5/forecast/daily";

#[derive(Debug)]
pub enum WeatherClientError {
    Transport(String),
    Http { status: u16, message: String },
    Json(serde_path_to_error::Error<serde_json::Error>),
}

impl core::fmt::Display for WeatherClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WeatherClientError::Transport(s) => write!(f, "transport error: {}", s),
            WeatherClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            WeatherClientError::Json(e) => write!(f, "unexpected response at `{}`: {}", e.path(), e.inner()),
        }
    }
}

impl std::error::Error for WeatherClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WeatherClientError::Json(e) => Some(e.inner()),
            _ => None,
        }
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for WeatherClientError {
    fn from(value: serde_path_to_error::Error<serde_json::Error>) -> Self {
        WeatherClientError::Json(value)
    }
}

/// Anything that can produce the raw forecast document for a location query.
///
/// Decoding is left to [`parse_forecast`] so callers can tell a failed fetch from
/// a body of the wrong shape.
pub trait ForecastSource {
    fn fetch_body(&self, location: &str) -> Result<String, WeatherClientError>;
}

pub struct WeatherClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    language: String,
}

impl WeatherClient {
    /// `timeout` of `None` leaves the transport defaults in place.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        language: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .into();

        WeatherClient {
            agent,
            base_url: base_url.into(),
            api_key: api_key.into(),
            language: language.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), FORECAST_PATH)
    }

    fn query_params(&self, location: &str) -> Vec<(&'static str, String)> {
        vec![
            ("q", location.to_string()),
            ("mode", "json".to_string()),
            ("units", "metric".to_string()),
            ("cnt", FORECAST_DAYS.to_string()),
            ("lang", self.language.clone()),
            ("APPID", self.api_key.clone()),
        ]
    }
}

impl ForecastSource for WeatherClient {
    fn fetch_body(&self, location: &str) -> Result<String, WeatherClientError> {
        let url = self.url();
        debug!("GET {} (q={}, lang={})", url, location, self.language);

        let mut req = self.agent.get(url.as_str()).header("Accept", "application/json");
        for (k, v) in self.query_params(location) {
            req = req.query(k, &v);
        }

        let mut res = req.call().map_err(|e| WeatherClientError::Transport(e.to_string()))?;
        let status = res.status();
        let body = res
            .body_mut()
            .read_to_string()
            .map_err(|e| WeatherClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(WeatherClientError::Http {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        Ok(body)
    }
}

pub fn parse_forecast(body: &str) -> Result<ForecastDocument, WeatherClientError> {
    let de = &mut serde_json::Deserializer::from_str(body);
    Ok(serde_path_to_error::deserialize(de)?)
}

/// The API reports failures as `{"cod": "404", "message": "city not found"}`.
fn error_message(status: StatusCode, body: &str) -> String {
    let api_message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));
    match (status, api_message) {
        (StatusCode::UNAUTHORIZED, Some(m)) => format!("{} (check OWM_API_KEY)", m),
        (_, Some(m)) => m,
        (_, None) if body.trim().is_empty() => status.canonical_reason().unwrap_or("<no body>").to_string(),
        (_, None) => body.trim().to_string(),
    }
}
