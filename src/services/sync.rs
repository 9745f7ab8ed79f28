//! One sync run: fetch -> parse -> resolve location -> store -> notification check.
//!
//! Each phase consumes only the previous phase's output and any error ends the
//! run. Nothing is retried here; the trigger decides when to run again.

use crate::client::{self, ForecastSource, WeatherClientError};
use crate::services::notify::{self, NotificationPolicy, Notifier};
use crate::services::{forecast, lease, locations, store};
use chrono::{DateTime, Local, Utc};
use core::fmt;
use diesel::SqliteConnection;
use log::{debug, error, info, warn};
use rand::Rng;
use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum SyncError {
    /// Transport failure or non-success HTTP status.
    Network(String),
    /// Response body did not match the expected document shape.
    Parse(String),
    /// Local persistence failed.
    Store(String),
    /// Required configuration missing or invalid.
    Config(String),
    /// Another run, in this or another process, holds the sync lease.
    Busy,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Network(e) => write!(f, "network error: {}", e),
            SyncError::Parse(e) => write!(f, "parse error: {}", e),
            SyncError::Store(e) => write!(f, "store error: {}", e),
            SyncError::Config(e) => write!(f, "config error: {}", e),
            SyncError::Busy => write!(f, "a sync is already in progress"),
        }
    }
}

impl Error for SyncError {}

impl From<WeatherClientError> for SyncError {
    fn from(value: WeatherClientError) -> Self {
        match value {
            WeatherClientError::Json(_) => SyncError::Parse(value.to_string()),
            WeatherClientError::Transport(_) | WeatherClientError::Http { .. } => SyncError::Network(value.to_string()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    Fetching,
    Parsing,
    Resolving,
    Storing,
    NotifyCheck,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Fetching => "fetching",
            SyncPhase::Parsing => "parsing",
            SyncPhase::Resolving => "resolving location",
            SyncPhase::Storing => "storing",
            SyncPhase::NotifyCheck => "notification check",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub location_id: i64,
    pub stored: usize,
    pub notified: bool,
}

/// What the trigger sees: success flag plus a message suitable for display on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub success: bool,
    pub message: Option<String>,
}

impl From<&Result<SyncOutcome, SyncError>> for SyncReport {
    fn from(result: &Result<SyncOutcome, SyncError>) -> Self {
        match result {
            Ok(_) => SyncReport {
                success: true,
                message: None,
            },
            Err(e) => SyncReport {
                success: false,
                message: Some(e.to_string()),
            },
        }
    }
}

pub struct Syncer<S: ForecastSource> {
    source: S,
    location: String,
    policy: NotificationPolicy,
    notifier: Box<dyn Notifier>,
}

impl<S: ForecastSource> Syncer<S> {
    pub fn new(source: S, location: impl Into<String>, policy: NotificationPolicy, notifier: Box<dyn Notifier>) -> Self {
        Syncer {
            source,
            location: location.into(),
            policy,
            notifier,
        }
    }

    /// Run the whole pipeline once. `now` anchors "today", the notification window and the lease.
    pub fn run(&self, conn: &mut SqliteConnection, now: DateTime<Local>) -> Result<SyncOutcome, SyncError> {
        let lease = lease::try_acquire(conn, now.with_timezone(&Utc).naive_utc())
            .map_err(SyncError::Store)?
            .ok_or(SyncError::Busy)?;
        let mut phase = SyncPhase::Fetching;
        let result = self.run_phases(conn, now, &mut phase);
        if let Err(e) = &result {
            error!("Sync for '{}' failed while {}: {}", self.location, phase, e);
        }
        if let Err(e) = lease.release(conn) {
            warn!("{}", e);
        }
        result
    }

    fn run_phases(
        &self,
        conn: &mut SqliteConnection,
        now: DateTime<Local>,
        phase: &mut SyncPhase,
    ) -> Result<SyncOutcome, SyncError> {
        if self.location.trim().is_empty() {
            return Err(SyncError::Config("no forecast location configured".to_string()));
        }
        let today = now.date_naive();

        debug!("Sync: {}", phase);
        let body = self.source.fetch_body(&self.location)?;

        *phase = SyncPhase::Parsing;
        let doc = client::parse_forecast(&body)?;
        debug!("Sync: {} ({} day entries)", phase, doc.list.len());
        let days = forecast::to_daily_records(&doc, today);
        if days.len() < doc.list.len().min(forecast::FORECAST_DAYS) {
            debug!(
                "Sync: skipped {} day(s) without weather conditions",
                doc.list.len().min(forecast::FORECAST_DAYS) - days.len()
            );
        }

        *phase = SyncPhase::Resolving;
        debug!("Sync: {}", phase);
        let location_id = locations::resolve(
            conn,
            &self.location,
            &doc.city.name,
            doc.city.coord.lat,
            doc.city.coord.lon,
        )
        .map_err(SyncError::Store)?;

        *phase = SyncPhase::Storing;
        debug!("Sync: {}", phase);
        let updated_at = now.with_timezone(&Utc).naive_utc();
        let rows = days
            .into_iter()
            .map(|d| d.into_row(location_id, updated_at))
            .collect::<Vec<_>>();
        let stored = store::upsert_daily_forecasts(conn, &rows).map_err(SyncError::Store)?;

        *phase = SyncPhase::NotifyCheck;
        debug!("Sync: {}", phase);
        let notified = self.notify_check(conn, now.with_timezone(&Utc), location_id, today)?;

        info!(
            "Synced {} day(s) for '{}' ({}) into location {}",
            stored, self.location, doc.city.name, location_id
        );
        Ok(SyncOutcome {
            location_id,
            stored,
            notified,
        })
    }

    fn notify_check(
        &self,
        conn: &mut SqliteConnection,
        now: DateTime<Utc>,
        location_id: i64,
        today: chrono::NaiveDate,
    ) -> Result<bool, SyncError> {
        if !self.policy.enabled {
            return Ok(false);
        }
        let last = notify::last_notified(conn).map_err(SyncError::Store)?;
        let todays = store::latest_for_date(conn, location_id, today).map_err(SyncError::Store)?;

        let Some(notification) = self.policy.maybe_notify(now, last, todays.as_ref()) else {
            return Ok(false);
        };
        match self.notifier.notify(&notification) {
            Ok(()) => {
                notify::record_notified(conn, now).map_err(SyncError::Store)?;
                Ok(true)
            }
            Err(e) => {
                warn!("Delivering notification failed: {}", e);
                Ok(false)
            }
        }
    }
}

/// Periodic trigger: sync, then wait `interval` plus up to `flex` of random delay.
///
/// Failed runs are reported and the next tick acts as the retry.
pub fn run_loop<S: ForecastSource>(
    conn: &mut SqliteConnection,
    syncer: &Syncer<S>,
    interval: Duration,
    flex: Duration,
) -> ! {
    let mut rng = rand::rng();
    loop {
        let tick_start = Instant::now();

        let result = syncer.run(conn, Local::now());
        let report = SyncReport::from(&result);
        if !report.success {
            warn!("Sync failed: {}", report.message.as_deref().unwrap_or("unknown error"));
        }

        let wait = next_wait(interval, flex, tick_start.elapsed(), &mut rng);
        debug!("Next sync in {}s", wait.as_secs());
        thread::sleep(wait);
    }
}

/// Time left until the next tick: `interval` plus random `0..=flex`, minus time already spent.
fn next_wait(interval: Duration, flex: Duration, elapsed: Duration, rng: &mut impl Rng) -> Duration {
    interval.saturating_add(jitter(flex, rng)).saturating_sub(elapsed)
}

/// Uniform random delay in `0..=flex`, millisecond resolution.
fn jitter(flex: Duration, rng: &mut impl Rng) -> Duration {
    let max_ms = u64::try_from(flex.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rng.random_range(0..=max_ms))
    }
}
