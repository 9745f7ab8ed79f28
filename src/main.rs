pub mod models {
    pub mod owm;
}

pub mod client;
pub mod config;
pub mod db {
    pub mod connection;
    pub mod models;
}
pub mod schema;
pub mod utils;
pub mod services {
    pub mod forecast;
    pub mod lease;
    pub mod locations;
    pub mod notify;
    pub mod store;
    pub mod sync;
}

use crate::client::WeatherClient;
use crate::config::{CliArgs, Config, Mode};
use crate::services::notify::{CommandNotifier, LogNotifier, NotificationPolicy, Notifier};
use crate::services::sync::{SyncReport, Syncer};
use crate::services::{locations, store};
use crate::utils::{format_temperature, friendly_day};
use chrono::Local;
use diesel::SqliteConnection;
use log::{error, info, warn};
use std::path::PathBuf;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

pub fn run(mode: Mode) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (location='{}', units={}, lang={}, notifications={}, interval={}s, flex={}s, timeout={})",
        cfg.location,
        cfg.units,
        cfg.language,
        cfg.notifications_enabled,
        cfg.sync_interval.as_secs(),
        cfg.sync_flex.as_secs(),
        cfg.http_timeout
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "-".to_string()),
    );

    // 2) Open the local store and bring the schema up to date
    let mut conn = db::connection::establish(&cfg.database_url)?;
    info!("Opened database {}", cfg.database_url);
    db::connection::apply_database_migrations(&mut conn)?;

    if let Mode::Show { json } = mode {
        return show(&mut conn, &cfg, json);
    }

    // 3) Wire the pipeline
    let client = WeatherClient::new(&cfg.base_url, &cfg.api_key, &cfg.language, cfg.http_timeout);
    let notifier: Box<dyn Notifier> = match cfg.notify_command.as_deref() {
        Some(cmd) => Box::new(CommandNotifier::from_command_line(cmd)?),
        None => Box::new(LogNotifier),
    };
    let policy = NotificationPolicy {
        enabled: cfg.notifications_enabled,
        units: cfg.units,
        title: env!("CARGO_PKG_NAME").to_string(),
    };
    let syncer = Syncer::new(client, cfg.location.clone(), policy, notifier);

    // 4) Single run or periodic trigger
    match mode {
        Mode::Sync => {
            let result = syncer.run(&mut conn, Local::now());
            if let Ok(outcome) = &result {
                info!(
                    "Sync complete: {} day(s) stored for location {}{}",
                    outcome.stored,
                    outcome.location_id,
                    if outcome.notified { ", notification sent" } else { "" }
                );
            }
            let report = SyncReport::from(&result);
            if report.success {
                Ok(())
            } else {
                Err(report.message.unwrap_or_else(|| "sync failed".to_string()))
            }
        }
        _ => {
            info!(
                "Starting sync loop: every {}s (+ up to {}s)",
                cfg.sync_interval.as_secs(),
                cfg.sync_flex.as_secs()
            );
            services::sync::run_loop(&mut conn, &syncer, cfg.sync_interval, cfg.sync_flex)
        }
    }
}

fn show(conn: &mut SqliteConnection, cfg: &Config, json: bool) -> Result<(), String> {
    let today = Local::now().date_naive();
    let Some(location) = locations::find_by_query(conn, &cfg.location)? else {
        warn!("No forecast stored for '{}' yet; run `sync` first", cfg.location);
        return Ok(());
    };
    let days = store::forecasts_from(conn, location.id, today)?;

    if json {
        let out = serde_json::to_string_pretty(&days).map_err(|e| format!("serializing forecast failed: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{} ({:.2}, {:.2})", location.city_name, location.latitude, location.longitude);
    if let Some(now) = store::latest_for_query_and_date(conn, &cfg.location, today)? {
        println!(
            "Now: {}, wind {:.1} m/s at {:.0}\u{00B0}, humidity {:.0}%, pressure {:.0} hPa",
            now.short_desc, now.wind_speed, now.wind_degrees, now.humidity, now.pressure
        );
    }
    for day in &days {
        println!(
            "{:<20} {:<24} {:>5} / {:>5}",
            friendly_day(day.date, today),
            day.short_desc,
            format_temperature(day.max_temp_c, cfg.units),
            format_temperature(day.min_temp_c, cfg.units)
        );
    }
    Ok(())
}

fn configure_env(cli: &CliArgs) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = &cli.env_file {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        config::load_env_file(path)?;
        return Ok(Some(LoadedEnvFile {
            path: path.clone(),
            explicit: true,
        }));
    }

    let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
    let default_path = cwd.join(".env");
    if default_path.is_file() {
        config::load_env_file(&default_path)?;
        Ok(Some(LoadedEnvFile {
            path: default_path,
            explicit: false,
        }))
    } else {
        Ok(None)
    }
}

fn main() {
    let prepared = config::parse_args(std::env::args_os().skip(1))
        .and_then(|cli| configure_env(&cli).map(|env| (cli, env)));
    let (cli, loaded_env) = match prepared {
        Ok(v) => v,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "forecast-sync {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli.mode) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
