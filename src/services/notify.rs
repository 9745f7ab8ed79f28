//! Once-a-day "today's forecast" notification.
//!
//! The decision is pure: callers pass the current time, the last notification
//! time and today's stored forecast, and persist `now` themselves after a
//! successful delivery. The window is a rolling 24 hours, not a calendar day.

use crate::db::models::{DailyForecast, NOTIFICATION_STATE_ROW, NewNotificationState, NotificationState};
use crate::schema;
use crate::utils::{Units, format_temperature};
use chrono::{DateTime, TimeDelta, Utc};
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::info;
use std::process::Command;

pub const NOTIFY_WINDOW: TimeDelta = TimeDelta::hours(24);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct NotificationPolicy {
    pub enabled: bool,
    pub units: Units,
    pub title: String,
}

impl NotificationPolicy {
    /// `None` for `last_notified` means no notification was ever shown.
    pub fn maybe_notify(
        &self,
        now: DateTime<Utc>,
        last_notified: Option<DateTime<Utc>>,
        today: Option<&DailyForecast>,
    ) -> Option<Notification> {
        if !self.enabled {
            return None;
        }
        if let Some(last) = last_notified
            && now - last < NOTIFY_WINDOW
        {
            return None;
        }
        let forecast = today?;
        Some(Notification {
            title: self.title.clone(),
            body: format!(
                "Forecast: {} High: {} Low: {}",
                forecast.short_desc,
                format_temperature(forecast.max_temp_c, self.units),
                format_temperature(forecast.min_temp_c, self.units)
            ),
        })
    }
}

pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<(), String>;
}

/// Writes the notification to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), String> {
        info!("{}: {}", notification.title, notification.body);
        Ok(())
    }
}

/// Runs an external program as `<program> [args..] <title> <body>`, e.g. `notify-send`.
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    /// Split like a POSIX shell would, minus expansions: `'...'` is literal, `"..."`
    /// honours `\"` and `\\`, and a bare backslash escapes the next character.
    pub fn from_command_line(command: &str) -> Result<Self, String> {
        let mut parts = split_command_line(command)?.into_iter();
        let program = parts.next().ok_or_else(|| "notification command is empty".to_string())?;
        Ok(CommandNotifier {
            program,
            args: parts.collect(),
        })
    }
}

fn split_command_line(command: &str) -> Result<Vec<String>, String> {
    let unterminated = |quote: char| format!("unterminated {} in command: {}", quote, command);
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => word.push(c),
                        None => return Err(unterminated('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => word.push(c),
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => return Err(unterminated('"')),
                        },
                        Some(c) => word.push(c),
                        None => return Err(unterminated('"')),
                    }
                }
            }
            '\\' => {
                in_word = true;
                word.push(
                    chars
                        .next()
                        .ok_or_else(|| format!("trailing backslash in command: {}", command))?,
                );
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}

impl Notifier for CommandNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), String> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&notification.title)
            .arg(&notification.body)
            .status()
            .map_err(|e| format!("failed to run {}: {}", self.program, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{} exited with {}", self.program, status))
        }
    }
}

pub fn last_notified(conn: &mut SqliteConnection) -> Result<Option<DateTime<Utc>>, String> {
    use schema::notification_state::dsl as N;

    N::notification_state
        .find(NOTIFICATION_STATE_ROW)
        .select(NotificationState::as_select())
        .first(conn)
        .optional()
        .map(|row| row.map(|s| s.last_notified_at.and_utc()))
        .map_err(|e| format!("fetch notification state failed: {}", e))
}

pub fn record_notified(conn: &mut SqliteConnection, at: DateTime<Utc>) -> Result<(), String> {
    use schema::notification_state::dsl as N;

    let row = NewNotificationState {
        id: NOTIFICATION_STATE_ROW,
        last_notified_at: at.naive_utc(),
    };
    diesel::insert_into(N::notification_state)
        .values(&row)
        .on_conflict(N::id)
        .do_update()
        .set(N::last_notified_at.eq(row.last_notified_at))
        .execute(conn)
        .map(|_| ())
        .map_err(|e| format!("store notification state failed: {}", e))
}
