//! Runtime configuration: command line, optional `.env` file and process environment.

use crate::client::DEFAULT_BASE_URL;
use crate::utils::Units;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "forecast.sqlite3";
pub const DEFAULT_LOCATION: &str = "94043";
pub const DEFAULT_SYNC_SECS: u64 = 60 * 60;
pub const DEFAULT_FLEX_SECS: u64 = DEFAULT_SYNC_SECS / 3;
/// Upper bound for interval, flex and timeout settings.
pub const MAX_SCHEDULE_SECS: u64 = 7 * 24 * 60 * 60;
const API_KEY_FILE: &str = "api_key.txt";

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file path (or `:memory:`).
    pub database_url: String,
    pub api_key: String,
    pub base_url: String,
    /// Query sent as `q` and used as the location's identity in the store.
    pub location: String,
    /// Only affects rendering; the API is always queried in metric.
    pub units: Units,
    pub language: String,
    pub notifications_enabled: bool,
    pub sync_interval: Duration,
    /// Upper bound of the random delay added to each interval.
    pub sync_flex: Duration,
    pub http_timeout: Option<Duration>,
    pub notify_command: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = match non_empty("OWM_API_KEY") {
            Some(v) => v,
            None => match std::fs::read_to_string(API_KEY_FILE) {
                Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => {
                    return Err(format!(
                        "Missing API key: set OWM_API_KEY or provide {} in working directory",
                        API_KEY_FILE
                    ));
                }
            },
        };

        let units = match non_empty("FORECAST_UNITS") {
            Some(s) => s.parse::<Units>()?,
            None => Units::default(),
        };

        let language = non_empty("FORECAST_LANG")
            .or_else(|| non_empty("LANG").and_then(|l| language_from_locale(&l)))
            .unwrap_or_else(|| "en".to_string());

        let secs = |key: &str, default: u64| -> Result<u64, String> {
            let value = match non_empty(key) {
                Some(s) => s
                    .parse::<u64>()
                    .map_err(|_| format!("{} must be a whole number of seconds", key))?,
                None => default,
            };
            if value > MAX_SCHEDULE_SECS {
                return Err(format!("{} must be at most {} seconds", key, MAX_SCHEDULE_SECS));
            }
            Ok(value)
        };
        let sync_secs = secs("SYNC_INTERVAL_SECS", DEFAULT_SYNC_SECS)?;
        if sync_secs == 0 {
            return Err("SYNC_INTERVAL_SECS must be greater than zero".to_string());
        }
        let flex_secs = secs("SYNC_FLEX_SECS", DEFAULT_FLEX_SECS)?;
        let http_timeout = match secs("HTTP_TIMEOUT_SECS", 0)? {
            0 => None,
            n => Some(Duration::from_secs(n)),
        };

        let notifications_enabled = non_empty("NOTIFICATIONS_ENABLED")
            .map(|s| matches!(s.as_str(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(true);

        Ok(Config {
            database_url: non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            api_key,
            base_url: non_empty("OWM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            location: non_empty("FORECAST_LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            units,
            language,
            notifications_enabled,
            sync_interval: Duration::from_secs(sync_secs),
            sync_flex: Duration::from_secs(flex_secs),
            http_timeout,
            notify_command: non_empty("NOTIFY_COMMAND"),
        })
    }
}

/// "de_DE.UTF-8" -> "de". The C/POSIX locales carry no language.
fn language_from_locale(locale: &str) -> Option<String> {
    let lang = locale.split(['_', '.', '@']).next()?.to_ascii_lowercase();
    if lang.is_empty() || lang == "c" || lang == "posix" {
        None
    } else {
        Some(lang)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Sync on a timer until killed.
    Run,
    /// A single sync; exit status reflects the outcome.
    Sync,
    /// Print the stored forecast for the configured location.
    Show { json: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub env_file: Option<PathBuf>,
    pub mode: Mode,
}

fn set_env_file(path: &str, env_file: &mut Option<PathBuf>) -> Result<(), String> {
    if env_file.is_some() {
        return Err("`--env-file` provided more than once".to_string());
    }
    if path.is_empty() {
        return Err("`--env-file` requires a path argument".to_string());
    }
    *env_file = Some(PathBuf::from(path));
    Ok(())
}

pub fn parse_args(args: impl IntoIterator<Item = OsString>) -> Result<CliArgs, String> {
    let mut args = args.into_iter();
    let mut env_file: Option<PathBuf> = None;
    let mut mode: Option<Mode> = None;
    let mut json = false;

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--env-file") => {
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
                let value = value
                    .into_string()
                    .map_err(|_| "argument contains invalid UTF-8".to_string())?;
                set_env_file(&value, &mut env_file)?;
            }
            Some(s) if s.starts_with("--env-file=") => set_env_file(&s["--env-file=".len()..], &mut env_file)?,
            Some("--json") => json = true,
            Some(cmd @ ("run" | "sync" | "show")) => {
                if mode.is_some() {
                    return Err(format!("unexpected extra command: {}", cmd));
                }
                mode = Some(match cmd {
                    "run" => Mode::Run,
                    "sync" => Mode::Sync,
                    _ => Mode::Show { json: false },
                });
            }
            Some(other) => return Err(format!("unrecognised argument: {}", other)),
            None => return Err("argument contains invalid UTF-8".to_string()),
        }
    }

    let mode = match mode.unwrap_or(Mode::Run) {
        Mode::Show { .. } => Mode::Show { json },
        _ if json => return Err("`--json` is only valid with `show`".to_string()),
        other => other,
    };
    Ok(CliArgs { env_file, mode })
}

/// Load `KEY=value` pairs into the process environment without overriding existing variables.
pub fn load_env_file(path: &Path) -> Result<(), String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    for (key, value) in parse_env_file(&contents).map_err(|e| format!("{}:{}", path.display(), e))? {
        if std::env::var_os(&key).is_none() {
            // Single-threaded at this point; nothing else reads the environment yet.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

/// Errors are prefixed with the 1-based line number.
pub fn parse_env_file(contents: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let assignment = trimmed.strip_prefix("export ").map(str::trim_start).unwrap_or(trimmed);
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| format!("{}: missing '=' in assignment", index + 1))?;
        let key = key.trim();
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return Err(format!("{}: invalid variable name '{}'", index + 1, key));
        }
        let value = parse_env_value(raw.trim()).map_err(|e| format!("{}: {}", index + 1, e))?;
        pairs.push((key.to_string(), value));
    }
    Ok(pairs)
}

fn parse_env_value(raw: &str) -> Result<String, String> {
    let Some(quote @ ('"' | '\'')) = raw.chars().next() else {
        return Ok(raw.split('#').next().unwrap_or_default().trim_end().to_string());
    };

    let mut value = String::new();
    let mut chars = raw[1..].chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if quote == '"' => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(other) => value.push(other),
                None => break,
            },
            c if c == quote => {
                let rest = chars.as_str().trim();
                return if rest.is_empty() || rest.starts_with('#') {
                    Ok(value)
                } else {
                    Err("unexpected characters after closing quote".to_string())
                };
            }
            c => value.push(c),
        }
    }
    Err("unterminated quoted value".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    fn args(list: &[&str]) -> Result<CliArgs, String> {
        parse_args(list.iter().map(OsString::from))
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("OWM_API_KEY", "k")]).unwrap();
        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.location, "94043");
        assert_eq!(cfg.units, Units::Metric);
        assert_eq!(cfg.language, "en");
        assert!(cfg.notifications_enabled);
        assert_eq!(cfg.sync_interval, Duration::from_secs(3600));
        assert_eq!(cfg.sync_flex, Duration::from_secs(1200));
        assert_eq!(cfg.http_timeout, None);
        assert_eq!(cfg.notify_command, None);
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("OWM_API_KEY", "k"),
            ("FORECAST_LOCATION", "London,uk"),
            ("FORECAST_UNITS", "imperial"),
            ("LANG", "de_DE.UTF-8"),
            ("NOTIFICATIONS_ENABLED", "false"),
            ("SYNC_INTERVAL_SECS", "600"),
            ("HTTP_TIMEOUT_SECS", "15"),
            ("NOTIFY_COMMAND", "notify-send"),
        ])
        .unwrap();
        assert_eq!(cfg.location, "London,uk");
        assert_eq!(cfg.units, Units::Imperial);
        assert_eq!(cfg.language, "de");
        assert!(!cfg.notifications_enabled);
        assert_eq!(cfg.sync_interval, Duration::from_secs(600));
        assert_eq!(cfg.http_timeout, Some(Duration::from_secs(15)));
        assert_eq!(cfg.notify_command.as_deref(), Some("notify-send"));
    }

    #[test]
    fn explicit_language_beats_locale() {
        let cfg = config(&[("OWM_API_KEY", "k"), ("LANG", "fr_FR.UTF-8"), ("FORECAST_LANG", "es")]).unwrap();
        assert_eq!(cfg.language, "es");
        let cfg = config(&[("OWM_API_KEY", "k"), ("LANG", "C.UTF-8")]).unwrap();
        assert_eq!(cfg.language, "en");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = config(&[]).unwrap_err();
        assert!(err.contains("OWM_API_KEY"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config(&[("OWM_API_KEY", "k"), ("FORECAST_UNITS", "kelvin")]).is_err());
        assert!(config(&[("OWM_API_KEY", "k"), ("SYNC_INTERVAL_SECS", "soon")]).is_err());
        assert!(config(&[("OWM_API_KEY", "k"), ("SYNC_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn schedule_values_are_bounded() {
        let max = MAX_SCHEDULE_SECS.to_string();
        let over = (MAX_SCHEDULE_SECS + 1).to_string();
        let huge = u64::MAX.to_string();
        for key in ["SYNC_INTERVAL_SECS", "SYNC_FLEX_SECS", "HTTP_TIMEOUT_SECS"] {
            assert!(config(&[("OWM_API_KEY", "k"), (key, max.as_str())]).is_ok(), "{key} at the limit");
            let err = config(&[("OWM_API_KEY", "k"), (key, over.as_str())]).unwrap_err();
            assert!(err.contains(key), "{err}");
            assert!(config(&[("OWM_API_KEY", "k"), (key, huge.as_str())]).is_err());
        }
    }

    #[test]
    fn cli_modes() {
        assert_eq!(args(&[]).unwrap().mode, Mode::Run);
        assert_eq!(args(&["sync"]).unwrap().mode, Mode::Sync);
        assert_eq!(args(&["show", "--json"]).unwrap().mode, Mode::Show { json: true });
        assert_eq!(args(&["show"]).unwrap().mode, Mode::Show { json: false });
        assert!(args(&["sync", "--json"]).is_err());
        assert!(args(&["sync", "run"]).is_err());
        assert!(args(&["--bogus"]).is_err());
    }

    #[test]
    fn cli_env_file() {
        let parsed = args(&["--env-file", "prod.env", "sync"]).unwrap();
        assert_eq!(parsed.env_file, Some(PathBuf::from("prod.env")));
        assert_eq!(args(&["--env-file=a.env"]).unwrap().env_file, Some(PathBuf::from("a.env")));
        assert!(args(&["--env-file"]).is_err());
        assert!(args(&["--env-file="]).is_err());
        assert!(args(&["--env-file=a", "--env-file=b"]).is_err());
    }

    #[test]
    fn env_file_syntax() {
        let contents = r#"
# comment
OWM_API_KEY=abc123 # trailing comment
export FORECAST_LOCATION="Mountain View, US"
NOTIFY_COMMAND='notify-send -a "forecast"'
ESCAPED="line\nbreak"
EMPTY=
"#;
        let pairs = parse_env_file(contents).unwrap();
        let get = |k: &str| pairs.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("OWM_API_KEY"), Some("abc123"));
        assert_eq!(get("FORECAST_LOCATION"), Some("Mountain View, US"));
        assert_eq!(get("NOTIFY_COMMAND"), Some("notify-send -a \"forecast\""));
        assert_eq!(get("ESCAPED"), Some("line\nbreak"));
        assert_eq!(get("EMPTY"), Some(""));
    }

    #[test]
    fn env_file_errors_carry_line_numbers() {
        assert!(parse_env_file("A=1\nnot an assignment").unwrap_err().starts_with("2:"));
        assert!(parse_env_file("A=\"open").unwrap_err().contains("unterminated"));
        assert!(parse_env_file("A='x' y").is_err());
        assert!(parse_env_file("BAD KEY=1").is_err());
    }
}
