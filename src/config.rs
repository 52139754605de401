//! Configuration loading and management
//!
//! Handles parsing of `<data-dir>/config.toml`.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// Name of the config file inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default viewer identity
    #[serde(default)]
    pub viewer: ViewerConfig,

    /// Reconciler and poller settings
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Alert presentation settings
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Viewer identity used when the CLI gets no `--user`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub user: Option<String>,

    /// Admin/team-lead role: sees status changes across all tasks
    #[serde(default)]
    pub privileged: bool,
}

/// What a bootstrap status-change event reports as its previous status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapOldStatus {
    /// Report `pending`; the real prior status is unknown
    #[default]
    Placeholder,
    /// Leave the previous status absent
    Omit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Trailing window of task updates fetched per tick
    #[serde(default = "default_window")]
    pub window: String,

    /// Records with `updated_at - created_at` below this count as never edited
    #[serde(default = "default_fresh_threshold")]
    pub fresh_threshold: String,

    /// Tick interval for privileged viewers
    #[serde(default = "default_privileged_interval")]
    pub privileged_interval: String,

    /// Tick interval for everyone else
    #[serde(default = "default_member_interval")]
    pub member_interval: String,

    /// Key in the durable key/value store holding read notification ids
    #[serde(default = "default_read_key")]
    pub read_key: String,

    #[serde(default)]
    pub bootstrap_old_status: BootstrapOldStatus,
}

fn default_window() -> String {
    "7d".to_string()
}

fn default_fresh_threshold() -> String {
    "5s".to_string()
}

fn default_privileged_interval() -> String {
    "15s".to_string()
}

fn default_member_interval() -> String {
    "30s".to_string()
}

fn default_read_key() -> String {
    "leadline.notifications.read".to_string()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            fresh_threshold: default_fresh_threshold(),
            privileged_interval: default_privileged_interval(),
            member_interval: default_member_interval(),
            read_key: default_read_key(),
            bootstrap_old_status: BootstrapOldStatus::default(),
        }
    }
}

impl NotificationsConfig {
    pub fn window(&self) -> Result<Duration> {
        parse_config_duration(&self.window, "notifications.window")
    }

    pub fn fresh_threshold(&self) -> Result<Duration> {
        parse_config_duration(&self.fresh_threshold, "notifications.fresh_threshold")
    }

    /// Tick interval for the given role
    pub fn interval_for(&self, privileged: bool) -> Result<Duration> {
        if privileged {
            parse_config_duration(&self.privileged_interval, "notifications.privileged_interval")
        } else {
            parse_config_duration(&self.member_interval, "notifications.member_interval")
        }
    }

    fn validate(&self) -> Result<()> {
        self.window()?;
        self.fresh_threshold()?;
        self.interval_for(true)?;
        self.interval_for(false)?;
        if self.read_key.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "notifications.read_key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Auto-dismiss durations per alert kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_assignment_ttl")]
    pub assignment_ttl: String,

    #[serde(default = "default_status_ttl")]
    pub status_ttl: String,

    #[serde(default = "default_completed_ttl")]
    pub completed_ttl: String,
}

fn default_assignment_ttl() -> String {
    "6s".to_string()
}

fn default_status_ttl() -> String {
    "5s".to_string()
}

fn default_completed_ttl() -> String {
    "8s".to_string()
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            assignment_ttl: default_assignment_ttl(),
            status_ttl: default_status_ttl(),
            completed_ttl: default_completed_ttl(),
        }
    }
}

impl AlertsConfig {
    pub fn assignment_ttl(&self) -> Result<Duration> {
        parse_ttl(&self.assignment_ttl, "alerts.assignment_ttl")
    }

    pub fn status_ttl(&self) -> Result<Duration> {
        parse_ttl(&self.status_ttl, "alerts.status_ttl")
    }

    pub fn completed_ttl(&self) -> Result<Duration> {
        parse_ttl(&self.completed_ttl, "alerts.completed_ttl")
    }

    fn validate(&self) -> Result<()> {
        self.assignment_ttl()?;
        self.status_ttl()?;
        self.completed_ttl()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from the data directory, or return defaults.
    ///
    /// A present but invalid file is an error; a missing one is not.
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        let config_path = Self::path_in(data_dir);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    fn validate(&self) -> Result<()> {
        self.notifications.validate()?;
        self.alerts.validate()?;
        Ok(())
    }
}

/// Accepted alert auto-dismiss range, in seconds.
pub const ALERT_TTL_RANGE: (i64, i64) = (1, 60);

fn parse_ttl(raw: &str, field: &str) -> Result<Duration> {
    let ttl = parse_config_duration(raw, field)?;
    let (min, max) = ALERT_TTL_RANGE;
    if ttl < Duration::seconds(min) || ttl > Duration::seconds(max) {
        return Err(Error::InvalidConfig(format!(
            "{field}: alert ttl must be between {min}s and {max}s, got '{raw}'"
        )));
    }
    Ok(ttl)
}

fn parse_config_duration(raw: &str, field: &str) -> Result<Duration> {
    let duration = parse_duration(raw)
        .map_err(|err| Error::InvalidConfig(format!("{field}: {err}")))?;
    if duration <= Duration::zero() {
        return Err(Error::InvalidConfig(format!(
            "{field}: duration must be positive, got '{raw}'"
        )));
    }
    Ok(duration)
}

/// Parse a duration string like "5s", "30m", "7d"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if s.is_empty() {
        return Err(Error::InvalidArgument("Duration cannot be empty".to_string()));
    }

    let (num_str, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, "s"),
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid duration number: '{num_str}'")))?;

    let duration = match unit.to_lowercase().as_str() {
        "ms" => Duration::milliseconds(num),
        "s" | "sec" | "secs" | "seconds" => Duration::seconds(num),
        "m" | "min" | "minutes" => Duration::minutes(num),
        "h" | "hr" | "hours" => Duration::hours(num),
        "d" | "day" | "days" => Duration::days(num),
        "w" | "week" | "weeks" => Duration::weeks(num),
        _ => {
            return Err(Error::InvalidArgument(format!(
                "Invalid duration unit '{unit}'. Expected: ms, s, m, h, d, w"
            )));
        }
    };

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::milliseconds(250));
        assert_eq!(parse_duration("5s").unwrap(), Duration::seconds(5));
        assert_eq!(parse_duration("15").unwrap(), Duration::seconds(15));
        assert_eq!(parse_duration("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_duration("7d").unwrap(), Duration::days(7));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3 fortnights").is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = NotificationsConfig {
            privileged_interval: "0s".to_string(),
            ..NotificationsConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
