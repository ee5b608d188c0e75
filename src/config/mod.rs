//! Monitor configuration.
//!
//! Read once at startup from a YAML file, then overridden by a couple of
//! environment variables. The resulting value is immutable and shared by
//! reference with the scheduler and orchestrator.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::models::{instrument_set, Instrument};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_INTERVAL: &str = "15m";
pub const DEFAULT_MAX_WORKERS: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid interval '{0}': expected <n>s, <n>m, <n>h or <n>d with n > 0")]
    InvalidInterval(String),
    #[error("invalid {key} override: {reason}")]
    InvalidOverride { key: &'static str, reason: String },
}

/// Get the deployment environment (`ENVIRONMENT`, default `sandbox`)
pub fn get_environment() -> String {
    std::env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

/// Get the config file location (`CONFIG_PATH`, default `config.yaml`)
pub fn get_config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub assets: AssetsConfig,
    pub interval: SamplingInterval,
    pub timezone: Tz,
    pub schedule: ScheduleConfig,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
    pub provider: ProviderSettings,
    /// Upper bound on instruments processed in parallel
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets: AssetsConfig::default(),
            interval: SamplingInterval::default(),
            timezone: chrono_tz::America::New_York,
            schedule: ScheduleConfig::default(),
            notification: NotificationConfig::default(),
            logging: LoggingConfig::default(),
            provider: ProviderSettings::default(),
            workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl Config {
    /// Read and parse the file at `path`. Environment overrides are not applied.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// [`Config::load_or_default_with`] reading overrides from the process environment
    pub fn load_or_default(path: impl AsRef<Path>) -> (Self, Vec<ConfigError>) {
        Self::load_or_default_with(path, |key| std::env::var(key).ok())
    }

    /// Load `path`, falling back to the default (zero instruments) configuration
    /// only when the file is missing or unparseable, then apply overrides from
    /// `lookup`. A rejected override keeps the file's value. Every problem met
    /// along the way is returned for the caller to log.
    pub fn load_or_default_with<F>(path: impl AsRef<Path>, lookup: F) -> (Self, Vec<ConfigError>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();
        let mut config = Self::load(path).unwrap_or_else(|err| {
            problems.push(err);
            Self::default()
        });
        problems.extend(config.apply_overrides(lookup).err());
        (config, problems)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply `DISCORD_WEBHOOK` and `INTERVAL` from `lookup`. An invalid
    /// interval is reported and leaves the current one in place.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(webhook) = lookup("DISCORD_WEBHOOK") {
            if !webhook.trim().is_empty() {
                self.notification.discord.webhook = Some(webhook);
            }
        }

        if let Some(raw) = lookup("INTERVAL") {
            self.interval = raw.parse().map_err(|e: ConfigError| ConfigError::InvalidOverride {
                key: "INTERVAL",
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Deduplicated union of stocks and commodities
    pub fn instruments(&self) -> BTreeSet<Instrument> {
        instrument_set([
            self.assets.stocks.as_slice(),
            self.assets.commodities.as_slice(),
        ])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub stocks: Vec<String>,
    pub commodities: Vec<String>,
}

/// Bar interval, e.g. `15m`; doubles as the cycle period
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct SamplingInterval {
    label: String,
    period: Duration,
}

impl SamplingInterval {
    /// Interval string as sent to the price provider
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for SamplingInterval {
    fn default() -> Self {
        Self {
            label: DEFAULT_INTERVAL.to_string(),
            period: Duration::from_secs(15 * 60),
        }
    }
}

impl FromStr for SamplingInterval {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let label = raw.trim();
        let invalid = || ConfigError::InvalidInterval(raw.to_string());

        let split = label.len().checked_sub(1).ok_or_else(invalid)?;
        if !label.is_char_boundary(split) {
            return Err(invalid());
        }
        let (count, unit) = label.split_at(split);
        let count: u64 = count.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }

        let unit_secs = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3_600,
            "d" => 86_400,
            _ => return Err(invalid()),
        };

        Ok(Self {
            label: label.to_string(),
            period: Duration::from_secs(count * unit_secs),
        })
    }
}

impl TryFrom<String> for SamplingInterval {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for SamplingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Which gate opens the first cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartGateKind {
    /// Next boundary of the sampling interval
    #[default]
    Interval,
    /// First moment the trading session is open
    MarketHours,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub start: StartGateKind,
    #[serde(deserialize_with = "deserialize_hhmm")]
    pub market_open: NaiveTime,
    #[serde(deserialize_with = "deserialize_hhmm")]
    pub market_close: NaiveTime,
    pub poll_secs: u64,
    pub cooldown_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            start: StartGateKind::Interval,
            market_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            market_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            poll_secs: 60,
            cooldown_secs: 60,
        }
    }
}

fn deserialize_hhmm<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub webhook: Option<String>,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook: None,
            timeout_secs: 10,
            retry: RetryConfig::default(),
        }
    }
}

impl DiscordConfig {
    /// Webhook to deliver to, if notifications are enabled and a URL is set
    pub fn target(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.webhook
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Backoff applied around delivery; `max_attempts: 0` disables retries
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub min_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            min_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "WARN")]
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    /// History window requested from the chart API
    pub range: String,
    pub max_bars: usize,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            range: "1d".to_string(),
            max_bars: 50,
            timeout_secs: 10,
        }
    }
}
