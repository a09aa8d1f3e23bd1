// src/config.rs

use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, time::Duration};
use url::Url;

use crate::error::ConfigError;
use crate::fetch::DEFAULT_FEED_URL;
use crate::process::CsvDialect;
use crate::source::{SourceOptions, DEFAULT_REFRESH_INTERVAL};

pub const ENV_FEED_URL: &str = "SHEETPULSE_FEED_URL";
pub const ENV_WEBHOOK_URL: &str = "SHEETPULSE_WEBHOOK_URL";
pub const ENV_REFRESH_SECS: &str = "SHEETPULSE_REFRESH_SECS";
pub const ENV_TIMEOUT_SECS: &str = "SHEETPULSE_TIMEOUT_SECS";
pub const ENV_CONFIG: &str = "SHEETPULSE_CONFIG";

pub const USAGE: &str = "\
usage: sheetpulse [CONFIG.yaml]

Polls a CSV feed and prints a JSON dashboard summary on every refresh.
Config path may also come from SHEETPULSE_CONFIG. Overrides:
  SHEETPULSE_FEED_URL      CSV export to poll (default: the dashboard sheet)
  SHEETPULSE_WEBHOOK_URL   chat webhook; chat is disabled when unset
  SHEETPULSE_REFRESH_SECS  poll interval in seconds (default 30)
  SHEETPULSE_TIMEOUT_SECS  HTTP timeout in seconds (default 15)

stdin: r = refresh, q = quit, any other line is sent to the chat webhook.
";

/// Runtime settings. Any field missing from the YAML falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed_url: Url,
    pub webhook_url: Option<Url>,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub dialect: CsvDialect,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: Url::parse(DEFAULT_FEED_URL).expect("DEFAULT_FEED_URL is a valid URL"),
            webhook_url: None,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            request_timeout_secs: 15,
            dialect: CsvDialect::default(),
        }
    }
}

impl Config {
    /// Read a YAML file, then apply `SHEETPULSE_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = serde_yaml::from_str(&text)?;
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup(ENV_FEED_URL) {
            self.feed_url = parse_url(ENV_FEED_URL, &v)?;
        }
        if let Some(v) = lookup(ENV_WEBHOOK_URL) {
            self.webhook_url = match v.trim() {
                "" => None,
                s => Some(parse_url(ENV_WEBHOOK_URL, s)?),
            };
        }
        if let Some(v) = lookup(ENV_REFRESH_SECS) {
            self.refresh_interval_secs = parse_secs(ENV_REFRESH_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_secs(ENV_TIMEOUT_SECS, &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_secs must be greater than 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        check_http("feed_url", &self.feed_url)?;
        if let Some(url) = &self.webhook_url {
            check_http("webhook_url", url)?;
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Startup note for when no webhook is configured.
    pub fn chat_disabled_hint(&self) -> Option<String> {
        match self.webhook_url {
            Some(_) => None,
            None => Some(format!(
                "chat relay disabled; set webhook_url in the config file or {ENV_WEBHOOK_URL} to enable it"
            )),
        }
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            interval: self.refresh_interval(),
            dialect: self.dialect,
        }
    }
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid(format!("{key}: {e}")))
}

fn parse_secs(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{key}: {e}")))
}

fn check_http(field: &str, url: &Url) -> Result<(), ConfigError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "{field} must be http(s), got {other}"
        ))),
    }
}
