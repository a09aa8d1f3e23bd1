// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single feed fetch. The `Display` text is what consumers show
/// as the dashboard's error message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Failed to fetch data: {0}")]
    Network(String),

    #[error("Failed to fetch data: HTTP {0}")]
    Status(u16),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl FetchError {
    /// Network and status failures are worth another attempt on the next tick.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Status(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None if err.is_body() || err.is_decode() => FetchError::Body(err.to_string()),
            None => FetchError::Network(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
