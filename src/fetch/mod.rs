// src/fetch/mod.rs

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use std::{sync::Arc, time::Duration};
use tracing::debug;
use url::Url;

use crate::error::FetchError;

/// Public CSV export of the dashboard spreadsheet.
pub static DEFAULT_FEED_URL: &str =
    "https://docs.google.com/spreadsheets/d/18abfzA-icdzsf5xrU0myk_SLzSCC-ff3voy6nFdwbnI/export?format=csv";

/// Anything that can hand back the current CSV body.
#[async_trait]
pub trait CsvFeed: Send + Sync {
    async fn fetch_csv(&self) -> Result<String, FetchError>;
}

#[async_trait]
impl<T: CsvFeed + ?Sized> CsvFeed for Arc<T> {
    async fn fetch_csv(&self) -> Result<String, FetchError> {
        (**self).fetch_csv().await
    }
}

/// GETs the CSV export over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: Client,
    url: Url,
}

impl HttpFeed {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl CsvFeed for HttpFeed {
    #[tracing::instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn fetch_csv(&self) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "text/csv")
            .send()
            .await?
            .error_for_status()?;
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;
        debug!(bytes = body.len(), "fetched CSV body");
        Ok(body)
    }
}
