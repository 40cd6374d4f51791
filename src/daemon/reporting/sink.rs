use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::{daemon::storage::entities::SiteCounters, utils::time::unix_seconds};

pub const DEFAULT_SERVER: &str = "http://browser-timetracker.appspot.com";

/// Upper bound for a single request to the collector.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collector answered with status {0}")]
    Rejected(u16),
    #[error("failed to encode statistics: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Remote aggregation endpoint statistics are flushed to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Submits the whole set of counters. Success means the collector acknowledged them.
    async fn update(&self, sites: &SiteCounters, now: DateTime<Utc>) -> Result<(), ReportError>;

    /// Wipes aggregates kept by the collector.
    async fn clear(&self) -> Result<(), ReportError>;
}

pub struct HttpSink {
    client: reqwest::Client,
    server: String,
}

impl HttpSink {
    pub fn new(server: impl Into<String>) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            server: server.into().trim_end_matches('/').to_string(),
        })
    }
}

/// Form body of `/stats/update`.
pub fn update_form(
    sites: &SiteCounters,
    now: DateTime<Utc>,
) -> Result<[(&'static str, String); 2], ReportError> {
    Ok([
        ("sites", serde_json::to_string(sites)?),
        ("now", unix_seconds(&now).to_string()),
    ])
}

#[async_trait]
impl RemoteSink for HttpSink {
    async fn update(&self, sites: &SiteCounters, now: DateTime<Utc>) -> Result<(), ReportError> {
        let form = update_form(sites, now)?;
        let response = self
            .client
            .post(format!("{}/stats/update", self.server))
            .form(form.as_slice())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(ReportError::Rejected(status.as_u16())),
        }
    }

    async fn clear(&self) -> Result<(), ReportError> {
        let response = self
            .client
            .get(format!("{}/stats/clear", self.server))
            .send()
            .await?;
        debug!("Collector answered clear with {}", response.status());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::daemon::{processing::site::site, storage::entities::SiteCounters};

    use super::update_form;

    #[test]
    fn test_update_form() {
        let mut sites = SiteCounters::new();
        sites.insert(site("http://a.com"), 180.);
        sites.insert(site("https://b.org"), 2.5);

        let form = update_form(&sites, Utc.timestamp_millis_opt(1_530_700_000_500).unwrap()).unwrap();

        assert_eq!(
            form,
            [
                ("sites", r#"{"http://a.com":180.0,"https://b.org":2.5}"#.to_string()),
                ("now", "1530700000.5".to_string()),
            ]
        );
    }
}
