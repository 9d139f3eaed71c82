use crate::core::RateError;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "fiatfx/0.3";

/// Upper bound for a single upstream request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Builds the HTTP client shared by all providers.
pub fn http_client() -> Result<Client, RateError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| RateError::Transport {
            url: String::new(),
            reason: e.to_string(),
        })
}

/// Performs a GET and decodes the JSON body. Anything but `200 OK` is an error.
pub async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, RateError> {
    debug!("Requesting {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| RateError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(RateError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let text = response.text().await.map_err(|e| RateError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    serde_json::from_str(&text).map_err(|e| RateError::parse(url, e))
}

/// Maps a millisecond unix timestamp to its UTC calendar date.
pub fn date_from_millis(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Parses the date prefix of an ISO-8601 timestamp (`2021-07-08T00:00:00Z`).
pub fn date_from_iso(timestamp: &str) -> Option<NaiveDate> {
    let day = timestamp.split('T').next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
