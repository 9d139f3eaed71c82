//! Rate abstractions and core types

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Smallest units per base-asset coin.
pub const COIN: i64 = 100_000_000;

/// Price of one base-asset unit, keyed by currency code.
pub type Quote = HashMap<String, Decimal>;

/// Daily prices keyed by calendar date.
pub type HistorySeries = BTreeMap<NaiveDate, Decimal>;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("Request error: {reason} for URL: {url}")]
    Transport { url: String, reason: String },

    #[error("Response status: {status} for URL: {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse response from {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Received empty history for {currency}")]
    EmptyResult { currency: String },

    #[error("{provider} does not serve history for {currency}")]
    Unsupported { provider: String, currency: String },

    #[error("Cache error for {path}: {reason}")]
    Cache { path: String, reason: String },
}

impl RateError {
    pub fn parse(source_name: &str, reason: impl ToString) -> Self {
        RateError::Parse {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn missing(source_name: &str, field: &str) -> Self {
        Self::parse(source_name, format!("missing field `{field}`"))
    }
}

/// A pricing data source behind the uniform rate-fetching contract.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Registry name, also used as the cache file prefix.
    fn name(&self) -> &'static str;

    /// Fetches spot prices of the base asset. `ccy_hint` may be empty.
    async fn fetch_current_rates(&self, ccy_hint: &str) -> Result<Quote, RateError>;

    /// Fetches the full daily history for `ccy`. Never returns an empty series.
    async fn fetch_historical_series(&self, ccy: &str) -> Result<HistorySeries, RateError> {
        Err(RateError::Unsupported {
            provider: self.name().to_string(),
            currency: ccy.to_string(),
        })
    }

    /// Currencies with historical data. Spot-only providers keep the default.
    fn historical_currencies(&self) -> &'static [&'static str] {
        &[]
    }

    fn has_history_for(&self, ccy: &str) -> bool {
        self.historical_currencies().contains(&ccy)
    }

    /// Probes the spot endpoint for every 3-letter currency with a price.
    async fn list_currencies(&self) -> Result<BTreeSet<String>, RateError> {
        let rates = self.fetch_current_rates("").await?;
        Ok(rates
            .into_keys()
            .filter(|code| code.chars().count() == 3)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SpotOnly;

    #[async_trait]
    impl RateProvider for SpotOnly {
        fn name(&self) -> &'static str {
            "SpotOnly"
        }

        async fn fetch_current_rates(&self, _ccy_hint: &str) -> Result<Quote, RateError> {
            Ok(Quote::from([
                ("USD".to_string(), Decimal::ONE),
                ("EUR".to_string(), Decimal::from(2)),
                ("mXRG".to_string(), Decimal::from(1000)),
            ]))
        }
    }

    #[tokio::test]
    async fn test_list_currencies_keeps_three_letter_codes() {
        let currencies = SpotOnly.list_currencies().await.unwrap();
        assert_eq!(
            currencies.into_iter().collect::<Vec<_>>(),
            vec!["EUR".to_string(), "USD".to_string()]
        );
    }

    #[tokio::test]
    async fn test_spot_only_provider_has_no_history() {
        assert!(!SpotOnly.has_history_for("USD"));
        let err = SpotOnly.fetch_historical_series("USD").await.unwrap_err();
        assert_eq!(err.to_string(), "SpotOnly does not serve history for USD");
    }
}
