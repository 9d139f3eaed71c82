use crate::core::config::BitstampYadioConfig;
use crate::core::{Quote, RateError, RateProvider, decimal};
use crate::providers::util::get_json;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::instrument;

/// Spot-only ARS quotes: Bitstamp's USD price converted with Yadio's ARS rate.
pub struct BitstampYadioProvider {
    config: BitstampYadioConfig,
    client: Client,
}

impl BitstampYadioProvider {
    pub const NAME: &'static str = "BitstampYadio";

    pub fn new(config: BitstampYadioConfig, client: Client) -> Self {
        BitstampYadioProvider { config, client }
    }
}

#[derive(Debug, Deserialize)]
struct BitstampTicker {
    last: Value,
}

#[derive(Debug, Deserialize)]
struct YadioRates {
    #[serde(rename = "ARS")]
    ars: HashMap<String, Value>,
}

#[async_trait]
impl RateProvider for BitstampYadioProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(name = "BitstampYadioSpot", skip(self))]
    async fn fetch_current_rates(&self, _ccy_hint: &str) -> Result<Quote, RateError> {
        let ticker_url = format!(
            "{}/api/v2/ticker/{}",
            self.config.bitstamp_url, self.config.pair
        );
        let ticker: BitstampTicker = get_json(&self.client, &ticker_url).await?;
        let usd = decimal::from_json(&ticker.last)
            .ok_or_else(|| RateError::missing(&ticker_url, "last"))?;

        let rates_url = format!("{}/exrates/ARS", self.config.yadio_url);
        let rates: YadioRates = get_json(&self.client, &rates_url).await?;
        let ars_in_usd = rates
            .ars
            .get("USD")
            .and_then(decimal::from_json)
            .ok_or_else(|| RateError::missing(&rates_url, "ARS.USD"))?;

        let ars = usd
            .checked_div(ars_in_usd)
            .ok_or_else(|| RateError::parse(&rates_url, "ARS.USD must be non-zero"))?;
        Ok(Quote::from([("ARS".to_string(), ars)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::http_client;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_server(ticker: &str, rates: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ticker/bchusd"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ticker))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/exrates/ARS"))
            .respond_with(ResponseTemplate::new(200).set_body_string(rates))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(server: &MockServer) -> BitstampYadioProvider {
        let config = BitstampYadioConfig {
            bitstamp_url: server.uri(),
            yadio_url: server.uri(),
            ..BitstampYadioConfig::default()
        };
        BitstampYadioProvider::new(config, http_client().unwrap())
    }

    #[tokio::test]
    async fn test_ars_quote() {
        let server = mock_server(
            r#"{"last": "450.00", "high": "460.00"}"#,
            r#"{"ARS": {"USD": 0.001, "EUR": 0.0009}, "base": "ARS"}"#,
        )
        .await;

        let quote = provider(&server).fetch_current_rates("ARS").await.unwrap();
        assert_eq!(quote.len(), 1);
        assert_eq!(quote["ARS"], Decimal::from_str("450000").unwrap());
    }

    #[tokio::test]
    async fn test_zero_rate_is_parse_error() {
        let server = mock_server(r#"{"last": "450.00"}"#, r#"{"ARS": {"USD": 0}}"#).await;

        let err = provider(&server).fetch_current_rates("ARS").await.unwrap_err();
        assert!(matches!(err, RateError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_missing_usd_rate() {
        let server = mock_server(r#"{"last": "450.00"}"#, r#"{"ARS": {"EUR": 0.0009}}"#).await;

        let err = provider(&server).fetch_current_rates("ARS").await.unwrap_err();
        assert!(err.to_string().contains("missing field `ARS.USD`"));
    }

    #[tokio::test]
    async fn test_no_history() {
        let server = MockServer::start().await;
        let provider = provider(&server);
        assert!(provider.historical_currencies().is_empty());
        assert!(matches!(
            provider.fetch_historical_series("ARS").await,
            Err(RateError::Unsupported { .. })
        ));
    }
}
