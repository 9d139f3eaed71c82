use crate::core::config::CoinPaprikaConfig;
use crate::core::{HistorySeries, Quote, RateError, RateProvider, decimal};
use crate::providers::util::{date_from_iso, get_json};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::instrument;

/// Quote currencies requested from the ticker endpoint.
const QUOTE_CCYS: &[&str] = &[
    "BTC", "ETH", "USD", "EUR", "PLN", "KRW", "GBP", "CAD", "JPY", "RUB", "TRY", "NZD", "AUD",
    "CHF", "UAH", "HKD", "SGD", "NGN", "PHP", "MXN", "BRL", "THB", "CLP", "CNY", "CZK", "DKK",
    "HUF", "IDR", "ILS", "INR", "MYR", "NOK", "PKR", "SEK", "TWD", "ZAR", "VND", "BOB", "COP",
    "PEN", "ARS", "ISK",
];

const HISTORY_CCYS: &[&str] = &["BTC", "USD"];

pub struct CoinPaprikaProvider {
    config: CoinPaprikaConfig,
    client: Client,
}

impl CoinPaprikaProvider {
    pub const NAME: &'static str = "CoinPaprika";

    pub fn new(config: CoinPaprikaConfig, client: Client) -> Self {
        CoinPaprikaProvider { config, client }
    }
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    quotes: HashMap<String, TickerQuote>,
}

#[derive(Debug, Deserialize)]
struct TickerQuote {
    price: Value,
}

#[derive(Debug, Deserialize)]
struct HistoricalTick {
    timestamp: String,
    price: Value,
}

#[async_trait]
impl RateProvider for CoinPaprikaProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(name = "CoinPaprikaSpot", skip(self))]
    async fn fetch_current_rates(&self, _ccy_hint: &str) -> Result<Quote, RateError> {
        let url = format!(
            "{}/v1/tickers/{}?quotes={}",
            self.config.api_url,
            self.config.ticker_id,
            QUOTE_CCYS.join(",")
        );
        let ticker: TickerResponse = get_json(&self.client, &url).await?;
        Ok(ticker
            .quotes
            .into_iter()
            .filter_map(|(ccy, quote)| decimal::from_json(&quote.price).map(|p| (ccy, p)))
            .collect())
    }

    #[instrument(name = "CoinPaprikaHistory", skip(self))]
    async fn fetch_historical_series(&self, ccy: &str) -> Result<HistorySeries, RateError> {
        let url = format!(
            "{}/v1/tickers/{}/historical?start={}&interval=24h&quote={}",
            self.config.api_url,
            self.config.ticker_id,
            self.config.history_start,
            ccy.to_lowercase()
        );
        let ticks: Vec<HistoricalTick> = get_json(&self.client, &url).await?;
        let series: HistorySeries = ticks
            .iter()
            .filter_map(|tick| {
                Some((
                    date_from_iso(&tick.timestamp)?,
                    decimal::from_json(&tick.price)?,
                ))
            })
            .collect();
        if series.is_empty() {
            return Err(RateError::EmptyResult {
                currency: ccy.to_string(),
            });
        }
        Ok(series)
    }

    fn historical_currencies(&self) -> &'static [&'static str] {
        HISTORY_CCYS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::http_client;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> CoinPaprikaProvider {
        let config = CoinPaprikaConfig {
            api_url: server.uri(),
            ..CoinPaprikaConfig::default()
        };
        CoinPaprikaProvider::new(config, http_client().unwrap())
    }

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tickers/xrg-ergon"))
            .and(query_param("quotes", QUOTE_CCYS.join(",")))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{
                    "id": "xrg-ergon",
                    "quotes": {
                        "USD": {"price": 0.00231, "volume_24h": 10.5},
                        "BTC": {"price": 3.4e-8},
                        "EUR": {"price": null}
                    }
                }"#,
            ))
            .mount(&mock_server)
            .await;

        let quote = provider(&mock_server).fetch_current_rates("USD").await.unwrap();
        assert_eq!(quote.len(), 2);
        assert_eq!(quote["USD"], Decimal::from_str("0.00231").unwrap());
        assert_eq!(quote["BTC"], Decimal::from_str("0.000000034").unwrap());
    }

    #[tokio::test]
    async fn test_malformed_quote_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tickers/xrg-ergon"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"error": "id not found"}"#))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server).fetch_current_rates("USD").await.unwrap_err();
        assert!(matches!(err, RateError::Parse { .. }));
        assert!(err.to_string().contains("missing field `quotes`"));
    }

    #[tokio::test]
    async fn test_history_uses_date_prefix() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tickers/xrg-ergon/historical"))
            .and(query_param("start", "2021-07-08"))
            .and(query_param("interval", "24h"))
            .and(query_param("quote", "usd"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"timestamp": "2021-07-08T00:00:00Z", "price": 0.05, "volume_24h": 1},
                    {"timestamp": "2021-07-09T00:00:00Z", "price": 0.048},
                    {"timestamp": "garbage", "price": 0.5}
                ]"#,
            ))
            .mount(&mock_server)
            .await;

        let series = provider(&mock_server)
            .fetch_historical_series("USD")
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series[&NaiveDate::from_ymd_opt(2021, 7, 9).unwrap()],
            Decimal::from_str("0.048").unwrap()
        );
    }

    #[tokio::test]
    async fn test_empty_history_is_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tickers/xrg-ergon/historical"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server)
            .fetch_historical_series("BTC")
            .await
            .unwrap_err();
        assert!(matches!(err, RateError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn test_history_currencies() {
        let provider =
            CoinPaprikaProvider::new(CoinPaprikaConfig::default(), http_client().unwrap());
        assert!(provider.has_history_for("USD"));
        assert!(!provider.has_history_for("EUR"));
    }
}
