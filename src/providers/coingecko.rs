use crate::core::config::CoinGeckoConfig;
use crate::core::{HistorySeries, Quote, RateError, RateProvider, decimal};
use crate::providers::util::{date_from_millis, get_json};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

const HISTORY_CCYS: &[&str] = &[
    "AED", "ARS", "AUD", "BTD", "BHD", "BMD", "BRL", "BTC", "CAD", "CHF", "CLP", "CNY", "CZK",
    "DKK", "ETH", "EUR", "GBP", "HKD", "HUF", "IDR", "ILS", "INR", "JPY", "KRW", "KWD", "LKR",
    "LTC", "MMK", "MXH", "MYR", "NOK", "NZD", "PHP", "PKR", "PLN", "RUB", "SAR", "SEK", "SGD",
    "THB", "TRY", "TWD", "USD", "VEF", "VND", "XAG", "XAU", "XDR", "ZAR",
];

pub struct CoinGeckoProvider {
    config: CoinGeckoConfig,
    client: Client,
}

impl CoinGeckoProvider {
    pub const NAME: &'static str = "CoinGecko";

    pub fn new(config: CoinGeckoConfig, client: Client) -> Self {
        CoinGeckoProvider { config, client }
    }

    /// Price of one base-asset unit in `coin_id`, or one when the coin is the base asset.
    async fn reference_price(&self) -> Result<Decimal, RateError> {
        let Some(explorer_url) = &self.config.explorer_url else {
            return Ok(Decimal::ONE);
        };
        let url = format!("{explorer_url}/ext/summary");
        let summary: ExplorerSummary = get_json(&self.client, &url).await?;
        summary
            .data
            .first()
            .and_then(|entry| decimal::from_json(&entry.last_price))
            .ok_or_else(|| RateError::missing(&url, "data[0].lastPrice"))
    }
}

#[derive(Debug, Deserialize)]
struct CoinResponse {
    market_data: MarketData,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    current_price: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ExplorerSummary {
    data: Vec<ExplorerEntry>,
}

#[derive(Debug, Deserialize)]
struct ExplorerEntry {
    #[serde(rename = "lastPrice")]
    last_price: Value,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, Value)>,
}

#[async_trait]
impl RateProvider for CoinGeckoProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(name = "CoinGeckoSpot", skip(self))]
    async fn fetch_current_rates(&self, _ccy_hint: &str) -> Result<Quote, RateError> {
        let url = format!(
            "{}/api/v3/coins/{}?localization=false&sparkline=false",
            self.config.api_url, self.config.coin_id
        );
        let coin: CoinResponse = get_json(&self.client, &url).await?;
        let reference = self.reference_price().await?;

        let mut quote: Quote = coin
            .market_data
            .current_price
            .iter()
            .filter_map(|(ccy, price)| {
                let scaled = decimal::from_json(price)?.checked_mul(reference);
                if scaled.is_none() {
                    warn!("Skipping {} quote out of range", ccy);
                }
                Some((ccy.to_uppercase(), scaled?))
            })
            .collect();
        quote.insert(self.config.base_symbol.clone(), Decimal::ONE);
        quote.insert(format!("m{}", self.config.base_symbol), Decimal::from(1000));
        debug!("Received {} CoinGecko quotes", quote.len());
        Ok(quote)
    }

    #[instrument(name = "CoinGeckoHistory", skip(self))]
    async fn fetch_historical_series(&self, ccy: &str) -> Result<HistorySeries, RateError> {
        let url = format!(
            "{}/api/v3/coins/{}/market_chart?vs_currency={}&days=max",
            self.config.api_url, self.config.coin_id, ccy
        );
        let chart: MarketChart = get_json(&self.client, &url).await?;
        let series: HistorySeries = chart
            .prices
            .iter()
            .filter_map(|(millis, price)| {
                Some((date_from_millis(*millis as i64)?, decimal::from_json(price)?))
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
    use std::str::FromStr;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COIN_JSON: &str = r#"{
        "id": "tether",
        "market_data": {
            "current_price": {"usd": 1.0, "eur": 0.92, "jpy": 151, "bits": null}
        }
    }"#;

    async fn mount(server: &MockServer, request_path: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    fn provider(server: &MockServer, explorer: bool) -> CoinGeckoProvider {
        let config = CoinGeckoConfig {
            api_url: server.uri(),
            explorer_url: explorer.then(|| server.uri()),
            ..CoinGeckoConfig::default()
        };
        CoinGeckoProvider::new(config, http_client().unwrap())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_spot_rates_scaled_by_explorer_price() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/api/v3/coins/tether", 200, COIN_JSON).await;
        mount(
            &mock_server,
            "/ext/summary",
            200,
            r#"{"data": [{"lastPrice": 0.002}]}"#,
        )
        .await;

        let quote = provider(&mock_server, true)
            .fetch_current_rates("USD")
            .await
            .unwrap();

        assert_eq!(quote["USD"], dec("0.002"));
        assert_eq!(quote["EUR"], dec("0.00184"));
        assert_eq!(quote["JPY"], dec("0.302"));
        assert!(!quote.contains_key("BITS"));
        assert_eq!(quote["XRG"], Decimal::ONE);
        assert_eq!(quote["mXRG"], Decimal::from(1000));
    }

    #[tokio::test]
    async fn test_spot_rates_without_explorer() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/api/v3/coins/tether", 200, COIN_JSON).await;

        let quote = provider(&mock_server, false)
            .fetch_current_rates("")
            .await
            .unwrap();
        assert_eq!(quote["EUR"], dec("0.92"));
    }

    #[tokio::test]
    async fn test_out_of_range_price_is_skipped() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            "/api/v3/coins/tether",
            200,
            r#"{"market_data": {"current_price": {"usd": 5e28, "eur": 1}}}"#,
        )
        .await;
        mount(&mock_server, "/ext/summary", 200, r#"{"data": [{"lastPrice": 2}]}"#).await;

        let quote = provider(&mock_server, true)
            .fetch_current_rates("USD")
            .await
            .unwrap();
        assert!(!quote.contains_key("USD"));
        assert_eq!(quote["EUR"], Decimal::from(2));
        assert_eq!(quote["XRG"], Decimal::ONE);
    }

    #[tokio::test]
    async fn test_explorer_without_price_is_parse_error() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/api/v3/coins/tether", 200, COIN_JSON).await;
        mount(&mock_server, "/ext/summary", 200, r#"{"data": []}"#).await;

        let err = provider(&mock_server, true)
            .fetch_current_rates("USD")
            .await
            .unwrap_err();
        assert!(matches!(err, RateError::Parse { .. }));
        assert!(err.to_string().contains("data[0].lastPrice"));
    }

    #[tokio::test]
    async fn test_server_error_is_status_error() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/api/v3/coins/tether", 500, "oops").await;

        let err = provider(&mock_server, false)
            .fetch_current_rates("USD")
            .await
            .unwrap_err();
        assert!(matches!(err, RateError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_history_maps_timestamps_to_dates() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/coins/tether/market_chart"))
            .and(query_param("vs_currency", "EUR"))
            .and(query_param("days", "max"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"prices": [[1625702400000, 0.84], [1625788800000, 0.845]]}"#,
            ))
            .mount(&mock_server)
            .await;

        let series = provider(&mock_server, false)
            .fetch_historical_series("EUR")
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series[&NaiveDate::from_ymd_opt(2021, 7, 8).unwrap()],
            dec("0.84")
        );
        assert_eq!(
            series[&NaiveDate::from_ymd_opt(2021, 7, 9).unwrap()],
            dec("0.845")
        );
    }

    #[tokio::test]
    async fn test_empty_history_is_rejected() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            "/api/v3/coins/tether/market_chart",
            200,
            r#"{"prices": []}"#,
        )
        .await;

        let err = provider(&mock_server, false)
            .fetch_historical_series("USD")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Received empty history for USD");
    }

    #[tokio::test]
    async fn test_list_currencies_skips_long_codes() {
        let mock_server = MockServer::start().await;
        mount(&mock_server, "/api/v3/coins/tether", 200, COIN_JSON).await;

        let currencies = provider(&mock_server, false).list_currencies().await.unwrap();
        assert_eq!(
            currencies.into_iter().collect::<Vec<_>>(),
            vec!["EUR", "JPY", "USD", "XRG"]
        );
    }
}
