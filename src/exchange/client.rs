//! HTTP market data client.

use crate::config::DataSourceConfig;
use crate::exchange::traits::MarketDataProvider;
use crate::exchange::types::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, instrument};

/// REST client for the venue market data service.
#[derive(Debug, Clone)]
pub struct VenueDataClient {
    http: Client,
    base_url: String,
}

impl VenueDataClient {
    /// Create a new client from configuration.
    pub fn new(config: &DataSourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the current market data for a token pair on one venue.
    #[instrument(skip(self))]
    pub async fn get_market_data(&self, venue: &str, token_pair: &str) -> Result<VenueSnapshot> {
        let url = format!("{}/market_data/{}/{}", self.base_url, venue, token_pair);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch market data")?;

        let data: MarketDataResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse market data response")?;

        debug!(
            %venue,
            %token_pair,
            points = data.historical_prices.len(),
            "Fetched market data"
        );

        Ok(data.into_snapshot(venue))
    }

    /// Get the historical price series for a token pair on one venue.
    #[instrument(skip(self))]
    pub async fn get_historical_data(
        &self,
        venue: &str,
        token_pair: &str,
        timeframe: &str,
    ) -> Result<HistoricalData> {
        let url = format!(
            "{}/historical_data/{}/{}/{}",
            self.base_url, venue, token_pair, timeframe
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch historical data")?;

        let data: HistoricalData = Self::check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse historical data response")?;

        debug!(%venue, %token_pair, points = data.prices.len(), "Fetched historical data");

        Ok(data)
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Market data API error {}: {}", status, body);
        }
        Ok(response)
    }
}

#[async_trait]
impl MarketDataProvider for VenueDataClient {
    async fn fetch_snapshot(&self, venue_id: &str, token_pair: &str) -> Result<VenueSnapshot> {
        self.get_market_data(venue_id, token_pair).await
    }

    async fn fetch_history(
        &self,
        venue_id: &str,
        token_pair: &str,
        timeframe: &str,
    ) -> Result<Vec<f64>> {
        Ok(self
            .get_historical_data(venue_id, token_pair, timeframe)
            .await?
            .prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> VenueDataClient {
        VenueDataClient::new(&DataSourceConfig {
            base_url: format!("{}/", server.uri()),
            timeout_secs: 5,
            timeframe: "1h".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_snapshot_binds_venue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/market_data/Uniswap/ETH-USDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "historical_prices": [1990.0, 2000.0, 2010.0],
                "liquidity": 5000000.0,
                "current_price": 2005.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = client_for(&server)
            .fetch_snapshot("Uniswap", "ETH-USDT")
            .await
            .unwrap();

        assert_eq!(snapshot.venue_id, "Uniswap");
        assert_eq!(snapshot.historical_prices.len(), 3);
        assert_eq!(snapshot.liquidity, 5_000_000.0);
        assert_eq!(snapshot.current_price, 2005.0);
    }

    #[tokio::test]
    async fn test_fetch_history_uses_timeframe_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/historical_data/SushiSwap/ETH-USDT/1h"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "prices": [1.0, 2.0, 3.0] })),
            )
            .mount(&server)
            .await;

        let prices = client_for(&server)
            .fetch_history("SushiSwap", "ETH-USDT", "1h")
            .await
            .unwrap();

        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/market_data/Uniswap/ETH-USDT"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_snapshot("Uniswap", "ETH-USDT")
            .await
            .unwrap_err();

        let msg = format!("{err:#}");
        assert!(msg.contains("503"), "unexpected error: {msg}");
        assert!(msg.contains("maintenance"), "unexpected error: {msg}");
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/historical_data/Uniswap/ETH-USDT/1h"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .fetch_history("Uniswap", "ETH-USDT", "1h")
            .await;

        assert!(result.is_err());
    }
}
