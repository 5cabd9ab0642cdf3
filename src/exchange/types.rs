//! Type definitions for venue market data and execution triggers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market state of one venue for one token pair, as seen at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueSnapshot {
    /// Venue identifier (e.g., "Uniswap")
    pub venue_id: String,
    /// Chronological closing prices, oldest first
    #[serde(default)]
    pub historical_prices: Vec<f64>,
    /// Available liquidity in quote units, must be positive
    pub liquidity: f64,
    /// Latest traded price
    pub current_price: f64,
}

impl VenueSnapshot {
    /// Create a snapshot without price history.
    pub fn new(venue_id: impl Into<String>, liquidity: f64, current_price: f64) -> Self {
        Self {
            venue_id: venue_id.into(),
            historical_prices: Vec::new(),
            liquidity,
            current_price,
        }
    }

    /// Attach the chronological price history.
    pub fn with_history(mut self, prices: Vec<f64>) -> Self {
        self.historical_prices = prices;
        self
    }
}

/// Market data payload returned by `/market_data/{venue}/{pair}`.
///
/// The venue is implied by the request path, so it is absent on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataResponse {
    #[serde(default)]
    pub historical_prices: Vec<f64>,
    pub liquidity: f64,
    pub current_price: f64,
}

impl MarketDataResponse {
    /// Bind the payload to the venue it was requested for.
    pub fn into_snapshot(self, venue_id: &str) -> VenueSnapshot {
        VenueSnapshot {
            venue_id: venue_id.to_string(),
            historical_prices: self.historical_prices,
            liquidity: self.liquidity,
            current_price: self.current_price,
        }
    }
}

/// Historical series payload returned by `/historical_data/{venue}/{pair}/{timeframe}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalData {
    #[serde(default)]
    pub prices: Vec<f64>,
}

/// Instruction to deploy a fraction of capital on one venue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionOrder {
    pub venue_id: String,
    pub token_pair: String,
    /// Fraction of total capital, in (0, cap]
    pub allocation: f64,
    /// Capital in USD behind this fraction, rounded to cents
    pub notional_usd: Decimal,
}
