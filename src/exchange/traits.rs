//! Venue-agnostic traits for market data and execution collaborators.
//!
//! The allocation core only talks to venues through these seams:
//! - Snapshot and history retrieval per venue
//! - Fire-and-forget execution triggers
//!
//! Implementations own their own transport details (timeouts, retries, auth).

use async_trait::async_trait;

use super::types::{ExecutionOrder, VenueSnapshot};

/// Source of per-venue market data.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch the current market snapshot of `token_pair` on `venue_id`.
    async fn fetch_snapshot(
        &self,
        venue_id: &str,
        token_pair: &str,
    ) -> anyhow::Result<VenueSnapshot>;

    /// Fetch the chronological price series used for forecasting.
    ///
    /// `timeframe` is the bar width understood by the venue (e.g., "1h").
    async fn fetch_history(
        &self,
        venue_id: &str,
        token_pair: &str,
        timeframe: &str,
    ) -> anyhow::Result<Vec<f64>>;
}

/// Receiver of allocation decisions.
///
/// The core decides whether and with what fraction to trade; how the trade
/// is carried out is entirely up to the implementation.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute(&self, order: &ExecutionOrder) -> anyhow::Result<()>;
}
