//! In-memory market data for offline runs and tests.

use super::traits::MarketDataProvider;
use super::types::VenueSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Offline dataset layout.
///
/// ```json
/// {
///   "snapshots": [
///     {"venue_id": "Uniswap", "historical_prices": [..], "liquidity": 1e6, "current_price": 2000.0}
///   ],
///   "histories": {"Uniswap": [1990.0, 2000.0]}
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfflineDataset {
    #[serde(default)]
    pub snapshots: Vec<VenueSnapshot>,
    #[serde(default)]
    pub histories: HashMap<String, Vec<f64>>,
}

/// Market data provider backed by fixed per-venue data.
///
/// Snapshots and histories are keyed by venue only; the token pair is
/// accepted but not used for lookup.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    snapshots: Arc<RwLock<HashMap<String, VenueSnapshot>>>,
    histories: Arc<RwLock<HashMap<String, Vec<f64>>>>,
}

impl StaticMarketData {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a provider from an already parsed dataset.
    pub fn from_dataset(dataset: OfflineDataset) -> Self {
        let snapshots = dataset
            .snapshots
            .into_iter()
            .map(|s| (s.venue_id.clone(), s))
            .collect();

        Self {
            snapshots: Arc::new(RwLock::new(snapshots)),
            histories: Arc::new(RwLock::new(dataset.histories)),
        }
    }

    /// Load a dataset from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read offline dataset {}", path.display()))?;
        let dataset: OfflineDataset =
            serde_json::from_str(&raw).context("Failed to parse offline dataset")?;

        info!(
            path = %path.display(),
            venues = dataset.snapshots.len(),
            "Loaded offline market data"
        );

        Ok(Self::from_dataset(dataset))
    }

    /// Replace the snapshot for a venue.
    pub async fn set_snapshot(&self, snapshot: VenueSnapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.venue_id.clone(), snapshot);
    }

    /// Replace the forecasting history for a venue.
    pub async fn set_history(&self, venue_id: &str, prices: Vec<f64>) {
        self.histories
            .write()
            .await
            .insert(venue_id.to_string(), prices);
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    async fn fetch_snapshot(&self, venue_id: &str, token_pair: &str) -> Result<VenueSnapshot> {
        let snapshot = self
            .snapshots
            .read()
            .await
            .get(venue_id)
            .cloned()
            .with_context(|| format!("No market data for {} on {}", token_pair, venue_id))?;

        debug!(venue = %venue_id, %token_pair, "Served static snapshot");
        Ok(snapshot)
    }

    async fn fetch_history(
        &self,
        venue_id: &str,
        _token_pair: &str,
        _timeframe: &str,
    ) -> Result<Vec<f64>> {
        // A venue without a separate history forecasts from its snapshot prices.
        if let Some(prices) = self.histories.read().await.get(venue_id) {
            return Ok(prices.clone());
        }

        Ok(self
            .snapshots
            .read()
            .await
            .get(venue_id)
            .map(|s| s.historical_prices.clone())
            .unwrap_or_default())
    }
}
