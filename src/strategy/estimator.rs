//! Price estimation seam and a moving-average baseline.

use crate::utils::stats::mean;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Forecast of the next price of a token pair on one venue.
///
/// `None` means the estimator had nothing to say; it is never a price of 0.
pub type PriceEstimate = Option<f64>;

/// Conversion from estimators that report "no forecast" as `0.0`.
pub trait FromSentinel {
    fn from_sentinel(value: f64) -> Self;
}

impl FromSentinel for PriceEstimate {
    fn from_sentinel(value: f64) -> Self {
        if value == 0.0 {
            None
        } else {
            Some(value)
        }
    }
}

/// Source of price forecasts.
#[async_trait]
pub trait PriceEstimator: Send + Sync {
    /// Forecast the next price from a chronological history.
    async fn estimate(
        &self,
        venue_id: &str,
        token_pair: &str,
        history: &[f64],
    ) -> Result<PriceEstimate>;
}

/// Mean of the trailing `window` prices.
///
/// Series shorter than the window produce no estimate.
#[derive(Debug, Clone)]
pub struct MovingAverageEstimator {
    window: usize,
}

impl MovingAverageEstimator {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for MovingAverageEstimator {
    fn default() -> Self {
        Self::new(60)
    }
}

#[async_trait]
impl PriceEstimator for MovingAverageEstimator {
    async fn estimate(
        &self,
        venue_id: &str,
        token_pair: &str,
        history: &[f64],
    ) -> Result<PriceEstimate> {
        if history.len() < self.window {
            debug!(
                venue = %venue_id,
                %token_pair,
                points = history.len(),
                window = self.window,
                "History too short for an estimate"
            );
            return Ok(None);
        }

        let tail = &history[history.len() - self.window..];
        let estimate = mean(tail);

        debug!(venue = %venue_id, %token_pair, estimate, "Estimated price");
        Ok(Some(estimate))
    }
}
