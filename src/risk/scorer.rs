//! Per-venue risk scoring.
//!
//! A venue's risk is a weighted sum of three terms:
//!
//! ```text
//! risk = w_vol * σ(simple returns) + w_liq * (1 / liquidity) + w_div * |current - estimate| / current
//! ```
//!
//! Normal inputs land near [0, 1]; the score is not clamped.

use crate::config::RiskConfig;
use crate::errors::RiskInputError;
use crate::exchange::VenueSnapshot;
use crate::utils::stats::{simple_returns, std_dev};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Weights of the three risk terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskWeights {
    pub volatility: f64,
    pub liquidity: f64,
    pub divergence: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            volatility: 0.4,
            liquidity: 0.3,
            divergence: 0.3,
        }
    }
}

/// Non-negative risk score of one venue; larger is riskier.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct RiskScore(f64);

impl RiskScore {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// The individual terms behind a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskBreakdown {
    /// Standard deviation of simple returns (0 with fewer than two prices)
    pub volatility: f64,
    /// `1 / liquidity`
    pub liquidity_term: f64,
    /// Relative gap between current price and estimate (0 when current price is 0)
    pub divergence_term: f64,
    pub score: RiskScore,
}

/// `true` iff `score < threshold`; a score equal to the threshold is unsafe.
pub fn is_trade_safe(score: f64, threshold: f64) -> bool {
    score < threshold
}

/// Scores venues from their market snapshot and a price estimate.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    weights: RiskWeights,
    threshold: f64,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(RiskWeights::default(), 0.05)
    }
}

impl RiskScorer {
    /// Create a scorer with explicit weights and safety threshold.
    pub fn new(weights: RiskWeights, threshold: f64) -> Self {
        Self { weights, threshold }
    }

    /// Create a scorer from the risk section of the configuration.
    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(
            RiskWeights {
                volatility: config.volatility_weight,
                liquidity: config.liquidity_weight,
                divergence: config.divergence_weight,
            },
            config.threshold,
        )
    }

    pub fn weights(&self) -> RiskWeights {
        self.weights
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Risk score of `snapshot` given a price estimate for the same venue.
    pub fn assess_risk(
        &self,
        snapshot: &VenueSnapshot,
        price_estimate: f64,
    ) -> Result<RiskScore, RiskInputError> {
        Ok(self.breakdown(snapshot, price_estimate)?.score)
    }

    /// Compute every term of the risk score.
    pub fn breakdown(
        &self,
        snapshot: &VenueSnapshot,
        price_estimate: f64,
    ) -> Result<RiskBreakdown, RiskInputError> {
        validate(snapshot, price_estimate)?;

        let volatility = if snapshot.historical_prices.len() >= 2 {
            std_dev(&simple_returns(&snapshot.historical_prices))
        } else {
            0.0
        };

        let liquidity_term = 1.0 / snapshot.liquidity;

        let divergence_term = if snapshot.current_price != 0.0 {
            (snapshot.current_price - price_estimate).abs() / snapshot.current_price
        } else {
            0.0
        };

        let score = self.weights.volatility * volatility
            + self.weights.liquidity * liquidity_term
            + self.weights.divergence * divergence_term;

        debug!(
            venue = %snapshot.venue_id,
            volatility,
            liquidity_term,
            divergence_term,
            risk = score,
            "Calculated risk score"
        );

        Ok(RiskBreakdown {
            volatility,
            liquidity_term,
            divergence_term,
            score: RiskScore(score),
        })
    }

    /// Whether `score` is below this scorer's threshold.
    pub fn is_safe(&self, score: RiskScore) -> bool {
        is_trade_safe(score.value(), self.threshold)
    }
}

fn validate(snapshot: &VenueSnapshot, price_estimate: f64) -> Result<(), RiskInputError> {
    let venue = || snapshot.venue_id.clone();

    if !(snapshot.liquidity.is_finite() && snapshot.liquidity > 0.0) {
        return Err(RiskInputError::InvalidLiquidity {
            venue: venue(),
            liquidity: snapshot.liquidity,
        });
    }

    if !snapshot.current_price.is_finite() {
        return Err(RiskInputError::NonFinite {
            venue: venue(),
            field: "current_price",
        });
    }

    if snapshot.current_price < 0.0 {
        return Err(RiskInputError::NegativeCurrentPrice {
            venue: venue(),
            price: snapshot.current_price,
        });
    }

    if !price_estimate.is_finite() {
        return Err(RiskInputError::NonFinite {
            venue: venue(),
            field: "price_estimate",
        });
    }

    if let Some((index, &price)) = snapshot
        .historical_prices
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.is_finite() && **p > 0.0))
    {
        return Err(RiskInputError::InvalidHistoricalPrice {
            venue: venue(),
            index,
            price,
        });
    }

    Ok(())
}
