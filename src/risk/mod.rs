//! Risk assessment for venue allocation.
//!
//! Scores each venue from:
//! - Return volatility of its recent price history
//! - Inverse liquidity
//! - Divergence between the current price and the forecast

mod scorer;

pub use scorer::{is_trade_safe, RiskBreakdown, RiskScore, RiskScorer, RiskWeights};
