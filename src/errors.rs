//! Error taxonomy for the allocation core.
//!
//! Input problems are rejected before any numeric work starts. Transport
//! failures from external collaborators are carried through unchanged.
//! Infeasible allocations are an expected outcome, not a crash.

use thiserror::Error;

/// Malformed venue data handed to the risk scorer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskInputError {
    #[error("liquidity must be positive and finite, got {liquidity} on {venue}")]
    InvalidLiquidity { venue: String, liquidity: f64 },
    #[error("current price must not be negative, got {price} on {venue}")]
    NegativeCurrentPrice { venue: String, price: f64 },
    #[error("{field} is not a finite number on {venue}")]
    NonFinite { venue: String, field: &'static str },
    #[error("historical price #{index} must be positive, got {price} on {venue}")]
    InvalidHistoricalPrice {
        venue: String,
        index: usize,
        price: f64,
    },
}

/// Reasons the optimizer refuses to produce an allocation vector.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error("expected returns are empty")]
    EmptyInput,
    #[error("{returns} expected returns but {risks} risk scores")]
    LengthMismatch { returns: usize, risks: usize },
    #[error("{field}[{index}] is not a finite number")]
    NonFinite { field: &'static str, index: usize },
    #[error("risk score #{index} is negative: {value}")]
    NegativeRisk { index: usize, value: f64 },
    #[error("allocation cap must be in (0, 1], got {cap}")]
    InvalidCap { cap: f64 },
    /// No vector satisfies both the full-deployment and the per-venue cap constraints.
    #[error("no feasible allocation: {reason}")]
    Infeasible { reason: String },
}

impl AllocationError {
    /// True when the solve yielded no allocation rather than bad input.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, AllocationError::Infeasible { .. })
    }
}

/// Pipeline stage that talks to an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Snapshot,
    History,
    Estimate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Snapshot => write!(f, "snapshot fetch"),
            Stage::History => write!(f, "history fetch"),
            Stage::Estimate => write!(f, "price estimate"),
        }
    }
}

/// Run-level failure of the decision pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no venues configured")]
    NoVenues,
    #[error("{stage} failed for {venue}: {source:#}")]
    Transport {
        venue: String,
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    RiskInput(#[from] RiskInputError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}
