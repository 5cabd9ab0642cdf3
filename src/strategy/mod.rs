//! Allocation strategy.
//!
//! Contains the core logic for:
//! - Price estimation from venue history
//! - Max-Sharpe capital allocation under a per-venue cap
//! - The decision pipeline that ties fetching, scoring and execution together

mod cache;
mod estimator;
mod optimizer;
mod pipeline;

pub use cache::{AllocationCache, CacheKey, CacheStats};
pub use estimator::{FromSentinel, MovingAverageEstimator, PriceEstimate, PriceEstimator};
pub use optimizer::{project_capped_simplex, sharpe_ratio, AllocationOptimizer, SolveReport, SUM_TOLERANCE};
pub use pipeline::{
    DecisionPipeline, ExecutionResult, PipelineSettings, RunOutcome, VenueEvaluation,
};
