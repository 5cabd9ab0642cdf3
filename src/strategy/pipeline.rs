//! Decision pipeline: fetch → estimate → score → optimize → execute.
//!
//! One ordered `Vec<VenueEvaluation>` flows through every stage, so a venue's
//! snapshot, estimate, risk and allocation always travel together.

use crate::config::Config;
use crate::errors::{PipelineError, Stage};
use crate::exchange::{ExecutionOrder, MarketDataProvider, TradeExecutor, VenueSnapshot};
use crate::risk::{RiskScore, RiskScorer};
use crate::strategy::estimator::{PriceEstimate, PriceEstimator};
use crate::strategy::optimizer::AllocationOptimizer;
use crate::utils::decimal::notional_for;
use futures_util::future::{join_all, try_join_all};
use futures_util::TryFutureExt;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Everything the pipeline knows about one venue during a run.
#[derive(Debug, Clone, Serialize)]
pub struct VenueEvaluation {
    pub snapshot: VenueSnapshot,
    /// Length of the series handed to the estimator
    pub history_len: usize,
    pub estimate: PriceEstimate,
    /// Set for venues with an estimate once scoring has run
    pub risk: Option<RiskScore>,
    /// Fraction of capital; 0 for venues left out of the solve
    pub allocation: f64,
}

impl VenueEvaluation {
    pub fn venue_id(&self) -> &str {
        &self.snapshot.venue_id
    }
}

/// Result of one execution trigger.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub order: ExecutionOrder,
    pub success: bool,
    pub error: Option<String>,
}

/// How a pipeline run ended.
#[derive(Debug, Clone, Serialize)]
pub enum RunOutcome {
    /// No venue produced a price estimate; nothing was scored or executed.
    NoEstimates { evaluations: Vec<VenueEvaluation> },
    /// The optimizer found no feasible allocation; nothing was executed.
    NoAllocation {
        reason: String,
        evaluations: Vec<VenueEvaluation>,
    },
    /// An allocation was computed and triggers were sent.
    Executed {
        evaluations: Vec<VenueEvaluation>,
        executions: Vec<ExecutionResult>,
        /// Venues with a positive allocation held back by the risk threshold
        skipped: Vec<String>,
    },
}

impl RunOutcome {
    pub fn evaluations(&self) -> &[VenueEvaluation] {
        match self {
            RunOutcome::NoEstimates { evaluations }
            | RunOutcome::NoAllocation { evaluations, .. }
            | RunOutcome::Executed { evaluations, .. } => evaluations,
        }
    }

    /// Allocation per venue in configured order.
    pub fn allocations(&self) -> Vec<f64> {
        self.evaluations().iter().map(|e| e.allocation).collect()
    }
}

/// Static settings of a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Venues evaluated, in fixed order
    pub venues: Vec<String>,
    pub timeframe: String,
    /// Per-venue allocation cap
    pub max_allocation: f64,
    pub capital_usd: Decimal,
    pub enforce_risk_threshold: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            venues: config.venues.clone(),
            timeframe: config.data_source.timeframe.clone(),
            max_allocation: config.optimizer.max_allocation,
            capital_usd: config.execution.capital_usd,
            enforce_risk_threshold: config.execution.enforce_risk_threshold,
        }
    }
}

/// Orchestrates one allocation decision per run.
pub struct DecisionPipeline {
    market_data: Arc<dyn MarketDataProvider>,
    estimator: Arc<dyn PriceEstimator>,
    executor: Arc<dyn TradeExecutor>,
    scorer: RiskScorer,
    optimizer: Arc<AllocationOptimizer>,
    settings: PipelineSettings,
}

impl DecisionPipeline {
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        estimator: Arc<dyn PriceEstimator>,
        executor: Arc<dyn TradeExecutor>,
        scorer: RiskScorer,
        optimizer: Arc<AllocationOptimizer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            market_data,
            estimator,
            executor,
            scorer,
            optimizer,
            settings,
        }
    }

    /// Wire a pipeline with scorer, optimizer and settings taken from `config`.
    pub fn from_config(
        config: &Config,
        market_data: Arc<dyn MarketDataProvider>,
        estimator: Arc<dyn PriceEstimator>,
        executor: Arc<dyn TradeExecutor>,
    ) -> Self {
        Self::new(
            market_data,
            estimator,
            executor,
            RiskScorer::from_config(&config.risk),
            Arc::new(AllocationOptimizer::from_config(&config.optimizer)),
            PipelineSettings::from_config(config),
        )
    }

    pub fn optimizer(&self) -> &Arc<AllocationOptimizer> {
        &self.optimizer
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one decision for `token_pair`.
    ///
    /// Transport failures abort the run. A run without any estimate or
    /// without a feasible allocation ends early with `Ok`.
    #[instrument(skip(self), fields(venues = self.settings.venues.len()))]
    pub async fn run(&self, token_pair: &str) -> Result<RunOutcome, PipelineError> {
        if self.settings.venues.is_empty() {
            return Err(PipelineError::NoVenues);
        }

        info!("Starting allocation run");

        let fetches = self
            .settings
            .venues
            .iter()
            .map(|venue| self.evaluate_venue(venue, token_pair));
        let mut evaluations = try_join_all(fetches).await?;

        if evaluations.iter().all(|e| e.estimate.is_none()) {
            warn!("No venue produced a price estimate, skipping allocation");
            return Ok(RunOutcome::NoEstimates { evaluations });
        }

        let mut estimated = Vec::new();
        let mut expected_returns = Vec::new();
        let mut risks = Vec::new();

        for (index, evaluation) in evaluations.iter_mut().enumerate() {
            let Some(estimate) = evaluation.estimate else {
                continue;
            };

            let risk = self.scorer.assess_risk(&evaluation.snapshot, estimate)?;
            info!(venue = %evaluation.venue_id(), estimate, risk = risk.value(), "Scored venue");

            evaluation.risk = Some(risk);
            estimated.push(index);
            expected_returns.push(estimate);
            risks.push(risk.value());
        }

        let weights = match self.optimizer.optimize_allocation(
            &expected_returns,
            &risks,
            self.settings.max_allocation,
        ) {
            Ok(weights) => weights,
            Err(err) if err.is_infeasible() => {
                warn!(error = %err, "No feasible allocation, skipping execution");
                return Ok(RunOutcome::NoAllocation {
                    reason: err.to_string(),
                    evaluations,
                });
            }
            Err(err) => return Err(err.into()),
        };

        for (index, weight) in estimated.into_iter().zip(weights) {
            evaluations[index].allocation = weight;
        }

        let (executions, skipped) = self.execute(token_pair, &evaluations).await;

        info!(
            triggered = executions.len(),
            failed = executions.iter().filter(|r| !r.success).count(),
            skipped = skipped.len(),
            "Allocation run complete"
        );

        Ok(RunOutcome::Executed {
            evaluations,
            executions,
            skipped,
        })
    }

    /// Fetch snapshot and history for one venue, then ask for an estimate.
    async fn evaluate_venue(
        &self,
        venue: &str,
        token_pair: &str,
    ) -> Result<VenueEvaluation, PipelineError> {
        let transport = move |stage: Stage| {
            move |source: anyhow::Error| PipelineError::Transport {
                venue: venue.to_string(),
                stage,
                source,
            }
        };

        let snapshot = self
            .market_data
            .fetch_snapshot(venue, token_pair)
            .map_err(transport(Stage::Snapshot));
        let history = self
            .market_data
            .fetch_history(venue, token_pair, &self.settings.timeframe)
            .map_err(transport(Stage::History));
        let (snapshot, history) = tokio::try_join!(snapshot, history)?;

        let estimate = self
            .estimator
            .estimate(venue, token_pair, &history)
            .await
            .map_err(transport(Stage::Estimate))?;

        Ok(VenueEvaluation {
            snapshot,
            history_len: history.len(),
            estimate,
            risk: None,
            allocation: 0.0,
        })
    }

    /// Trigger execution for every venue with a positive allocation.
    async fn execute(
        &self,
        token_pair: &str,
        evaluations: &[VenueEvaluation],
    ) -> (Vec<ExecutionResult>, Vec<String>) {
        let mut orders = Vec::new();
        let mut skipped = Vec::new();

        for evaluation in evaluations.iter().filter(|e| e.allocation > 0.0) {
            if self.settings.enforce_risk_threshold {
                if let Some(risk) = evaluation.risk.filter(|r| !self.scorer.is_safe(*r)) {
                    warn!(
                        venue = %evaluation.venue_id(),
                        risk = risk.value(),
                        threshold = self.scorer.threshold(),
                        "Risk above threshold, not executing"
                    );
                    skipped.push(evaluation.venue_id().to_string());
                    continue;
                }
            }

            orders.push(ExecutionOrder {
                venue_id: evaluation.venue_id().to_string(),
                token_pair: token_pair.to_string(),
                allocation: evaluation.allocation,
                notional_usd: notional_for(self.settings.capital_usd, evaluation.allocation),
            });
        }

        for order in &orders {
            info!(
                venue = %order.venue_id,
                allocation = order.allocation,
                notional_usd = %order.notional_usd,
                "Triggering execution"
            );
        }

        let outcomes = join_all(orders.iter().map(|order| self.executor.execute(order))).await;

        let results = orders
            .into_iter()
            .zip(outcomes)
            .map(|(order, outcome)| match outcome {
                Ok(()) => ExecutionResult {
                    order,
                    success: true,
                    error: None,
                },
                Err(e) => {
                    error!(venue = %order.venue_id, error = %e, "Execution trigger failed");
                    ExecutionResult {
                        order,
                        success: false,
                        error: Some(format!("{e:#}")),
                    }
                }
            })
            .collect();

        (results, skipped)
    }
}
