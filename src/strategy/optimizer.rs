//! Constrained max-Sharpe allocation across venues.
//!
//! Solves
//!
//! ```text
//! maximize   Σ wᵢ·rᵢ / sqrt(Σ riskᵢ·wᵢ²)
//! subject to Σ wᵢ = 1,  0 ≤ wᵢ ≤ cap
//! ```
//!
//! Risks act as a diagonal variance proxy (no cross terms). A zero
//! denominator scores 0. The solver is projected gradient descent on the
//! negative ratio with Armijo backtracking, started from the uniform
//! allocation. Every iterate is projected onto the capped simplex, so the
//! returned point is feasible even when the iteration budget runs out.

use crate::config::OptimizerConfig;
use crate::errors::AllocationError;
use crate::strategy::cache::{AllocationCache, CacheKey, CacheStats};
use crate::utils::stats::dot;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Allowed deviation of `Σw` from 1.
pub const SUM_TOLERANCE: f64 = 1e-6;

/// Sufficient-decrease constant of the Armijo condition.
const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const PROJECTION_ITERATIONS: usize = 200;
const MIN_STEP_MOVEMENT: f64 = 1e-12;

/// Outcome of one solver run.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// Allocation in input order
    pub weights: Vec<f64>,
    /// Sharpe-like ratio at `weights`
    pub sharpe: f64,
    /// Gradient iterations performed
    pub iterations: usize,
    /// False when the iteration budget ran out first
    pub converged: bool,
}

/// Allocates capital across venues and memoizes solves by exact input.
///
/// Safe to share across concurrent pipeline runs; the cache sits behind a mutex.
#[derive(Debug)]
pub struct AllocationOptimizer {
    max_iterations: usize,
    tolerance: f64,
    cache: Mutex<AllocationCache>,
}

impl Default for AllocationOptimizer {
    fn default() -> Self {
        Self::from_config(&OptimizerConfig::default())
    }
}

impl AllocationOptimizer {
    /// Create an optimizer.
    ///
    /// # Arguments
    /// * `max_iterations` - Gradient iteration budget per solve
    /// * `tolerance` - Relative objective improvement that counts as converged
    /// * `cache_capacity` - Memoized solves kept (0 disables the cache)
    pub fn new(max_iterations: usize, tolerance: f64, cache_capacity: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            tolerance,
            cache: Mutex::new(AllocationCache::new(cache_capacity)),
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.max_iterations, config.tolerance, config.cache_capacity)
    }

    /// Allocation vector maximizing the Sharpe-like ratio under the cap.
    ///
    /// Identical `(expected_returns, risks, cap)` inputs return the identical
    /// vector, from the cache when it still holds the entry.
    pub fn optimize_allocation(
        &self,
        expected_returns: &[f64],
        risks: &[f64],
        cap: f64,
    ) -> Result<Vec<f64>, AllocationError> {
        validate(expected_returns, risks, cap)?;

        let key = CacheKey::new(expected_returns, risks, cap);
        if let Some(weights) = self.lock_cache().get(&key) {
            debug!(allocation = ?weights, "Allocation served from cache");
            return Ok(weights);
        }

        let report = self.run_solver(expected_returns, risks, cap);
        check_feasible(&report.weights, cap)?;

        if !report.converged {
            warn!(
                iterations = report.iterations,
                sharpe = report.sharpe,
                "Iteration budget exhausted, using best feasible allocation"
            );
        }

        info!(
            allocation = ?report.weights,
            sharpe = report.sharpe,
            iterations = report.iterations,
            "Optimized allocation"
        );

        self.lock_cache().insert(key, report.weights.clone());
        Ok(report.weights)
    }

    /// Run the solver without touching the cache.
    pub fn solve(
        &self,
        expected_returns: &[f64],
        risks: &[f64],
        cap: f64,
    ) -> Result<SolveReport, AllocationError> {
        validate(expected_returns, risks, cap)?;
        let report = self.run_solver(expected_returns, risks, cap);
        check_feasible(&report.weights, cap)?;
        Ok(report)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    fn lock_cache(&self) -> MutexGuard<'_, AllocationCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_solver(&self, returns: &[f64], risks: &[f64], cap: f64) -> SolveReport {
        let n = returns.len();
        let mut weights = project_capped_simplex(&vec![1.0 / n as f64; n], cap);
        let mut value = objective(&weights, returns, risks);
        let mut step: Option<f64> = None;
        let mut iterations = 0;
        let mut converged = false;

        for iteration in 1..=self.max_iterations {
            iterations = iteration;

            let grad = gradient(&weights, returns, risks);
            let grad_norm = grad.iter().fold(0.0_f64, |acc, g| acc.max(g.abs()));
            if !grad_norm.is_finite() {
                break;
            }
            if grad_norm == 0.0 {
                converged = true;
                break;
            }

            // First trial moves the largest coordinate by a full unit
            let mut trial = step.map_or(1.0 / grad_norm, |s| s * 2.0);
            let mut accepted = None;

            for _ in 0..MAX_BACKTRACKS {
                let shifted: Vec<f64> = weights
                    .iter()
                    .zip(&grad)
                    .map(|(w, g)| w - trial * g)
                    .collect();
                let candidate = project_capped_simplex(&shifted, cap);
                let candidate_value = objective(&candidate, returns, risks);

                let delta: Vec<f64> = weights
                    .iter()
                    .zip(&candidate)
                    .map(|(w, c)| w - c)
                    .collect();
                let predicted = dot(&grad, &delta);

                if candidate_value <= value - ARMIJO * predicted {
                    accepted = Some((candidate, candidate_value));
                    break;
                }
                trial *= 0.5;
            }

            // No descent direction left inside the feasible set
            let Some((candidate, candidate_value)) = accepted else {
                converged = true;
                break;
            };

            step = Some(trial);
            let movement = weights
                .iter()
                .zip(&candidate)
                .fold(0.0_f64, |acc, (w, c)| acc.max((w - c).abs()));
            let improvement = value - candidate_value;

            weights = candidate;
            value = candidate_value;

            if improvement <= self.tolerance * (1.0 + value.abs())
                || movement <= MIN_STEP_MOVEMENT
            {
                converged = true;
                break;
            }
        }

        debug!(iterations, converged, sharpe = -value, "Solver finished");

        SolveReport {
            weights,
            sharpe: -value,
            iterations,
            converged,
        }
    }
}

/// Sharpe-like ratio `Σwr / sqrt(Σ risk·w²)`, 0 when the denominator is 0.
pub fn sharpe_ratio(weights: &[f64], expected_returns: &[f64], risks: &[f64]) -> f64 {
    let portfolio_return = dot(weights, expected_returns);
    let variance = portfolio_variance(weights, risks);
    if variance <= 0.0 {
        return 0.0;
    }
    portfolio_return / variance.sqrt()
}

/// Euclidean projection onto `{w : Σw = 1, 0 ≤ wᵢ ≤ cap}`.
///
/// Bisects the shift `τ` in `wᵢ = clamp(vᵢ − τ, 0, cap)`. Requires
/// `cap · len ≥ 1` for the target sum to be reachable.
pub fn project_capped_simplex(values: &[f64], cap: f64) -> Vec<f64> {
    let clamp_sum = |tau: f64| -> f64 { values.iter().map(|v| (v - tau).clamp(0.0, cap)).sum() };

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut lo = min - cap; // every entry clamps to cap
    let mut hi = max; // every entry clamps to 0

    for _ in 0..PROJECTION_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if clamp_sum(mid) > 1.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    // `hi` always satisfies Σ ≤ 1, so entries clamped out stay exactly 0
    values.iter().map(|v| (v - hi).clamp(0.0, cap)).collect()
}

fn portfolio_variance(weights: &[f64], risks: &[f64]) -> f64 {
    weights
        .iter()
        .zip(risks)
        .map(|(w, risk)| risk * w * w)
        .sum()
}

/// Minimization target: the negative Sharpe-like ratio.
fn objective(weights: &[f64], returns: &[f64], risks: &[f64]) -> f64 {
    -sharpe_ratio(weights, returns, risks)
}

/// Gradient of the negative ratio; zero wherever the ratio is pinned to 0.
fn gradient(weights: &[f64], returns: &[f64], risks: &[f64]) -> Vec<f64> {
    let variance = portfolio_variance(weights, risks);
    if variance <= 0.0 {
        return vec![0.0; weights.len()];
    }

    let sigma = variance.sqrt();
    let portfolio_return = dot(weights, returns);
    let sigma_cubed = sigma * variance;

    weights
        .iter()
        .zip(returns)
        .zip(risks)
        .map(|((w, r), risk)| -(r / sigma - portfolio_return * risk * w / sigma_cubed))
        .collect()
}

fn validate(expected_returns: &[f64], risks: &[f64], cap: f64) -> Result<(), AllocationError> {
    if expected_returns.is_empty() {
        return Err(AllocationError::EmptyInput);
    }

    if expected_returns.len() != risks.len() {
        return Err(AllocationError::LengthMismatch {
            returns: expected_returns.len(),
            risks: risks.len(),
        });
    }

    if let Some(index) = expected_returns.iter().position(|r| !r.is_finite()) {
        return Err(AllocationError::NonFinite {
            field: "expected_returns",
            index,
        });
    }

    if let Some(index) = risks.iter().position(|r| !r.is_finite()) {
        return Err(AllocationError::NonFinite {
            field: "risks",
            index,
        });
    }

    if let Some((index, &value)) = risks.iter().enumerate().find(|(_, r)| **r < 0.0) {
        return Err(AllocationError::NegativeRisk { index, value });
    }

    if !(cap.is_finite() && cap > 0.0 && cap <= 1.0) {
        return Err(AllocationError::InvalidCap { cap });
    }

    let venues = expected_returns.len();
    if cap * venues as f64 + SUM_TOLERANCE < 1.0 {
        return Err(AllocationError::Infeasible {
            reason: format!(
                "cap {} across {} venues deploys at most {:.4} of capital",
                cap,
                venues,
                cap * venues as f64
            ),
        });
    }

    Ok(())
}

fn check_feasible(weights: &[f64], cap: f64) -> Result<(), AllocationError> {
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > SUM_TOLERANCE {
        return Err(AllocationError::Infeasible {
            reason: format!("solver point sums to {total}"),
        });
    }

    if let Some(w) = weights.iter().find(|w| !(**w >= 0.0 && **w <= cap)) {
        return Err(AllocationError::Infeasible {
            reason: format!("solver point has weight {w} outside [0, {cap}]"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn assert_valid(weights: &[f64], n: usize, cap: f64) {
        assert_eq!(weights.len(), n);
        let total: f64 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-4, "sum {total} in {weights:?}");
        assert!(
            weights.iter().all(|w| *w >= 0.0 && *w <= cap),
            "bounds violated in {weights:?}"
        );
    }

    // =========================================================================
    // Solution Quality Tests
    // =========================================================================

    #[test]
    fn test_three_venue_scenario() {
        let optimizer = AllocationOptimizer::default();
        let weights = optimizer
            .optimize_allocation(&[0.05, 0.03, 0.04], &[0.1, 0.05, 0.08], 0.5)
            .unwrap();

        assert_valid(&weights, 3, 0.5);
        // Unconstrained optimum is proportional to r/risk: (0.3125, 0.375, 0.3125)
        assert!(weights[1] >= weights[0] - 1e-2);
        assert!(weights[2] >= weights[0] - 1e-2);
        assert!((weights[0] - 0.3125).abs() < 2e-2);
        assert!((weights[1] - 0.375).abs() < 2e-2);
        assert!((weights[2] - 0.3125).abs() < 2e-2);
    }

    #[test]
    fn test_cap_binds_on_dominant_venue() {
        let optimizer = AllocationOptimizer::default();
        let weights = optimizer
            .optimize_allocation(&[0.1, 0.01, 0.01], &[0.1, 0.1, 0.1], 0.6)
            .unwrap();

        assert_valid(&weights, 3, 0.6);
        assert!((weights[0] - 0.6).abs() < 1e-6);
        assert!((weights[1] - 0.2).abs() < 1e-3);
        assert!((weights[2] - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_two_venues_at_half_cap() {
        let optimizer = AllocationOptimizer::default();
        let weights = optimizer
            .optimize_allocation(&[0.1, 0.05], &[0.2, 0.1], 0.5)
            .unwrap();

        assert_valid(&weights, 2, 0.5);
        assert!((weights[0] - 0.5).abs() < 1e-9);
        assert!((weights[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_single_venue_takes_everything() {
        let optimizer = AllocationOptimizer::default();
        let weights = optimizer.optimize_allocation(&[5.0], &[0.2], 1.0).unwrap();
        assert_eq!(weights.len(), 1);
        assert!((weights[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_risks_keep_uniform_start() {
        let optimizer = AllocationOptimizer::default();
        let report = optimizer
            .solve(&[0.05, 0.03, 0.04], &[0.0, 0.0, 0.0], 0.5)
            .unwrap();

        assert!(report.converged);
        assert_eq!(report.sharpe, 0.0);
        for w in &report.weights {
            assert!((w - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_negative_returns_still_feasible() {
        let optimizer = AllocationOptimizer::default();
        let weights = optimizer
            .optimize_allocation(&[-0.1, -0.2], &[0.1, 0.1], 0.7)
            .unwrap();

        assert_valid(&weights, 2, 0.7);
        assert!(weights[0] >= weights[1]);
    }

    #[test]
    fn test_solve_report_sharpe_matches_weights() {
        let optimizer = AllocationOptimizer::default();
        let returns = [0.05, 0.03, 0.04];
        let risks = [0.1, 0.05, 0.08];
        let report = optimizer.solve(&returns, &risks, 0.5).unwrap();

        assert!(report.converged);
        assert!(report.iterations <= 100);
        assert!((report.sharpe - sharpe_ratio(&report.weights, &returns, &risks)).abs() < 1e-12);
        // Better than the uniform start
        let uniform = [1.0 / 3.0; 3];
        assert!(report.sharpe >= sharpe_ratio(&uniform, &returns, &risks));
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_infeasible_cap_reported() {
        let optimizer = AllocationOptimizer::default();
        let err = optimizer
            .optimize_allocation(&[0.05, 0.03], &[0.1, 0.05], 0.3)
            .unwrap_err();
        assert!(err.is_infeasible());
    }

    #[test]
    fn test_exact_cap_boundary_is_feasible() {
        let optimizer = AllocationOptimizer::default();
        let weights = optimizer
            .optimize_allocation(&[0.05, 0.03, 0.04, 0.02], &[0.1, 0.05, 0.08, 0.02], 0.25)
            .unwrap();
        assert_valid(&weights, 4, 0.25);
    }

    #[test]
    fn test_input_errors() {
        let optimizer = AllocationOptimizer::default();

        assert_eq!(
            optimizer.optimize_allocation(&[], &[], 0.5),
            Err(AllocationError::EmptyInput)
        );
        assert_eq!(
            optimizer.optimize_allocation(&[0.1, 0.2], &[0.1], 0.5),
            Err(AllocationError::LengthMismatch { returns: 2, risks: 1 })
        );
        assert_eq!(
            optimizer.optimize_allocation(&[0.1, f64::NAN], &[0.1, 0.1], 0.5),
            Err(AllocationError::NonFinite {
                field: "expected_returns",
                index: 1
            })
        );
        assert_eq!(
            optimizer.optimize_allocation(&[0.1, 0.1], &[f64::INFINITY, 0.1], 0.5),
            Err(AllocationError::NonFinite {
                field: "risks",
                index: 0
            })
        );
        assert_eq!(
            optimizer.optimize_allocation(&[0.1, 0.1], &[0.1, -0.1], 0.5),
            Err(AllocationError::NegativeRisk {
                index: 1,
                value: -0.1
            })
        );
        for cap in [0.0, -0.5, 1.5] {
            assert_eq!(
                optimizer.optimize_allocation(&[0.1, 0.1], &[0.1, 0.1], cap),
                Err(AllocationError::InvalidCap { cap })
            );
        }
    }

    // =========================================================================
    // Memoization Tests
    // =========================================================================

    #[test]
    fn test_repeated_call_served_from_cache() {
        let optimizer = AllocationOptimizer::default();
        let first = optimizer
            .optimize_allocation(&[0.05, 0.03, 0.04], &[0.1, 0.05, 0.08], 0.5)
            .unwrap();
        let second = optimizer
            .optimize_allocation(&[0.05, 0.03, 0.04], &[0.1, 0.05, 0.08], 0.5)
            .unwrap();

        assert_eq!(first, second);
        let stats = optimizer.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.len, 1);
    }

    #[test]
    fn test_deterministic_without_cache() {
        let optimizer = AllocationOptimizer::new(100, 1e-6, 0);
        let first = optimizer
            .optimize_allocation(&[2000.0, 2000.0, 1990.0], &[0.0123, 0.0456, 0.02], 0.5)
            .unwrap();
        let second = optimizer
            .optimize_allocation(&[2000.0, 2000.0, 1990.0], &[0.0123, 0.0456, 0.02], 0.5)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(optimizer.cache_stats().hits, 0);
    }

    #[test]
    fn test_failed_solves_not_cached() {
        let optimizer = AllocationOptimizer::default();
        let _ = optimizer.optimize_allocation(&[0.1, 0.1], &[0.1, 0.1], 0.3);
        assert_eq!(optimizer.cache_stats().len, 0);
    }

    #[test]
    fn test_shared_across_threads() {
        let optimizer = Arc::new(AllocationOptimizer::default());
        let results: Vec<Vec<f64>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let optimizer = Arc::clone(&optimizer);
                    scope.spawn(move || {
                        optimizer
                            .optimize_allocation(&[0.05, 0.03, 0.04], &[0.1, 0.05, 0.08], 0.5)
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(optimizer.cache_stats().len, 1);
    }

    // =========================================================================
    // Projection Tests
    // =========================================================================

    #[test]
    fn test_projection_lands_on_capped_simplex() {
        let projected = project_capped_simplex(&[3.0, -1.0, 0.2, 0.1], 0.5);
        let total: f64 = projected.iter().sum();

        assert!((total - 1.0).abs() < 1e-12);
        assert!((projected[0] - 0.5).abs() < 1e-12);
        assert_eq!(projected[1], 0.0);
        assert!(projected.iter().all(|w| *w >= 0.0 && *w <= 0.5));
    }

    #[test]
    fn test_projection_keeps_feasible_point() {
        let point = [0.2, 0.3, 0.5];
        let projected = project_capped_simplex(&point, 0.5);
        for (p, q) in point.iter().zip(&projected) {
            assert!((p - q).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sharpe_ratio_zero_denominator() {
        assert_eq!(sharpe_ratio(&[0.5, 0.5], &[0.1, 0.2], &[0.0, 0.0]), 0.0);
        let value = sharpe_ratio(&[0.3, 0.3, 0.4], &[0.05, 0.03, 0.04], &[0.1, 0.05, 0.08]);
        assert!(value.is_finite() && value > 0.0);
    }
}
