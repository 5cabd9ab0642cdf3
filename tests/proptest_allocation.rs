//! Property-Based Tests - Allocation and Risk Invariants
//!
//! Uses `proptest` to check that the optimizer and the risk scorer hold
//! their guarantees across random feasible inputs.

use proptest::prelude::*;

use venue_allocator::exchange::VenueSnapshot;
use venue_allocator::risk::{is_trade_safe, RiskScorer};
use venue_allocator::strategy::{project_capped_simplex, AllocationOptimizer, SUM_TOLERANCE};

/// Returns, risks and a cap with `cap · n ≥ 1`.
fn feasible_problem() -> impl Strategy<Value = (Vec<f64>, Vec<f64>, f64)> {
    (1usize..=6).prop_flat_map(|n| {
        (
            prop::collection::vec(-1.0f64..5000.0, n),
            prop::collection::vec(prop_oneof![Just(0.0), 1e-4f64..1.0], n),
            (1.0 / n as f64)..=1.0,
        )
    })
}

// ── Optimizer Properties ────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Every allocation sums to 1 and respects the per-venue cap.
    #[test]
    fn allocation_is_on_capped_simplex((returns, risks, cap) in feasible_problem()) {
        let optimizer = AllocationOptimizer::default();
        let weights = optimizer.optimize_allocation(&returns, &risks, cap).unwrap();

        prop_assert_eq!(weights.len(), returns.len());
        let total: f64 = weights.iter().sum();
        prop_assert!((total - 1.0).abs() <= SUM_TOLERANCE, "sum {total} in {weights:?}");
        for w in &weights {
            prop_assert!(*w >= 0.0 && *w <= cap, "weight {w} outside [0, {cap}]");
        }
    }

    /// Identical inputs give identical vectors, cached or not.
    #[test]
    fn allocation_is_deterministic((returns, risks, cap) in feasible_problem()) {
        let cached = AllocationOptimizer::default();
        let uncached = AllocationOptimizer::new(100, 1e-6, 0);

        let first = cached.optimize_allocation(&returns, &risks, cap).unwrap();
        let second = cached.optimize_allocation(&returns, &risks, cap).unwrap();
        let fresh = uncached.optimize_allocation(&returns, &risks, cap).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &fresh);
        prop_assert_eq!(cached.cache_stats().hits, 1);
    }

    /// A cap below 1/n never yields an allocation.
    #[test]
    fn undersized_cap_is_infeasible(n in 2usize..8, shrink in 0.05f64..0.95) {
        let cap = shrink / n as f64;
        let returns = vec![0.05; n];
        let risks = vec![0.1; n];

        let err = AllocationOptimizer::default()
            .optimize_allocation(&returns, &risks, cap)
            .unwrap_err();
        prop_assert!(err.is_infeasible());
    }

    /// Projection output always lies on the capped simplex.
    #[test]
    fn projection_is_feasible(
        values in prop::collection::vec(-10.0f64..10.0, 1..8),
        slack in 0.0f64..1.0,
    ) {
        let n = values.len() as f64;
        let cap = (1.0 / n + slack).min(1.0);
        let projected = project_capped_simplex(&values, cap);

        let total: f64 = projected.iter().sum();
        prop_assert!((total - 1.0).abs() <= SUM_TOLERANCE);
        prop_assert!(projected.iter().all(|w| *w >= 0.0 && *w <= cap));
    }
}

// ── Risk Scorer Properties ──────────────────────────────────

proptest! {
    /// Scores of valid snapshots are finite and non-negative.
    #[test]
    fn risk_score_non_negative(
        prices in prop::collection::vec(1.0f64..10_000.0, 0..50),
        liquidity in 1.0f64..1e9,
        current in 0.01f64..10_000.0,
        estimate in -10_000.0f64..10_000.0,
    ) {
        let snapshot = VenueSnapshot::new("Uniswap", liquidity, current).with_history(prices);
        let score = RiskScorer::default().assess_risk(&snapshot, estimate).unwrap();

        prop_assert!(score.value().is_finite());
        prop_assert!(score.value() >= 0.0);
    }

    /// Safety is exactly `score < threshold`.
    #[test]
    fn trade_safety_is_strict(score in 0.0f64..1.0, threshold in 0.0f64..1.0) {
        prop_assert_eq!(is_trade_safe(score, threshold), score < threshold);
        prop_assert!(!is_trade_safe(threshold, threshold));
    }
}
