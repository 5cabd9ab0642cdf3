//! Venue Allocator - Main Entry Point
//!
//! Runs the decision pipeline against the market data service (or an offline
//! dataset), and exposes the optimizer and risk scorer as standalone commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;
use venue_allocator::config::Config;
use venue_allocator::exchange::{
    MarketDataProvider, PaperExecutor, StaticMarketData, VenueDataClient, VenueSnapshot,
};
use venue_allocator::risk::RiskScorer;
use venue_allocator::strategy::{
    AllocationOptimizer, DecisionPipeline, MovingAverageEstimator, RunOutcome,
};

/// Venue Allocator CLI
#[derive(Parser)]
#[command(name = "venue-allocator")]
#[command(version, about = "Risk-scored capital allocation across trading venues")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the decision pipeline (default)
    Run {
        /// Token pair to evaluate (defaults to pipeline.token_pair)
        #[arg(short, long)]
        token_pair: Option<String>,

        /// Repeat every N seconds until Ctrl-C
        #[arg(short, long)]
        interval_secs: Option<u64>,

        /// Read market data from a JSON dataset instead of HTTP
        #[arg(short, long)]
        offline: Option<String>,
    },

    /// Optimize an allocation from explicit returns and risks
    Allocate {
        /// Expected returns, comma separated
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true, required = true)]
        returns: Vec<f64>,

        /// Risk scores, comma separated
        #[arg(short = 'k', long, value_delimiter = ',', required = true)]
        risks: Vec<f64>,

        /// Per-venue cap (defaults to optimizer.max_allocation)
        #[arg(short, long)]
        cap: Option<f64>,
    },

    /// Score a single venue snapshot against a price estimate
    Score {
        /// Historical prices, comma separated, oldest first
        #[arg(short, long, value_delimiter = ',')]
        prices: Vec<f64>,

        /// Available liquidity
        #[arg(short, long)]
        liquidity: f64,

        /// Latest traded price
        #[arg(short, long)]
        current_price: f64,

        /// Forecast price
        #[arg(short, long)]
        estimate: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Some(Commands::Allocate {
            returns,
            risks,
            cap,
        }) => run_allocate(&config, &returns, &risks, cap),
        Some(Commands::Score {
            prices,
            liquidity,
            current_price,
            estimate,
        }) => run_score(&config, prices, liquidity, current_price, estimate),
        Some(Commands::Run {
            token_pair,
            interval_secs,
            offline,
        }) => run_pipeline(config, token_pair, interval_secs, offline.as_deref()).await,
        None => run_pipeline(config, None, None, None).await,
    }
}

/// Build the pipeline and run it once, or on an interval until Ctrl-C.
async fn run_pipeline(
    config: Config,
    token_pair: Option<String>,
    interval_secs: Option<u64>,
    offline: Option<&str>,
) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║              Venue Allocator v{}                        ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    log_config(&config);

    let market_data: Arc<dyn MarketDataProvider> = match offline {
        Some(path) => {
            info!("📂 Offline mode, market data from {}", path);
            Arc::new(StaticMarketData::from_json_file(path)?)
        }
        None => Arc::new(VenueDataClient::new(&config.data_source)?),
    };

    let executor = PaperExecutor::new();
    let pipeline = DecisionPipeline::from_config(
        &config,
        market_data,
        Arc::new(MovingAverageEstimator::new(config.estimator.window)),
        Arc::new(executor.clone()),
    );

    let token_pair = token_pair.unwrap_or_else(|| config.pipeline.token_pair.clone());

    let Some(interval) = interval_secs else {
        let outcome = pipeline
            .run(&token_pair)
            .await
            .with_context(|| format!("Allocation run for {} failed", token_pair))?;
        print_outcome(&outcome);
        return Ok(());
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    info!("🚀 Running every {}s, Ctrl-C to stop", interval);

    let mut runs: u64 = 0;
    while !shutdown.load(Ordering::SeqCst) {
        runs += 1;
        match pipeline.run(&token_pair).await {
            Ok(outcome) => print_outcome(&outcome),
            // A failed run is retried on the next tick
            Err(e) => error!(run = runs, error = %e, "Allocation run failed"),
        }

        let stats = pipeline.optimizer().cache_stats();
        info!(
            run = runs,
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            cache_len = stats.len,
            paper_notional = %executor.total_notional().await,
            "Run finished"
        );

        tokio::time::sleep(Duration::from_secs(interval)).await;
    }

    info!("👋 Venue Allocator shutdown complete");
    Ok(())
}

fn run_allocate(config: &Config, returns: &[f64], risks: &[f64], cap: Option<f64>) -> Result<()> {
    let cap = cap.unwrap_or(config.optimizer.max_allocation);
    let optimizer = AllocationOptimizer::from_config(&config.optimizer);

    let report = optimizer
        .solve(returns, risks, cap)
        .context("Allocation failed")?;

    println!("Allocation (cap {:.2}):", cap);
    for (i, weight) in report.weights.iter().enumerate() {
        println!("  venue #{:<3} {:>8.4}", i, weight);
    }
    println!("Sharpe:     {:.6}", report.sharpe);
    println!(
        "Iterations: {}{}",
        report.iterations,
        if report.converged { "" } else { " (not converged)" }
    );

    Ok(())
}

fn run_score(
    config: &Config,
    prices: Vec<f64>,
    liquidity: f64,
    current_price: f64,
    estimate: f64,
) -> Result<()> {
    let scorer = RiskScorer::from_config(&config.risk);
    let snapshot = VenueSnapshot::new("cli", liquidity, current_price).with_history(prices);

    let breakdown = scorer
        .breakdown(&snapshot, estimate)
        .context("Risk scoring failed")?;

    println!("Volatility:  {:.6}", breakdown.volatility);
    println!("Liquidity:   {:.6}", breakdown.liquidity_term);
    println!("Divergence:  {:.6}", breakdown.divergence_term);
    println!("Risk score:  {}", breakdown.score);
    println!(
        "Trade safe:  {} (threshold {})",
        scorer.is_safe(breakdown.score),
        scorer.threshold()
    );

    Ok(())
}

/// Print a per-venue summary of a run.
fn print_outcome(outcome: &RunOutcome) {
    let status = match outcome {
        RunOutcome::NoEstimates { .. } => "no estimates, nothing allocated".to_string(),
        RunOutcome::NoAllocation { reason, .. } => format!("no allocation: {}", reason),
        RunOutcome::Executed {
            executions,
            skipped,
            ..
        } => format!(
            "{} triggered, {} failed, {} skipped",
            executions.len(),
            executions.iter().filter(|r| !r.success).count(),
            skipped.len()
        ),
    };

    println!("\n{:<14} {:>12} {:>10} {:>10}", "Venue", "Estimate", "Risk", "Weight");
    for evaluation in outcome.evaluations() {
        let estimate = evaluation
            .estimate
            .map_or_else(|| "-".to_string(), |e| format!("{:.4}", e));
        let risk = evaluation
            .risk
            .map_or_else(|| "-".to_string(), |r| r.to_string());
        println!(
            "{:<14} {:>12} {:>10} {:>10.4}",
            evaluation.venue_id(),
            estimate,
            risk,
            evaluation.allocation
        );
    }
    println!("Result: {}", status);
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "venue-allocator.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("venue_allocator=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Venues: {}", config.venues.join(", "));
    info!("   Data Source: {}", config.data_source.base_url);
    info!(
        "   Max Allocation: {:.0}%",
        config.optimizer.max_allocation * 100.0
    );
    info!("   Risk Threshold: {}", config.risk.threshold);
    info!(
        "   Risk Weights: vol {} / liq {} / div {}",
        config.risk.volatility_weight, config.risk.liquidity_weight, config.risk.divergence_weight
    );
    info!("   Estimator Window: {}", config.estimator.window);
    info!(
        "   Capital: ${}",
        config.execution.capital_usd.round_dp(2)
    );
    info!(
        "   Risk Gate: {}",
        if config.execution.enforce_risk_threshold {
            "enforced"
        } else {
            "off"
        }
    );
}
