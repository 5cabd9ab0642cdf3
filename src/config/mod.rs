//! Configuration management for the venue allocator.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Venues considered for allocation, in fixed order
    #[serde(default = "default_venues")]
    pub venues: Vec<String>,
    /// Market data service settings
    #[serde(default)]
    pub data_source: DataSourceConfig,
    /// Risk scoring parameters
    #[serde(default)]
    pub risk: RiskConfig,
    /// Allocation optimizer parameters
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Baseline price estimator parameters
    #[serde(default)]
    pub estimator: EstimatorConfig,
    /// Execution parameters
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Run scheduling
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Base URL of the market data service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bar width requested for historical series
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Scores strictly below this are considered safe
    #[serde(default = "default_risk_threshold")]
    pub threshold: f64,
    /// Weight of return volatility in the risk score
    #[serde(default = "default_volatility_weight")]
    pub volatility_weight: f64,
    /// Weight of inverse liquidity in the risk score
    #[serde(default = "default_liquidity_weight")]
    pub liquidity_weight: f64,
    /// Weight of forecast divergence in the risk score
    #[serde(default = "default_divergence_weight")]
    pub divergence_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Maximum fraction of capital on a single venue (0.0-1.0)
    #[serde(default = "default_max_allocation")]
    pub max_allocation: f64,
    /// Solver iteration budget
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Objective improvement below which the solver stops
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Memoized solutions kept (0 disables caching)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Trailing points averaged; shorter series yield no estimate
    #[serde(default = "default_estimator_window")]
    pub window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Capital in USD that allocation fractions apply to
    #[serde(default = "default_capital_usd")]
    pub capital_usd: Decimal,
    /// Skip execution on venues whose risk score is not below the threshold
    #[serde(default)]
    pub enforce_risk_threshold: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Token pair evaluated when none is given on the command line
    #[serde(default = "default_token_pair")]
    pub token_pair: String,
    /// Seconds between runs in loop mode
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

// Default value functions
fn default_venues() -> Vec<String> {
    vec!["Uniswap".to_string(), "SushiSwap".to_string()]
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_timeframe() -> String {
    "1h".to_string()
}

fn default_risk_threshold() -> f64 {
    0.05
}

fn default_volatility_weight() -> f64 {
    0.4
}

fn default_liquidity_weight() -> f64 {
    0.3
}

fn default_divergence_weight() -> f64 {
    0.3
}

fn default_max_allocation() -> f64 {
    0.5
}

fn default_max_iterations() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_cache_capacity() -> usize {
    128
}

fn default_estimator_window() -> usize {
    60
}

fn default_capital_usd() -> Decimal {
    Decimal::new(10_000, 0) // $10k
}

fn default_token_pair() -> String {
    "ETH-USDT".to_string()
}

fn default_interval_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("VA")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("venues"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.venues.is_empty(), "at least one venue is required");

        let weights = [
            self.risk.volatility_weight,
            self.risk.liquidity_weight,
            self.risk.divergence_weight,
        ];
        anyhow::ensure!(
            weights.iter().all(|w| w.is_finite() && *w >= 0.0),
            "risk weights must be finite and non-negative"
        );

        anyhow::ensure!(
            self.risk.threshold.is_finite() && self.risk.threshold > 0.0,
            "risk threshold must be positive"
        );

        anyhow::ensure!(
            self.optimizer.max_allocation > 0.0 && self.optimizer.max_allocation <= 1.0,
            "max_allocation must be between 0 and 1"
        );

        anyhow::ensure!(
            self.optimizer.max_allocation * self.venues.len() as f64 >= 1.0,
            "max_allocation {} across {} venues cannot deploy all capital",
            self.optimizer.max_allocation,
            self.venues.len()
        );

        anyhow::ensure!(
            self.optimizer.max_iterations >= 1,
            "max_iterations must be at least 1"
        );

        anyhow::ensure!(
            self.optimizer.tolerance.is_finite() && self.optimizer.tolerance > 0.0,
            "optimizer tolerance must be positive"
        );

        anyhow::ensure!(
            self.estimator.window >= 2,
            "estimator window must be at least 2"
        );

        anyhow::ensure!(
            self.execution.capital_usd > Decimal::ZERO,
            "capital_usd must be positive"
        );

        anyhow::ensure!(
            self.data_source.timeout_secs > 0,
            "data source timeout must be positive"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            venues: default_venues(),
            data_source: DataSourceConfig::default(),
            risk: RiskConfig::default(),
            optimizer: OptimizerConfig::default(),
            estimator: EstimatorConfig::default(),
            execution: ExecutionConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            timeframe: default_timeframe(),
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            threshold: default_risk_threshold(),
            volatility_weight: default_volatility_weight(),
            liquidity_weight: default_liquidity_weight(),
            divergence_weight: default_divergence_weight(),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_allocation: default_max_allocation(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window: default_estimator_window(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            capital_usd: default_capital_usd(),
            enforce_risk_threshold: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            token_pair: default_token_pair(),
            interval_secs: default_interval_secs(),
        }
    }
}
