//! # Venue Allocator
//!
//! Splits capital for one token pair across several trading venues by
//! maximizing a risk-adjusted expected return under a per-venue cap.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `errors`: Input, allocation and pipeline error types
//! - `exchange`: Market data providers and execution triggers
//! - `risk`: Per-venue risk scoring and the trade safety check
//! - `strategy`: Price estimation, allocation optimizer and decision pipeline
//! - `utils`: Shared statistics and decimal arithmetic

pub mod config;
pub mod errors;
pub mod exchange;
pub mod risk;
pub mod strategy;
pub mod utils;

pub use config::Config;
