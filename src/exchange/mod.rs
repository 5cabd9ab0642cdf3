//! Venue integrations for the allocation pipeline.
//!
//! ## Market data
//! - `VenueDataClient`: REST access to per-venue snapshots and price history
//! - `StaticMarketData`: fixed in-memory data for offline runs
//!
//! ## Execution
//! - `PaperExecutor`: records execution triggers without trading

mod client;
pub mod mock;
mod paper;
mod traits;
mod types;

pub use client::VenueDataClient;
pub use mock::{OfflineDataset, StaticMarketData};
pub use paper::{PaperExecutor, PaperFill};
pub use traits::{MarketDataProvider, TradeExecutor};
pub use types::*;
