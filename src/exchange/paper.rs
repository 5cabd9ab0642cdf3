//! Paper execution: logs and records triggers without touching any venue.

use super::traits::TradeExecutor;
use super::types::ExecutionOrder;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// A trigger received by the paper executor.
#[derive(Debug, Clone)]
pub struct PaperFill {
    pub order: ExecutionOrder,
    pub received_at: DateTime<Utc>,
}

/// Executor that records every trigger in memory.
#[derive(Debug, Clone, Default)]
pub struct PaperExecutor {
    fills: Arc<RwLock<Vec<PaperFill>>>,
}

impl PaperExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// All triggers received so far, oldest first.
    pub async fn fills(&self) -> Vec<PaperFill> {
        self.fills.read().await.clone()
    }

    /// Total notional deployed across all triggers.
    pub async fn total_notional(&self) -> Decimal {
        self.fills
            .read()
            .await
            .iter()
            .map(|f| f.order.notional_usd)
            .sum()
    }
}

#[async_trait]
impl TradeExecutor for PaperExecutor {
    async fn execute(&self, order: &ExecutionOrder) -> Result<()> {
        info!(
            venue = %order.venue_id,
            token_pair = %order.token_pair,
            allocation = order.allocation,
            notional_usd = %order.notional_usd,
            "[PAPER] Executing trade"
        );

        self.fills.write().await.push(PaperFill {
            order: order.clone(),
            received_at: Utc::now(),
        });

        Ok(())
    }
}
