//! Built-in market watcher

use crate::error::StrategyResult;
use crate::interval::IntervalStrategy;
use crate::strategy::{StrategyContext, StrategyModel};
use async_trait::async_trait;
use log::info;
use std::time::Duration;

pub const WATCH_5MIN: &str = "Watch5Min";

/// Logs the market summary of every bound market on every exchange that
/// lists it
#[derive(Debug, Default)]
pub struct Watch;

impl Watch {
    pub fn every(name: impl Into<String>, interval: Duration) -> IntervalStrategy<Watch> {
        IntervalStrategy::new(name, interval, Watch)
    }

    pub fn five_minutes() -> IntervalStrategy<Watch> {
        Self::every(WATCH_5MIN, Duration::from_secs(5 * 60))
    }
}

#[async_trait]
impl StrategyModel for Watch {
    async fn on_update(&self, ctx: &StrategyContext) -> StrategyResult<()> {
        for wrapper in ctx.trading_wrappers() {
            for market in ctx.markets.iter() {
                if market.symbol_for(wrapper.name()).is_none() {
                    continue;
                }
                let summary = wrapper.get_market_summary(market).await?;
                info!("{} on {}\n{}", market, wrapper.name(), summary);
            }
        }
        Ok(())
    }
}
