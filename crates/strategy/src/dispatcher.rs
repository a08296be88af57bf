//! Strategy Dispatcher
//!
//! Holds the strategies available to the bot and their market bindings,
//! runs every binding on its own task and waits for all of them.

use crate::error::{StrategyError, StrategyResult};
use crate::strategy::{ShutdownSignal, Strategy, StrategyContext, Wrappers};
use crate::watch::Watch;
use meridian_core::MarketRef;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// A strategy bound to the markets it trades
#[derive(Clone)]
pub struct Binding {
    pub strategy: Arc<dyn Strategy>,
    pub markets: Arc<[MarketRef]>,
}

/// How the strategy runs of one `apply_all_strategies` call ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub panicked: usize,
}

pub struct StrategyDispatcher {
    available: HashMap<String, Arc<dyn Strategy>>,
    bindings: Vec<Binding>,
    shutdown: watch::Sender<bool>,
}

impl Default for StrategyDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyDispatcher {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            available: HashMap::new(),
            bindings: Vec::new(),
            shutdown,
        }
    }

    /// Dispatcher with the built-in strategies registered
    pub fn with_builtins() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.add_custom_strategy(Arc::new(Watch::five_minutes()));
        dispatcher
    }

    /// Make `strategy` available for binding, replacing any strategy of the
    /// same name
    pub fn add_custom_strategy(&mut self, strategy: Arc<dyn Strategy>) {
        let name = strategy.name().to_string();
        if self.available.insert(name.clone(), strategy).is_some() {
            log::warn!("Strategy {} replaced", name);
        }
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.available.contains_key(name)
    }

    /// Bind the strategy called `name` to `markets`
    pub fn match_with_markets(&mut self, name: &str, markets: Vec<MarketRef>) -> StrategyResult<()> {
        let strategy = self
            .available
            .get(name)
            .cloned()
            .ok_or_else(|| StrategyError::UnknownStrategy(name.to_string()))?;

        log::info!("Bound strategy {} to {} market(s)", name, markets.len());
        self.bindings.push(Binding {
            strategy,
            markets: markets.into(),
        });
        Ok(())
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Run every binding concurrently and wait until all have finished
    ///
    /// A strategy that fails or panics is logged and does not affect the
    /// others.
    pub async fn apply_all_strategies(&self, wrappers: Wrappers) -> DispatchSummary {
        let mut tasks = JoinSet::new();

        for binding in &self.bindings {
            let strategy = binding.strategy.clone();
            let name = strategy.name().to_string();
            let ctx = StrategyContext::new(
                wrappers.clone(),
                binding.markets.clone(),
                ShutdownSignal::new(self.shutdown.subscribe()),
            );
            tasks.spawn(async move {
                let outcome = tokio::spawn(async move { strategy.apply(ctx).await }).await;
                (name, outcome)
            });
        }
        log::info!("Applying {} strategy binding(s)", tasks.len());

        let mut summary = DispatchSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(Ok(())))) => {
                    log::info!("Strategy {} finished", name);
                    summary.completed += 1;
                }
                Ok((name, Ok(Err(e)))) => {
                    log::error!("Strategy {} failed: {}", name, e);
                    summary.failed += 1;
                }
                Ok((name, Err(e))) => {
                    log::error!("Strategy {} panicked: {}", name, e);
                    summary.panicked += 1;
                }
                Err(e) => {
                    log::error!("Strategy task aborted: {}", e);
                    summary.panicked += 1;
                }
            }
        }
        summary
    }

    /// Ask every running strategy to stop
    pub fn shutdown(&self) {
        log::info!("Shutting down strategies");
        self.shutdown.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meridian_core::MarketRegistry;

    struct Named(&'static str);

    #[async_trait]
    impl Strategy for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn apply(&self, _ctx: StrategyContext) -> StrategyResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unknown_strategy() {
        let mut dispatcher = StrategyDispatcher::new();
        let market = MarketRegistry::new().register("BTC-ETH", "BTC", "ETH", [("binance", "ETHBTC")]);

        let err = dispatcher
            .match_with_markets("Missing", vec![market])
            .unwrap_err();

        assert!(matches!(err, StrategyError::UnknownStrategy(name) if name == "Missing"));
        assert!(dispatcher.bindings().is_empty());
    }

    #[test]
    fn test_builtins_registered() {
        let dispatcher = StrategyDispatcher::with_builtins();
        assert!(dispatcher.is_available(crate::watch::WATCH_5MIN));
        assert!(!StrategyDispatcher::new().is_available(crate::watch::WATCH_5MIN));
    }

    #[tokio::test]
    async fn test_no_bindings_returns_immediately() {
        let dispatcher = StrategyDispatcher::new();
        let summary = dispatcher.apply_all_strategies(Arc::from(Vec::new())).await;
        assert_eq!(summary, DispatchSummary::default());
    }

    #[tokio::test]
    async fn test_each_binding_runs() {
        let mut dispatcher = StrategyDispatcher::new();
        dispatcher.add_custom_strategy(Arc::new(Named("a")));
        dispatcher.add_custom_strategy(Arc::new(Named("b")));
        dispatcher.match_with_markets("a", Vec::new()).unwrap();
        dispatcher.match_with_markets("a", Vec::new()).unwrap();
        dispatcher.match_with_markets("b", Vec::new()).unwrap();

        let summary = dispatcher.apply_all_strategies(Arc::from(Vec::new())).await;

        assert_eq!(summary.completed, 3);
    }
}
