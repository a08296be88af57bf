//! Strategy Trait and Runtime Context
//!
//! A [`Strategy`] is anything the dispatcher can run against a set of
//! wrappers and markets. Most strategies are built from a [`StrategyModel`]
//! (the user's hooks) driven by [`IntervalStrategy`](crate::IntervalStrategy)
//! or [`WebsocketStrategy`](crate::WebsocketStrategy).

use crate::error::{StrategyError, StrategyResult};
use async_trait::async_trait;
use meridian_core::MarketRef;
use meridian_ports::ExchangeWrapper;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared wrapper list handed to every strategy
pub type Wrappers = Arc<[Arc<dyn ExchangeWrapper>]>;

/// Stop flag broadcast by the dispatcher
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub fn new(receiver: watch::Receiver<bool>) -> Self {
        Self(receiver)
    }

    /// Fresh signal plus the sender that fires it
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self(rx))
    }

    /// True once shutdown was requested or the dispatcher went away
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }

    /// Resolves once shutdown is requested or the sender is gone
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|stop| *stop).await;
    }
}

/// Everything a strategy run sees
#[derive(Clone)]
pub struct StrategyContext {
    pub wrappers: Wrappers,
    pub markets: Arc<[MarketRef]>,
    pub shutdown: ShutdownSignal,
}

impl StrategyContext {
    pub fn new(wrappers: Wrappers, markets: Arc<[MarketRef]>, shutdown: ShutdownSignal) -> Self {
        Self {
            wrappers,
            markets,
            shutdown,
        }
    }

    /// Wrapper registered under `name`
    pub fn wrapper(&self, name: &str) -> Option<&Arc<dyn ExchangeWrapper>> {
        self.wrappers.iter().find(|w| w.name() == name)
    }

    /// Wrappers that have a symbol binding for at least one bound market
    pub fn trading_wrappers(&self) -> impl Iterator<Item = &Arc<dyn ExchangeWrapper>> {
        self.wrappers.iter().filter(|w| {
            self.markets
                .iter()
                .any(|m| m.symbol_for(w.name()).is_some())
        })
    }
}

/// Strategy trait - the unit the dispatcher schedules
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Name used when binding the strategy to markets
    fn name(&self) -> &str;

    /// Run the strategy to completion
    ///
    /// Returns when the strategy's own loop ends, either on shutdown or
    /// because a hook asked it to stop.
    async fn apply(&self, ctx: StrategyContext) -> StrategyResult<()>;
}

/// User hooks driven by the built-in strategy loops
///
/// Hooks take `&self`; a model that keeps state across updates owns its
/// own interior mutability, so one model can be bound to several market
/// sets at once.
#[async_trait]
pub trait StrategyModel: Send + Sync + 'static {
    async fn setup(&self, _ctx: &StrategyContext) -> StrategyResult<()> {
        Ok(())
    }

    async fn on_update(&self, ctx: &StrategyContext) -> StrategyResult<()>;

    async fn tear_down(&self, _ctx: &StrategyContext) -> StrategyResult<()> {
        Ok(())
    }

    /// Decide whether the loop survives an error
    fn on_error(&self, error: &StrategyError) -> ControlFlow<()> {
        log::warn!("Strategy error: {}", error);
        ControlFlow::Continue(())
    }
}
