//! Meridian Strategy Framework
//!
//! Runs user strategies against the exchange wrappers:
//! - [`StrategyModel`]: the user's setup / update / tear down / error hooks
//! - [`IntervalStrategy`] and [`WebsocketStrategy`]: drivers for a model
//! - [`StrategyDispatcher`]: binds strategies to markets and runs every
//!   binding on its own task
//!
//! ## Architecture
//!
//! ```text
//!  config ──► match_with_markets ──► bindings
//!                                      │
//!                apply_all_strategies  │  one task per binding
//!                                      ▼
//!               ┌──────────────┐   ┌──────────────┐
//!               │ Interval     │   │ Websocket    │
//!               │ setup        │   │ setup        │
//!               │ loop update  │   │ (feed-driven)│
//!               │ tear_down    │   │ tear_down    │
//!               └──────┬───────┘   └──────┬───────┘
//!                      └────────┬─────────┘
//!                               ▼
//!                   Arc<dyn ExchangeWrapper>
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_strategy::{IntervalStrategy, StrategyDispatcher};
//!
//! let mut dispatcher = StrategyDispatcher::with_builtins();
//! dispatcher.add_custom_strategy(Arc::new(IntervalStrategy::new(
//!     "Arbitrage",
//!     Duration::from_secs(5),
//!     MyModel::default(),
//! )));
//! dispatcher.match_with_markets("Arbitrage", markets)?;
//! dispatcher.apply_all_strategies(wrappers).await;
//! ```

pub mod dispatcher;
pub mod error;
pub mod interval;
pub mod strategy;
pub mod watch;
pub mod websocket;

pub use dispatcher::{Binding, DispatchSummary, StrategyDispatcher};
pub use error::{StrategyError, StrategyResult};
pub use interval::IntervalStrategy;
pub use strategy::{ShutdownSignal, Strategy, StrategyContext, StrategyModel, Wrappers};
pub use watch::{WATCH_5MIN, Watch};
pub use websocket::WebsocketStrategy;
