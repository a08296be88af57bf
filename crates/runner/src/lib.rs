//! Meridian Runner - bot wiring
//!
//! Turns an already-parsed [`BotConfig`] into running parts:
//!
//! - **Config**: serde structures plus fail-fast validation
//! - **Bootstrap**: markets, one wrapper per exchange (optionally simulated),
//!   strategy bindings
//!
//! ## Architecture
//!
//! ```text
//!   BotConfig ──validate──► build_markets ──► MarketRegistry
//!       │
//!       ├── exchange_configs ──► init_exchange ──► ExchangeGateway<Adapter>
//!       │                          (TransportFactory)      │
//!       │                                 simulated? ──► ExchangeWrapperSimulator
//!       │
//!       └── strategies ──► StrategyDispatcher::match_with_markets
//!                                         │
//!                                         ▼
//!                          apply_all_strategies(wrappers)
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;

pub use bootstrap::{
    Bootstrapped, ChannelTransportFactory, TransportFactory, bootstrap, build_markets,
    init_exchange,
};
pub use config::{
    BotConfig, ExchangeBindingConfig, ExchangeConfig, MarketConfig, SUPPORTED_EXCHANGES,
    StrategyConfig,
};
pub use error::{BootstrapError, BootstrapResult};
