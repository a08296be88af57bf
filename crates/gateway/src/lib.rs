//! Meridian Gateway
//!
//! Exchange access for the Meridian trading runtime. Provides:
//! - [`ExchangeGateway`], the [`meridian_ports::ExchangeWrapper`] implementation
//!   shared by every supported exchange
//! - Per-exchange [`adapters`] translating requests and payloads
//! - [`ConcurrentCache`]s written by streaming feeds and read by strategies
//! - The [`FeedController`] owning one background task per streamed market
//!
//! ## Architecture
//!
//! ```text
//!  Binance / Bitfinex / Bittrex / HitBTC / Kraken / KuCoin
//!         │  raw JSON (REST replies, stream messages)
//!    ┌────▼──────┐
//!    │ Transport │
//!    └────┬──────┘
//!    ┌────▼──────────────┐     ┌───────────────┐
//!    │ ExchangeGateway<A>│◄────│ FeedController│
//!    │  + adapter A      │     │  (per market) │
//!    └────┬──────────────┘     └───────────────┘
//!         │ ExchangeWrapper
//!    ┌────▼──────┐
//!    │ Strategies│
//!    └───────────┘
//! ```
//!
//! ## Transport
//!
//! HTTP and WebSocket sessions sit behind the [`Transport`] trait.
//! [`ChannelTransport`] is the in-process implementation used by tests and
//! offline runs.

pub mod adapter;
pub mod adapters;
pub mod cache;
pub mod config;
pub mod feed;
pub mod parse;
mod rest;
pub mod transport;
pub mod wrapper;

pub use adapter::{Capabilities, ExchangeAdapter, FeedTopics, RestRequest, StreamEvent};
pub use adapters::{Binance, Bitfinex, Bittrex, HitBtc, KuCoin, Kraken};
pub use cache::{CandlesCache, ConcurrentCache, OrderbookCache, SummaryCache};
pub use config::GatewayConfig;
pub use feed::FeedController;
pub use transport::{
    RestCall, RestMethod, StreamMessage, StreamTopic, Transport, channel::ChannelTransport,
};
pub use wrapper::{DataKind, ExchangeGateway};
