use async_trait::async_trait;
use meridian_core::{
    CandleStick, Market, MarketListing, MarketRef, MarketSummary, OrderBook, Price, Quantity,
    Ticker, TradeType,
};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

use crate::error::ExchangeResult;

/// Lifecycle of one market's streaming feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    NotSubscribed,
    /// Subscribed, waiting for the first snapshot
    Connecting,
    Live,
    /// Transport dropped; backing off before resubscribing
    Reconnecting,
    /// Handler exited on an unrecoverable error
    Failed(String),
    /// Unsubscribed by the caller
    Stopped,
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedStatus::NotSubscribed => write!(f, "not subscribed"),
            FeedStatus::Connecting => write!(f, "connecting"),
            FeedStatus::Live => write!(f, "live"),
            FeedStatus::Reconnecting => write!(f, "reconnecting"),
            FeedStatus::Failed(reason) => write!(f, "failed: {reason}"),
            FeedStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Port for a single exchange
///
/// Implementations translate exchange-specific payloads into the canonical
/// model and own their caches and streaming state. All methods take `&self`
/// so one instance can be shared as `Arc<dyn ExchangeWrapper>` between
/// strategy tasks.
///
/// Reads (`get_candles`, `get_market_summary`, `get_order_book`) fetch over
/// REST until [`feed_connect`](ExchangeWrapper::feed_connect) switches the
/// wrapper to streaming, after which they serve exclusively from cache.
#[async_trait]
pub trait ExchangeWrapper: Send + Sync {
    /// Stable lowercase identifier, also the key into a market's symbol table
    fn name(&self) -> &str;

    async fn get_candles(&self, market: &Market) -> ExchangeResult<Arc<Vec<CandleStick>>>;

    async fn get_market_summary(&self, market: &Market) -> ExchangeResult<MarketSummary>;

    async fn get_order_book(&self, market: &Market) -> ExchangeResult<Arc<OrderBook>>;

    async fn get_ticker(&self, market: &Market) -> ExchangeResult<Ticker>;

    /// Markets listed by the exchange; never cached
    async fn get_markets(&self) -> ExchangeResult<Vec<MarketListing>>;

    /// Place a limit buy, returning the exchange order id
    async fn buy_limit(&self, market: &Market, amount: Quantity, limit: Price)
    -> ExchangeResult<String>;

    async fn sell_limit(
        &self,
        market: &Market,
        amount: Quantity,
        limit: Price,
    ) -> ExchangeResult<String>;

    /// Fails with `NotSupported` where the exchange has no true market orders
    async fn buy_market(&self, market: &Market, amount: Quantity) -> ExchangeResult<String>;

    async fn sell_market(&self, market: &Market, amount: Quantity) -> ExchangeResult<String>;

    /// `amount * limit * rate` from the exchange's static fee table
    fn calculate_trading_fees(
        &self,
        market: &Market,
        amount: Quantity,
        limit: Price,
        trade_type: TradeType,
    ) -> Decimal;

    fn calculate_withdraw_fees(&self, market: &Market, amount: Quantity)
    -> ExchangeResult<Decimal>;

    async fn get_balance(&self, currency: &str) -> ExchangeResult<Decimal>;

    fn get_deposit_address(&self, currency: &str) -> Option<String>;

    /// Switch to push mode for `markets`; idempotent per market
    ///
    /// Exchanges without streaming return `WebsocketNotSupported` so callers
    /// can keep polling.
    async fn feed_connect(&self, markets: &[MarketRef]) -> ExchangeResult<()>;

    /// Stop the feeds of `markets`, returning once their handlers have exited
    async fn feed_disconnect(&self, markets: &[MarketRef]) -> ExchangeResult<()>;

    fn feed_status(&self, market: &Market) -> FeedStatus;

    async fn withdraw(
        &self,
        destination: &str,
        currency: &str,
        amount: Decimal,
    ) -> ExchangeResult<()>;
}
