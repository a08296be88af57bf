//! The generic exchange wrapper
//!
//! ```text
//!   strategies ──► ExchangeWrapper (ExchangeGateway<A>)
//!                     │            │
//!          REST mode  │            │ STREAMING mode
//!                     ▼            ▼
//!                 RestClient ◄── caches ◄── FeedController tasks
//!                     │                          │
//!                     └──────► Transport ◄───────┘
//! ```
//!
//! Each data kind (summary, order book, candles) starts in REST mode: every
//! read fetches, stores the result in the cache and returns it.
//! `feed_connect` moves summaries and order books of the given markets to
//! STREAMING mode, where reads serve only from cache. Candles are never
//! streamed.

use async_trait::async_trait;
use log::{debug, info, warn};
use meridian_core::{
    CandleStick, FeeSchedule, Market, MarketListing, MarketRef, MarketSummary, OrderBook,
    OrderKind, Price, Quantity, Side, Ticker, TradeType,
};
use meridian_ports::{ExchangeError, ExchangeResult, ExchangeWrapper, FeedStatus};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::adapter::{ExchangeAdapter, RestRequest};
use crate::cache::{CandlesCache, OrderbookCache, SummaryCache};
use crate::config::GatewayConfig;
use crate::feed::FeedController;
use crate::rest::RestClient;
use crate::transport::Transport;

/// Cached data kinds with their own acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Summary,
    OrderBook,
    Candles,
}

#[derive(Debug, Default)]
struct StreamingModes {
    summary: AtomicBool,
    order_book: AtomicBool,
    candles: AtomicBool,
}

impl StreamingModes {
    fn flag(&self, kind: DataKind) -> &AtomicBool {
        match kind {
            DataKind::Summary => &self.summary,
            DataKind::OrderBook => &self.order_book,
            DataKind::Candles => &self.candles,
        }
    }
}

/// [`ExchangeWrapper`] for any exchange described by an [`ExchangeAdapter`]
pub struct ExchangeGateway<A: ExchangeAdapter> {
    rest: RestClient<A>,
    fees: FeeSchedule,
    summaries: Arc<SummaryCache>,
    candles: Arc<CandlesCache>,
    books: Arc<OrderbookCache>,
    modes: StreamingModes,
    feeds: FeedController<A>,
    deposit_addresses: HashMap<String, String>,
    withdraw_fees: HashMap<String, Decimal>,
}

impl<A: ExchangeAdapter> ExchangeGateway<A> {
    pub fn new(adapter: A, transport: Arc<dyn Transport>, config: GatewayConfig) -> Self {
        let fees = adapter.fees();
        let rest = RestClient::new(Arc::new(adapter), transport, config.request_timeout);
        let summaries = Arc::new(SummaryCache::new());
        let books = Arc::new(OrderbookCache::new());
        let feeds = FeedController::new(
            rest.clone(),
            Arc::clone(&summaries),
            Arc::clone(&books),
            config,
        );

        Self {
            rest,
            fees,
            summaries,
            candles: Arc::new(CandlesCache::new()),
            books,
            modes: StreamingModes::default(),
            feeds,
            deposit_addresses: HashMap::new(),
            withdraw_fees: HashMap::new(),
        }
    }

    /// Known deposit addresses by currency code
    pub fn with_deposit_addresses(mut self, addresses: HashMap<String, String>) -> Self {
        self.deposit_addresses = addresses;
        self
    }

    /// Flat withdraw fee by currency code
    pub fn with_withdraw_fees(mut self, fees: HashMap<String, Decimal>) -> Self {
        self.withdraw_fees = fees;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.rest.adapter
    }

    pub fn is_streaming(&self, kind: DataKind) -> bool {
        self.modes.flag(kind).load(Ordering::Acquire)
    }

    /// Stop every running feed
    pub async fn shutdown(&self) {
        self.feeds.shutdown().await;
    }

    fn symbol<'m>(&self, market: &'m Market) -> ExchangeResult<&'m str> {
        market
            .symbol_for(self.name())
            .ok_or_else(|| ExchangeError::SymbolNotFound {
                exchange: self.name().to_string(),
                market: market.name().to_string(),
            })
    }

    /// Whether reads of `kind` for `market` come from its feed
    ///
    /// A failed or reconnecting feed surfaces as an error rather than a
    /// stale value.
    fn served_by_feed(&self, kind: DataKind, market: &Market) -> ExchangeResult<bool> {
        if !self.is_streaming(kind) || !self.feeds.is_tracking(market) {
            return Ok(false);
        }
        match self.feeds.status(market) {
            FeedStatus::Failed(reason) => Err(ExchangeError::FeedFailed(reason)),
            FeedStatus::Reconnecting => Err(ExchangeError::FeedReconnecting),
            _ => Ok(true),
        }
    }

    async fn place_order(
        &self,
        market: &Market,
        side: Side,
        kind: OrderKind,
        amount: Quantity,
        price: Option<Price>,
    ) -> ExchangeResult<String> {
        if kind == OrderKind::Market && !self.rest.adapter.capabilities().market_orders {
            return Err(ExchangeError::NotSupported("market orders"));
        }
        let payload = self
            .rest
            .fetch(RestRequest::PlaceOrder {
                symbol: self.symbol(market)?,
                side,
                kind,
                amount,
                price,
            })
            .await?;
        let order_id = self.rest.adapter.parse_order_id(&payload)?;
        info!(
            "{} {} {} {amount}{} on {}: order {order_id}",
            self.name(),
            kind.as_str(),
            side.as_str(),
            price.map(|p| format!(" @ {p}")).unwrap_or_default(),
            market.name()
        );
        Ok(order_id)
    }
}

impl<A: ExchangeAdapter> fmt::Display for ExchangeGateway<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rest.adapter.name())
    }
}

#[async_trait]
impl<A: ExchangeAdapter> ExchangeWrapper for ExchangeGateway<A> {
    fn name(&self) -> &str {
        self.rest.adapter.name()
    }

    async fn get_candles(&self, market: &Market) -> ExchangeResult<Arc<Vec<CandleStick>>> {
        if self.served_by_feed(DataKind::Candles, market)? {
            return self
                .candles
                .get(market)
                .ok_or(ExchangeError::CandlesNotLoaded);
        }
        if !self.rest.adapter.capabilities().candles {
            return Err(ExchangeError::NotSupported("candles"));
        }

        let symbol = self.symbol(market)?;
        let payload = self.rest.fetch(RestRequest::Candles { symbol }).await?;
        let candles = Arc::new(self.rest.adapter.parse_candles(&payload, symbol)?);
        self.candles.set_shared(market, Arc::clone(&candles));
        Ok(candles)
    }

    async fn get_market_summary(&self, market: &Market) -> ExchangeResult<MarketSummary> {
        if self.served_by_feed(DataKind::Summary, market)? {
            return self
                .summaries
                .get(market)
                .map(|summary| *summary)
                .ok_or(ExchangeError::SummaryNotLoaded);
        }

        let symbol = self.symbol(market)?;
        let payload = self.rest.fetch(RestRequest::Summary { symbol }).await?;
        let summary = self.rest.adapter.parse_summary(&payload, symbol)?;
        self.summaries.set(market, summary);
        Ok(summary)
    }

    async fn get_order_book(&self, market: &Market) -> ExchangeResult<Arc<OrderBook>> {
        if self.served_by_feed(DataKind::OrderBook, market)? {
            return self
                .books
                .get(market)
                .ok_or(ExchangeError::OrderbookNotLoaded);
        }

        let symbol = self.symbol(market)?;
        let payload = self.rest.fetch(RestRequest::OrderBook { symbol }).await?;
        let book = Arc::new(self.rest.adapter.parse_order_book(&payload)?);
        self.books.set_shared(market, Arc::clone(&book));
        Ok(book)
    }

    async fn get_ticker(&self, market: &Market) -> ExchangeResult<Ticker> {
        if self.served_by_feed(DataKind::Summary, market)? {
            return self
                .summaries
                .get(market)
                .map(|summary| summary.ticker())
                .ok_or(ExchangeError::SummaryNotLoaded);
        }

        let symbol = self.symbol(market)?;
        let payload = self.rest.fetch(RestRequest::Ticker { symbol }).await?;
        self.rest.adapter.parse_ticker(&payload, symbol)
    }

    async fn get_markets(&self) -> ExchangeResult<Vec<MarketListing>> {
        if !self.rest.adapter.capabilities().list_markets {
            return Err(ExchangeError::NotSupported("market listing"));
        }
        let payload = self.rest.fetch(RestRequest::Markets).await?;
        self.rest.adapter.parse_markets(&payload)
    }

    async fn buy_limit(
        &self,
        market: &Market,
        amount: Quantity,
        limit: Price,
    ) -> ExchangeResult<String> {
        self.place_order(market, Side::Buy, OrderKind::Limit, amount, Some(limit))
            .await
    }

    async fn sell_limit(
        &self,
        market: &Market,
        amount: Quantity,
        limit: Price,
    ) -> ExchangeResult<String> {
        self.place_order(market, Side::Sell, OrderKind::Limit, amount, Some(limit))
            .await
    }

    async fn buy_market(&self, market: &Market, amount: Quantity) -> ExchangeResult<String> {
        self.place_order(market, Side::Buy, OrderKind::Market, amount, None)
            .await
    }

    async fn sell_market(&self, market: &Market, amount: Quantity) -> ExchangeResult<String> {
        self.place_order(market, Side::Sell, OrderKind::Market, amount, None)
            .await
    }

    fn calculate_trading_fees(
        &self,
        _market: &Market,
        amount: Quantity,
        limit: Price,
        trade_type: TradeType,
    ) -> Decimal {
        self.fees.trading_fee(amount, limit, trade_type)
    }

    fn calculate_withdraw_fees(
        &self,
        market: &Market,
        _amount: Quantity,
    ) -> ExchangeResult<Decimal> {
        self.withdraw_fees
            .get(market.quote_currency())
            .copied()
            .ok_or(ExchangeError::NotSupported("withdraw fee for currency"))
    }

    async fn get_balance(&self, currency: &str) -> ExchangeResult<Decimal> {
        let payload = self.rest.fetch(RestRequest::Balance { currency }).await?;
        self.rest.adapter.parse_balance(&payload, currency)
    }

    fn get_deposit_address(&self, currency: &str) -> Option<String> {
        self.deposit_addresses.get(currency).cloned()
    }

    async fn feed_connect(&self, markets: &[MarketRef]) -> ExchangeResult<()> {
        if !self.rest.adapter.capabilities().streaming {
            return Err(ExchangeError::WebsocketNotSupported);
        }

        // resolve every symbol before opening anything
        let symbols = markets
            .iter()
            .map(|market| self.symbol(market))
            .collect::<ExchangeResult<Vec<_>>>()?;

        let mut started = Vec::new();
        for (market, symbol) in markets.iter().zip(symbols) {
            match self.feeds.connect(market, symbol).await {
                Ok(true) => started.push(market),
                Ok(false) => debug!("{}: {} already streaming", self.name(), market.name()),
                Err(err) => {
                    warn!(
                        "{}: subscribing {} failed, stopping {} feed(s) started with it: {err}",
                        self.name(),
                        market.name(),
                        started.len()
                    );
                    for market in started {
                        self.feeds.disconnect(market).await;
                    }
                    return Err(err);
                }
            }
        }

        self.modes.summary.store(true, Ordering::Release);
        self.modes.order_book.store(true, Ordering::Release);
        Ok(())
    }

    async fn feed_disconnect(&self, markets: &[MarketRef]) -> ExchangeResult<()> {
        for market in markets {
            if !self.feeds.disconnect(market).await {
                debug!("{}: {} was not streaming", self.name(), market.name());
            }
        }
        Ok(())
    }

    fn feed_status(&self, market: &Market) -> FeedStatus {
        self.feeds.status(market)
    }

    async fn withdraw(
        &self,
        destination: &str,
        currency: &str,
        amount: Decimal,
    ) -> ExchangeResult<()> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(amount));
        }
        self.rest
            .fetch(RestRequest::Withdraw {
                address: destination,
                currency,
                amount,
            })
            .await?;
        info!("{} withdrew {amount} {currency} to {destination}", self.name());
        Ok(())
    }
}
