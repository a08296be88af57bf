//! Per-exchange payload translation
//!
//! An [`ExchangeAdapter`] knows one exchange's endpoints, symbol notation and
//! payload shapes, and nothing else. Caching, mode switching, timeouts and
//! feed lifecycle live in [`crate::ExchangeGateway`] and
//! [`crate::FeedController`], shared by every exchange.

use meridian_core::{
    CandleStick, FeeSchedule, LevelDelta, MarketListing, MarketSummary, OrderBook, OrderKind,
    Price, Quantity, Side, Ticker,
};
use meridian_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::transport::{RestCall, StreamTopic};

/// What an exchange's API can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub market_orders: bool,
    pub candles: bool,
    pub list_markets: bool,
    pub streaming: bool,
    /// The book stream opens with its own snapshot; otherwise one is
    /// fetched over REST after subscribing
    pub stream_snapshots: bool,
    /// The ticker stream carries full summaries; otherwise it only carries
    /// prices and a summary is fetched over REST when a session starts
    pub stream_summaries: bool,
}

/// A REST operation to be translated into an exchange call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestRequest<'a> {
    OrderBook {
        symbol: &'a str,
    },
    Summary {
        symbol: &'a str,
    },
    Ticker {
        symbol: &'a str,
    },
    Candles {
        symbol: &'a str,
    },
    Markets,
    Balance {
        currency: &'a str,
    },
    PlaceOrder {
        symbol: &'a str,
        side: Side,
        kind: OrderKind,
        amount: Quantity,
        /// Set for limit orders
        price: Option<Price>,
    },
    Withdraw {
        address: &'a str,
        currency: &'a str,
        amount: Decimal,
    },
}

impl RestRequest<'_> {
    /// Short label for logs and `NotSupported` errors
    pub fn label(&self) -> &'static str {
        match self {
            RestRequest::OrderBook { .. } => "order book",
            RestRequest::Summary { .. } => "market summary",
            RestRequest::Ticker { .. } => "ticker",
            RestRequest::Candles { .. } => "candles",
            RestRequest::Markets => "market listing",
            RestRequest::Balance { .. } => "balance",
            RestRequest::PlaceOrder {
                kind: OrderKind::Market,
                ..
            } => "market orders",
            RestRequest::PlaceOrder { .. } => "limit orders",
            RestRequest::Withdraw { .. } => "withdraw",
        }
    }
}

/// Topics a market's feed listens on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedTopics {
    pub ticker: Option<StreamTopic>,
    pub book: Option<StreamTopic>,
}

impl FeedTopics {
    pub fn iter(&self) -> impl Iterator<Item = &StreamTopic> {
        self.ticker.iter().chain(self.book.iter())
    }
}

/// A decoded stream message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Full window statistics
    Summary(MarketSummary),
    /// Ask/bid/last only; merged into the cached summary
    Ticker(Ticker),
    /// Replaces the cached book. `None` sequence: the exchange does not
    /// number its messages and the feed numbers them locally.
    BookSnapshot {
        sequence: Option<u64>,
        book: OrderBook,
    },
    BookDelta {
        sequence: Option<u64>,
        asks: Vec<LevelDelta>,
        bids: Vec<LevelDelta>,
    },
}

/// Exchange-specific knowledge behind one [`crate::ExchangeGateway`]
pub trait ExchangeAdapter: Send + Sync + 'static {
    /// Lowercase exchange identifier (`binance`, `kraken`, ...)
    fn name(&self) -> &'static str;

    fn fees(&self) -> FeeSchedule;

    fn capabilities(&self) -> Capabilities;

    /// Build the call for `request`; `NotSupported` when the API lacks it
    fn rest_call(&self, request: &RestRequest<'_>) -> ExchangeResult<RestCall>;

    /// Detect an exchange-side error carried in a successful response
    fn check_error(&self, _payload: &Value) -> ExchangeResult<()> {
        Ok(())
    }

    fn parse_order_book(&self, payload: &Value) -> ExchangeResult<OrderBook>;

    /// Sequence number a REST book snapshot corresponds to, if the exchange
    /// provides one
    fn book_sequence(&self, _payload: &Value) -> Option<u64> {
        None
    }

    fn parse_summary(&self, payload: &Value, symbol: &str) -> ExchangeResult<MarketSummary>;

    fn parse_ticker(&self, payload: &Value, symbol: &str) -> ExchangeResult<Ticker>;

    fn parse_candles(&self, _payload: &Value, _symbol: &str) -> ExchangeResult<Vec<CandleStick>> {
        Err(ExchangeError::NotSupported("candles"))
    }

    fn parse_markets(&self, _payload: &Value) -> ExchangeResult<Vec<MarketListing>> {
        Err(ExchangeError::NotSupported("market listing"))
    }

    fn parse_balance(&self, payload: &Value, currency: &str) -> ExchangeResult<Decimal>;

    fn parse_order_id(&self, payload: &Value) -> ExchangeResult<String>;

    fn feed_topics(&self, _symbol: &str) -> FeedTopics {
        FeedTopics::default()
    }

    /// Decode one stream payload
    ///
    /// `Ok(None)` for messages that carry no market data (heartbeats,
    /// acknowledgements). An `Err` means the stream can no longer be
    /// trusted and its handler stops.
    fn parse_stream(
        &self,
        _topic: &StreamTopic,
        _payload: &Value,
    ) -> ExchangeResult<Option<StreamEvent>> {
        Err(ExchangeError::WebsocketNotSupported)
    }
}

/// Listing for an exchange symbol given its paying and bought currencies
pub(crate) fn listing(symbol: &str, paid_with: &str, bought: &str) -> MarketListing {
    MarketListing {
        name: symbol.to_string(),
        base_currency: paid_with.to_uppercase(),
        quote_currency: bought.to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_request_labels() {
        let market = RestRequest::PlaceOrder {
            symbol: "ETHBTC",
            side: Side::Buy,
            kind: OrderKind::Market,
            amount: dec!(1),
            price: None,
        };
        assert_eq!(market.label(), "market orders");
        assert_eq!(RestRequest::Markets.label(), "market listing");
    }

    #[test]
    fn test_feed_topics_iter() {
        let topics = FeedTopics {
            ticker: None,
            book: Some(StreamTopic::new("depth", "ETHBTC")),
        };
        assert_eq!(topics.iter().count(), 1);
    }
}
