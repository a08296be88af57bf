//! Bitfinex: V1 REST, V2 streams
//!
//! Stream messages are `[channel_id, data]` arrays. The book channel opens
//! with a snapshot of `[price, count, amount]` rows and continues with single
//! rows; a positive amount is a bid, a negative one an ask, and `count == 0`
//! clears the level. Messages are not numbered.

use meridian_core::{FeeSchedule, LevelDelta, MarketListing, MarketSummary, Order, OrderBook, Ticker};
use meridian_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::adapter::{Capabilities, ExchangeAdapter, FeedTopics, RestRequest, StreamEvent, listing};
use crate::parse::{
    array_at, as_array, decimal, decimal_at, decimal_index, decode_err, element, field, id_string,
    normalize_side, object_levels, u64_of,
};
use crate::transport::{RestCall, StreamTopic};

pub const TICKER_CHANNEL: &str = "ticker";
pub const BOOK_CHANNEL: &str = "book";

#[derive(Debug, Clone, Copy, Default)]
pub struct Bitfinex;

/// One `[price, count, amount]` row
struct BookRow {
    price: Decimal,
    count: u64,
    amount: Decimal,
}

impl BookRow {
    fn parse(row: &Value) -> ExchangeResult<Self> {
        Ok(Self {
            price: decimal_index(row, 0)?,
            count: u64_of(element(row, 1)?)?,
            amount: decimal_index(row, 2)?,
        })
    }

    fn is_bid(&self) -> bool {
        self.amount.is_sign_positive()
    }

    fn delta(&self) -> LevelDelta {
        LevelDelta::new(self.price, self.count, self.amount.abs())
    }
}

impl Bitfinex {
    /// Stream symbols carry a `t` prefix and are uppercase: `btcusd` -> `tBTCUSD`
    pub fn stream_symbol(symbol: &str) -> String {
        format!("t{}", symbol.to_uppercase())
    }

    fn snapshot(rows: &[Value]) -> ExchangeResult<OrderBook> {
        let mut asks = Vec::new();
        let mut bids = Vec::new();
        for row in rows {
            let row = BookRow::parse(row)?;
            if row.count == 0 {
                continue;
            }
            let level = Order::new(row.price, row.amount.abs());
            if row.is_bid() {
                bids.push(level);
            } else {
                asks.push(level);
            }
        }
        Ok(OrderBook::new(
            normalize_side(asks, false),
            normalize_side(bids, true),
        ))
    }

    fn ticker_summary(data: &[Value]) -> ExchangeResult<MarketSummary> {
        // BID, BID_SIZE, ASK, ASK_SIZE, DAILY_CHANGE, DAILY_CHANGE_PERC, LAST, VOLUME, HIGH, LOW
        if data.len() < 10 {
            return Err(decode_err(format!(
                "bitfinex ticker has {} fields, expected 10",
                data.len()
            )));
        }
        Ok(MarketSummary {
            bid: decimal(&data[0])?,
            ask: decimal(&data[2])?,
            last: decimal(&data[6])?,
            volume: decimal(&data[7])?,
            high: decimal(&data[8])?,
            low: decimal(&data[9])?,
        })
    }
}

impl ExchangeAdapter for Bitfinex {
    fn name(&self) -> &'static str {
        "bitfinex"
    }

    fn fees(&self) -> FeeSchedule {
        FeeSchedule::new(dec!(0.001), dec!(0.002))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            market_orders: true,
            // the V1 API has no candles endpoint
            candles: false,
            list_markets: true,
            streaming: true,
            stream_snapshots: true,
            stream_summaries: true,
        }
    }

    fn rest_call(&self, request: &RestRequest<'_>) -> ExchangeResult<RestCall> {
        let call = match *request {
            RestRequest::OrderBook { symbol } => RestCall::get(format!("/v1/book/{symbol}")),
            RestRequest::Summary { symbol } | RestRequest::Ticker { symbol } => {
                RestCall::get(format!("/v1/pubticker/{symbol}"))
            }
            RestRequest::Candles { .. } => return Err(ExchangeError::NotSupported("candles")),
            RestRequest::Markets => RestCall::get("/v1/symbols"),
            RestRequest::Balance { .. } => RestCall::post("/v1/balances").signed(),
            RestRequest::PlaceOrder {
                symbol,
                side,
                kind,
                amount,
                price,
            } => RestCall::post("/v1/order/new")
                .param("symbol", symbol)
                .param("amount", amount)
                // market orders still need a (ignored) positive price
                .param("price", price.unwrap_or(Decimal::ONE))
                .param("side", side.as_str())
                .param("type", format!("exchange {}", kind.as_str()))
                .signed(),
            RestRequest::Withdraw {
                address,
                currency,
                amount,
            } => RestCall::post("/v1/withdraw")
                .param("withdraw_type", currency.to_lowercase())
                .param("walletselected", "exchange")
                .param("amount", amount)
                .param("address", address)
                .signed(),
        };
        Ok(call)
    }

    fn check_error(&self, payload: &Value) -> ExchangeResult<()> {
        if let Some(message) = payload.as_object().and_then(|o| o.get("message")) {
            return Err(ExchangeError::Exchange(
                message.as_str().unwrap_or_default().to_string(),
            ));
        }
        // withdraw answers with a list of per-request statuses
        if let Some(first) = payload.as_array().and_then(|a| a.first()) {
            if first.get("status").and_then(Value::as_str) == Some("error") {
                let message = first.get("message").and_then(Value::as_str).unwrap_or_default();
                return Err(ExchangeError::Exchange(message.to_string()));
            }
        }
        Ok(())
    }

    fn parse_order_book(&self, payload: &Value) -> ExchangeResult<OrderBook> {
        Ok(OrderBook::new(
            normalize_side(object_levels(array_at(payload, "asks")?, "price", "amount")?, false),
            normalize_side(object_levels(array_at(payload, "bids")?, "price", "amount")?, true),
        ))
    }

    fn parse_summary(&self, payload: &Value, _symbol: &str) -> ExchangeResult<MarketSummary> {
        Ok(MarketSummary {
            high: decimal_at(payload, "high")?,
            low: decimal_at(payload, "low")?,
            volume: decimal_at(payload, "volume")?,
            ask: decimal_at(payload, "ask")?,
            bid: decimal_at(payload, "bid")?,
            last: decimal_at(payload, "last_price")?,
        })
    }

    fn parse_ticker(&self, payload: &Value, _symbol: &str) -> ExchangeResult<Ticker> {
        Ok(Ticker {
            ask: decimal_at(payload, "ask")?,
            bid: decimal_at(payload, "bid")?,
            last: decimal_at(payload, "last_price")?,
        })
    }

    fn parse_markets(&self, payload: &Value) -> ExchangeResult<Vec<MarketListing>> {
        as_array(payload)?
            .iter()
            .map(|pair| {
                let pair = pair
                    .as_str()
                    .ok_or_else(|| decode_err(format!("expected pair name, got {pair}")))?;
                if pair.len() != 6 || !pair.is_ascii() {
                    return Err(decode_err(format!("unexpected bitfinex pair `{pair}`")));
                }
                // `ethbtc` buys eth with btc
                Ok(listing(pair, &pair[3..], &pair[..3]))
            })
            .collect()
    }

    fn parse_balance(&self, payload: &Value, currency: &str) -> ExchangeResult<Decimal> {
        let wanted = currency.to_lowercase();
        let wallet = as_array(payload)?
            .iter()
            .find(|wallet| {
                wallet.get("type").and_then(Value::as_str) == Some("exchange")
                    && wallet.get("currency").and_then(Value::as_str) == Some(wanted.as_str())
            })
            .ok_or_else(|| ExchangeError::CurrencyNotFound(currency.to_string()))?;
        decimal_at(wallet, "available")
    }

    fn parse_order_id(&self, payload: &Value) -> ExchangeResult<String> {
        id_string(field(payload, "order_id")?)
    }

    fn feed_topics(&self, symbol: &str) -> FeedTopics {
        let stream = Self::stream_symbol(symbol);
        FeedTopics {
            ticker: Some(StreamTopic::new(TICKER_CHANNEL, stream.clone())),
            book: Some(StreamTopic::new(BOOK_CHANNEL, stream)),
        }
    }

    fn parse_stream(
        &self,
        topic: &StreamTopic,
        payload: &Value,
    ) -> ExchangeResult<Option<StreamEvent>> {
        // subscription acks and info events are objects
        if payload.is_object() {
            return Ok(None);
        }
        let raw = element(payload, 1)?;
        if raw.as_str() == Some("hb") {
            return Ok(None);
        }
        let data = as_array(raw)?;

        match topic.channel.as_str() {
            TICKER_CHANNEL => Ok(Some(StreamEvent::Summary(Self::ticker_summary(data)?))),
            BOOK_CHANNEL => {
                if data.first().is_some_and(Value::is_array) {
                    return Ok(Some(StreamEvent::BookSnapshot {
                        sequence: None,
                        book: Self::snapshot(data)?,
                    }));
                }
                let row = BookRow::parse(raw)?;
                let delta = row.delta();
                let (asks, bids) = if row.is_bid() {
                    (Vec::new(), vec![delta])
                } else {
                    (vec![delta], Vec::new())
                };
                Ok(Some(StreamEvent::BookDelta {
                    sequence: None,
                    asks,
                    bids,
                }))
            }
            other => Err(decode_err(format!("unknown bitfinex channel `{other}`"))),
        }
    }
}
