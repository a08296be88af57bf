//! HitBTC API v2
//!
//! The book stream is JSON-RPC: `snapshotOrderbook` first, then
//! `updateOrderbook` notifications, both numbered by `sequence`.

use meridian_core::{
    CandleStick, FeeSchedule, LevelDelta, MarketListing, MarketSummary, OrderBook, OrderKind,
    Ticker,
};
use meridian_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::adapter::{Capabilities, ExchangeAdapter, FeedTopics, RestRequest, StreamEvent, listing};
use crate::parse::{
    array_at, as_array, decimal_at, decode_err, field, normalize_side, object_levels,
    rfc3339_timestamp, str_at, u64_at,
};
use crate::transport::{RestCall, StreamTopic};

pub const TICKER_CHANNEL: &str = "ticker";
pub const ORDERBOOK_CHANNEL: &str = "orderbook";

#[derive(Debug, Clone, Copy, Default)]
pub struct HitBtc;

impl HitBtc {
    fn summary(ticker: &Value) -> ExchangeResult<MarketSummary> {
        Ok(MarketSummary {
            high: decimal_at(ticker, "high")?,
            low: decimal_at(ticker, "low")?,
            volume: decimal_at(ticker, "volume")?,
            ask: decimal_at(ticker, "ask")?,
            bid: decimal_at(ticker, "bid")?,
            last: decimal_at(ticker, "last")?,
        })
    }

    fn book(book: &Value) -> ExchangeResult<OrderBook> {
        Ok(OrderBook::new(
            normalize_side(object_levels(array_at(book, "ask")?, "price", "size")?, false),
            normalize_side(object_levels(array_at(book, "bid")?, "price", "size")?, true),
        ))
    }

    /// Size "0.00" removes the level
    fn changes(levels: &[Value]) -> ExchangeResult<Vec<LevelDelta>> {
        Ok(object_levels(levels, "price", "size")?
            .into_iter()
            .map(|level| LevelDelta::upsert(level.price, level.quantity))
            .collect())
    }
}

impl ExchangeAdapter for HitBtc {
    fn name(&self) -> &'static str {
        "hitbtc"
    }

    fn fees(&self) -> FeeSchedule {
        FeeSchedule::new(dec!(0.0025), dec!(0.0025))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            market_orders: true,
            candles: true,
            list_markets: true,
            streaming: true,
            stream_snapshots: true,
            stream_summaries: true,
        }
    }

    fn rest_call(&self, request: &RestRequest<'_>) -> ExchangeResult<RestCall> {
        let call = match *request {
            RestRequest::OrderBook { symbol } => {
                RestCall::get(format!("/api/2/public/orderbook/{symbol}")).param("limit", 100)
            }
            RestRequest::Summary { symbol } | RestRequest::Ticker { symbol } => {
                RestCall::get(format!("/api/2/public/ticker/{symbol}"))
            }
            RestRequest::Candles { symbol } => {
                RestCall::get(format!("/api/2/public/candles/{symbol}")).param("period", "H1")
            }
            RestRequest::Markets => RestCall::get("/api/2/public/symbol"),
            RestRequest::Balance { .. } => RestCall::get("/api/2/trading/balance").signed(),
            RestRequest::PlaceOrder {
                symbol,
                side,
                kind,
                amount,
                price,
            } => {
                let call = RestCall::post("/api/2/order")
                    .param("symbol", symbol)
                    .param("side", side.as_str())
                    .param("type", kind.as_str())
                    .param("quantity", amount);
                match (kind, price) {
                    (OrderKind::Limit, Some(price)) => call.param("price", price).signed(),
                    (OrderKind::Limit, None) => {
                        return Err(ExchangeError::NotSupported("limit order without price"));
                    }
                    (OrderKind::Market, _) => call.signed(),
                }
            }
            RestRequest::Withdraw {
                address,
                currency,
                amount,
            } => RestCall::post("/api/2/account/crypto/withdraw")
                .param("currency", currency)
                .param("amount", amount)
                .param("address", address)
                .signed(),
        };
        Ok(call)
    }

    fn check_error(&self, payload: &Value) -> ExchangeResult<()> {
        match payload.get("error") {
            Some(error) if !error.is_null() => Err(ExchangeError::Exchange(
                error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("request failed")
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn parse_order_book(&self, payload: &Value) -> ExchangeResult<OrderBook> {
        Self::book(payload)
    }

    fn parse_summary(&self, payload: &Value, _symbol: &str) -> ExchangeResult<MarketSummary> {
        Self::summary(payload)
    }

    fn parse_ticker(&self, payload: &Value, _symbol: &str) -> ExchangeResult<Ticker> {
        Ok(Ticker {
            ask: decimal_at(payload, "ask")?,
            bid: decimal_at(payload, "bid")?,
            last: decimal_at(payload, "last")?,
        })
    }

    fn parse_candles(&self, payload: &Value, _symbol: &str) -> ExchangeResult<Vec<CandleStick>> {
        as_array(payload)?
            .iter()
            .map(|candle| {
                Ok(CandleStick {
                    open: decimal_at(candle, "open")?,
                    high: decimal_at(candle, "max")?,
                    low: decimal_at(candle, "min")?,
                    close: decimal_at(candle, "close")?,
                    volume: decimal_at(candle, "volume")?,
                    open_time: Some(rfc3339_timestamp(field(candle, "timestamp")?)?),
                })
            })
            .collect()
    }

    fn parse_markets(&self, payload: &Value) -> ExchangeResult<Vec<MarketListing>> {
        as_array(payload)?
            .iter()
            .map(|symbol| {
                Ok(listing(
                    str_at(symbol, "id")?,
                    str_at(symbol, "quoteCurrency")?,
                    str_at(symbol, "baseCurrency")?,
                ))
            })
            .collect()
    }

    fn parse_balance(&self, payload: &Value, currency: &str) -> ExchangeResult<Decimal> {
        let balance = as_array(payload)?
            .iter()
            .find(|balance| balance.get("currency").and_then(Value::as_str) == Some(currency))
            .ok_or_else(|| ExchangeError::CurrencyNotFound(currency.to_string()))?;
        decimal_at(balance, "available")
    }

    fn parse_order_id(&self, payload: &Value) -> ExchangeResult<String> {
        Ok(str_at(payload, "clientOrderId")?.to_string())
    }

    fn feed_topics(&self, symbol: &str) -> FeedTopics {
        FeedTopics {
            ticker: Some(StreamTopic::new(TICKER_CHANNEL, symbol)),
            book: Some(StreamTopic::new(ORDERBOOK_CHANNEL, symbol)),
        }
    }

    fn parse_stream(
        &self,
        _topic: &StreamTopic,
        payload: &Value,
    ) -> ExchangeResult<Option<StreamEvent>> {
        self.check_error(payload)?;
        // subscription replies carry `result`, not `method`
        let Some(method) = payload.get("method").and_then(Value::as_str) else {
            return Ok(None);
        };
        let params = field(payload, "params")?;

        match method {
            "ticker" => Ok(Some(StreamEvent::Summary(Self::summary(params)?))),
            "snapshotOrderbook" => Ok(Some(StreamEvent::BookSnapshot {
                sequence: Some(u64_at(params, "sequence")?),
                book: Self::book(params)?,
            })),
            "updateOrderbook" => Ok(Some(StreamEvent::BookDelta {
                sequence: Some(u64_at(params, "sequence")?),
                asks: Self::changes(array_at(params, "ask")?)?,
                bids: Self::changes(array_at(params, "bid")?)?,
            })),
            other => Err(decode_err(format!("unexpected hitbtc method `{other}`"))),
        }
    }
}
