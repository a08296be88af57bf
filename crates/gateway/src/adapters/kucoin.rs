//! KuCoin API v1
//!
//! REST bodies are `{"code": "200000", "data": ...}`. The level2 stream
//! sends deltas only, numbered by `sequenceEnd`; the REST snapshot's
//! `sequence` anchors them.

use meridian_core::{
    CandleStick, FeeSchedule, MarketListing, MarketSummary, OrderBook, OrderKind, Ticker,
};
use meridian_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use uuid::Uuid;

use crate::adapter::{Capabilities, ExchangeAdapter, FeedTopics, RestRequest, StreamEvent, listing};
use crate::parse::{
    array_at, array_changes, array_levels, as_array, decimal_at, decimal_index, decode_err,
    element, epoch_timestamp, field, normalize_side, str_at, u64_at,
};
use crate::transport::{RestCall, StreamTopic};

pub const TICKER_CHANNEL: &str = "/market/ticker";
pub const LEVEL2_CHANNEL: &str = "/market/level2";

const SUCCESS: &str = "200000";

#[derive(Debug, Clone, Copy, Default)]
pub struct KuCoin;

fn data(payload: &Value) -> ExchangeResult<&Value> {
    field(payload, "data")
}

impl ExchangeAdapter for KuCoin {
    fn name(&self) -> &'static str {
        "kucoin"
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
            stream_snapshots: false,
            stream_summaries: false,
        }
    }

    fn rest_call(&self, request: &RestRequest<'_>) -> ExchangeResult<RestCall> {
        let call = match *request {
            RestRequest::OrderBook { symbol } => {
                RestCall::get("/api/v1/market/orderbook/level2_100").param("symbol", symbol)
            }
            RestRequest::Summary { symbol } => {
                RestCall::get("/api/v1/market/stats").param("symbol", symbol)
            }
            RestRequest::Ticker { symbol } => {
                RestCall::get("/api/v1/market/orderbook/level1").param("symbol", symbol)
            }
            RestRequest::Candles { symbol } => RestCall::get("/api/v1/market/candles")
                .param("symbol", symbol)
                .param("type", "1hour"),
            RestRequest::Markets => RestCall::get("/api/v1/symbols"),
            RestRequest::Balance { currency } => RestCall::get("/api/v1/accounts")
                .param("currency", currency)
                .param("type", "trade")
                .signed(),
            RestRequest::PlaceOrder {
                symbol,
                side,
                kind,
                amount,
                price,
            } => {
                let call = RestCall::post("/api/v1/orders")
                    .param("clientOid", Uuid::new_v4().simple())
                    .param("symbol", symbol)
                    .param("side", side.as_str())
                    .param("type", kind.as_str())
                    .param("size", amount);
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
            } => RestCall::post("/api/v1/withdrawals")
                .param("currency", currency)
                .param("address", address)
                .param("amount", amount)
                .signed(),
        };
        Ok(call)
    }

    fn check_error(&self, payload: &Value) -> ExchangeResult<()> {
        match payload.get("code").and_then(Value::as_str) {
            Some(SUCCESS) | None => Ok(()),
            Some(code) => Err(ExchangeError::Exchange(format!(
                "{} ({code})",
                payload.get("msg").and_then(Value::as_str).unwrap_or_default()
            ))),
        }
    }

    fn parse_order_book(&self, payload: &Value) -> ExchangeResult<OrderBook> {
        let book = data(payload)?;
        Ok(OrderBook::new(
            normalize_side(array_levels(array_at(book, "asks")?)?, false),
            normalize_side(array_levels(array_at(book, "bids")?)?, true),
        ))
    }

    fn book_sequence(&self, payload: &Value) -> Option<u64> {
        data(payload).and_then(|book| u64_at(book, "sequence")).ok()
    }

    fn parse_summary(&self, payload: &Value, _symbol: &str) -> ExchangeResult<MarketSummary> {
        let stats = data(payload)?;
        Ok(MarketSummary {
            high: decimal_at(stats, "high")?,
            low: decimal_at(stats, "low")?,
            volume: decimal_at(stats, "vol")?,
            ask: decimal_at(stats, "sell")?,
            bid: decimal_at(stats, "buy")?,
            last: decimal_at(stats, "last")?,
        })
    }

    fn parse_ticker(&self, payload: &Value, _symbol: &str) -> ExchangeResult<Ticker> {
        let ticker = data(payload)?;
        Ok(Ticker {
            ask: decimal_at(ticker, "bestAsk")?,
            bid: decimal_at(ticker, "bestBid")?,
            last: decimal_at(ticker, "price")?,
        })
    }

    fn parse_candles(&self, payload: &Value, _symbol: &str) -> ExchangeResult<Vec<CandleStick>> {
        // [time, open, close, high, low, volume, turnover]
        as_array(data(payload)?)?
            .iter()
            .map(|row| {
                Ok(CandleStick {
                    open_time: Some(epoch_timestamp(element(row, 0)?, false)?),
                    open: decimal_index(row, 1)?,
                    close: decimal_index(row, 2)?,
                    high: decimal_index(row, 3)?,
                    low: decimal_index(row, 4)?,
                    volume: decimal_index(row, 5)?,
                })
            })
            .collect()
    }

    fn parse_markets(&self, payload: &Value) -> ExchangeResult<Vec<MarketListing>> {
        as_array(data(payload)?)?
            .iter()
            .filter(|market| market.get("enableTrading").and_then(Value::as_bool) != Some(false))
            .map(|market| {
                Ok(listing(
                    str_at(market, "symbol")?,
                    str_at(market, "quoteCurrency")?,
                    str_at(market, "baseCurrency")?,
                ))
            })
            .collect()
    }

    fn parse_balance(&self, payload: &Value, currency: &str) -> ExchangeResult<Decimal> {
        let account = as_array(data(payload)?)?
            .iter()
            .find(|account| {
                account.get("currency").and_then(Value::as_str) == Some(currency)
                    && account.get("type").and_then(Value::as_str) == Some("trade")
            })
            .ok_or_else(|| ExchangeError::CurrencyNotFound(currency.to_string()))?;
        decimal_at(account, "available")
    }

    fn parse_order_id(&self, payload: &Value) -> ExchangeResult<String> {
        Ok(str_at(data(payload)?, "orderId")?.to_string())
    }

    fn feed_topics(&self, symbol: &str) -> FeedTopics {
        FeedTopics {
            ticker: Some(StreamTopic::new(TICKER_CHANNEL, symbol)),
            book: Some(StreamTopic::new(LEVEL2_CHANNEL, symbol)),
        }
    }

    fn parse_stream(
        &self,
        _topic: &StreamTopic,
        payload: &Value,
    ) -> ExchangeResult<Option<StreamEvent>> {
        match payload.get("type").and_then(Value::as_str) {
            Some("message") => {}
            Some("error") => {
                return Err(ExchangeError::Exchange(
                    payload
                        .get("data")
                        .and_then(Value::as_str)
                        .unwrap_or("stream error")
                        .to_string(),
                ));
            }
            // welcome, ack, pong
            _ => return Ok(None),
        }

        let event = data(payload)?;
        match str_at(payload, "subject")? {
            "trade.ticker" => Ok(Some(StreamEvent::Ticker(Ticker {
                ask: decimal_at(event, "bestAsk")?,
                bid: decimal_at(event, "bestBid")?,
                last: decimal_at(event, "price")?,
            }))),
            "trade.l2update" => {
                let changes = field(event, "changes")?;
                Ok(Some(StreamEvent::BookDelta {
                    sequence: Some(u64_at(event, "sequenceEnd")?),
                    asks: array_changes(array_at(changes, "asks")?)?,
                    bids: array_changes(array_at(changes, "bids")?)?,
                }))
            }
            other => Err(decode_err(format!("unexpected kucoin subject `{other}`"))),
        }
    }
}
