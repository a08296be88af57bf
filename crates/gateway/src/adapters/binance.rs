//! Binance spot API
//!
//! Book streams carry deltas only (`depthUpdate`, numbered by final update
//! id `u`); the snapshot comes from REST `depth`, whose `lastUpdateId` anchors
//! the sequence.

use meridian_core::{CandleStick, FeeSchedule, MarketListing, MarketSummary, OrderBook, OrderKind, Ticker};
use meridian_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::adapter::{Capabilities, ExchangeAdapter, FeedTopics, RestRequest, StreamEvent, listing};
use crate::parse::{
    array_at, array_changes, array_levels, as_array, decimal_at, decimal_index, decode_err,
    element, epoch_timestamp, field, id_string, normalize_side, str_at, u64_at,
};
use crate::transport::{RestCall, StreamTopic};

pub const TICKER_CHANNEL: &str = "ticker";
pub const DEPTH_CHANNEL: &str = "depth";

#[derive(Debug, Clone, Copy, Default)]
pub struct Binance;

impl Binance {
    fn summary(payload: &Value) -> ExchangeResult<MarketSummary> {
        Ok(MarketSummary {
            high: decimal_at(payload, "highPrice")?,
            low: decimal_at(payload, "lowPrice")?,
            volume: decimal_at(payload, "volume")?,
            ask: decimal_at(payload, "askPrice")?,
            bid: decimal_at(payload, "bidPrice")?,
            last: decimal_at(payload, "lastPrice")?,
        })
    }
}

impl ExchangeAdapter for Binance {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn fees(&self) -> FeeSchedule {
        FeeSchedule::new(dec!(0.001), dec!(0.001))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            market_orders: true,
            candles: true,
            list_markets: true,
            streaming: true,
            stream_snapshots: false,
            stream_summaries: true,
        }
    }

    fn rest_call(&self, request: &RestRequest<'_>) -> ExchangeResult<RestCall> {
        let call = match *request {
            RestRequest::OrderBook { symbol } => RestCall::get("/api/v3/depth")
                .param("symbol", symbol)
                .param("limit", 100),
            RestRequest::Summary { symbol } | RestRequest::Ticker { symbol } => {
                RestCall::get("/api/v3/ticker/24hr").param("symbol", symbol)
            }
            RestRequest::Candles { symbol } => RestCall::get("/api/v3/klines")
                .param("symbol", symbol)
                .param("interval", "1h"),
            RestRequest::Markets => RestCall::get("/api/v3/exchangeInfo"),
            RestRequest::Balance { .. } => RestCall::get("/api/v3/account").signed(),
            RestRequest::PlaceOrder {
                symbol,
                side,
                kind,
                amount,
                price,
            } => {
                let call = RestCall::post("/api/v3/order")
                    .param("symbol", symbol)
                    .param("side", side.as_str().to_uppercase())
                    .param("type", kind.as_str().to_uppercase())
                    .param("quantity", amount);
                match (kind, price) {
                    (OrderKind::Limit, Some(price)) => call
                        .param("price", price)
                        .param("timeInForce", "GTC")
                        .signed(),
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
            } => RestCall::post("/sapi/v1/capital/withdraw/apply")
                .param("coin", currency)
                .param("address", address)
                .param("amount", amount)
                .signed(),
        };
        Ok(call)
    }

    fn check_error(&self, payload: &Value) -> ExchangeResult<()> {
        match (payload.get("code"), payload.get("msg")) {
            (Some(code), Some(msg)) => Err(ExchangeError::Exchange(format!(
                "{} ({code})",
                msg.as_str().unwrap_or_default()
            ))),
            _ => Ok(()),
        }
    }

    fn parse_order_book(&self, payload: &Value) -> ExchangeResult<OrderBook> {
        Ok(OrderBook::new(
            normalize_side(array_levels(array_at(payload, "asks")?)?, false),
            normalize_side(array_levels(array_at(payload, "bids")?)?, true),
        ))
    }

    fn book_sequence(&self, payload: &Value) -> Option<u64> {
        u64_at(payload, "lastUpdateId").ok()
    }

    fn parse_summary(&self, payload: &Value, _symbol: &str) -> ExchangeResult<MarketSummary> {
        Self::summary(payload)
    }

    fn parse_ticker(&self, payload: &Value, _symbol: &str) -> ExchangeResult<Ticker> {
        Ok(Ticker {
            ask: decimal_at(payload, "askPrice")?,
            bid: decimal_at(payload, "bidPrice")?,
            last: decimal_at(payload, "lastPrice")?,
        })
    }

    fn parse_candles(&self, payload: &Value, _symbol: &str) -> ExchangeResult<Vec<CandleStick>> {
        as_array(payload)?
            .iter()
            .map(|kline| {
                Ok(CandleStick {
                    open_time: Some(epoch_timestamp(element(kline, 0)?, true)?),
                    open: decimal_index(kline, 1)?,
                    high: decimal_index(kline, 2)?,
                    low: decimal_index(kline, 3)?,
                    close: decimal_index(kline, 4)?,
                    volume: decimal_index(kline, 5)?,
                })
            })
            .collect()
    }

    fn parse_markets(&self, payload: &Value) -> ExchangeResult<Vec<MarketListing>> {
        array_at(payload, "symbols")?
            .iter()
            .filter(|market| market.get("status").and_then(Value::as_str) == Some("TRADING"))
            .map(|market| {
                Ok(listing(
                    str_at(market, "symbol")?,
                    str_at(market, "quoteAsset")?,
                    str_at(market, "baseAsset")?,
                ))
            })
            .collect()
    }

    fn parse_balance(&self, payload: &Value, currency: &str) -> ExchangeResult<Decimal> {
        let balance = array_at(payload, "balances")?
            .iter()
            .find(|balance| balance.get("asset").and_then(Value::as_str) == Some(currency))
            .ok_or_else(|| ExchangeError::CurrencyNotFound(currency.to_string()))?;
        decimal_at(balance, "free")
    }

    fn parse_order_id(&self, payload: &Value) -> ExchangeResult<String> {
        id_string(field(payload, "orderId")?)
    }

    fn feed_topics(&self, symbol: &str) -> FeedTopics {
        let stream = symbol.to_lowercase();
        FeedTopics {
            ticker: Some(StreamTopic::new(TICKER_CHANNEL, stream.clone())),
            book: Some(StreamTopic::new(DEPTH_CHANNEL, stream)),
        }
    }

    fn parse_stream(
        &self,
        _topic: &StreamTopic,
        payload: &Value,
    ) -> ExchangeResult<Option<StreamEvent>> {
        // combined streams wrap the event in {"stream": .., "data": ..}
        let event = payload.get("data").unwrap_or(payload);
        let Some(kind) = event.get("e").and_then(Value::as_str) else {
            return Ok(None);
        };

        match kind {
            "24hrTicker" => Ok(Some(StreamEvent::Summary(MarketSummary {
                high: decimal_at(event, "h")?,
                low: decimal_at(event, "l")?,
                volume: decimal_at(event, "v")?,
                ask: decimal_at(event, "a")?,
                bid: decimal_at(event, "b")?,
                last: decimal_at(event, "c")?,
            }))),
            "depthUpdate" => Ok(Some(StreamEvent::BookDelta {
                sequence: Some(u64_at(event, "u")?),
                asks: array_changes(array_at(event, "a")?)?,
                bids: array_changes(array_at(event, "b")?)?,
            })),
            other => Err(decode_err(format!("unexpected binance event `{other}`"))),
        }
    }
}
