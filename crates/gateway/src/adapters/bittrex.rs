//! Bittrex v1.1 API
//!
//! Every response is an envelope `{"success", "message", "result"}` with
//! numbers sent as JSON numbers. No streaming, no market orders.

use meridian_core::{
    CandleStick, FeeSchedule, MarketListing, MarketSummary, OrderBook, OrderKind, Side, Ticker,
};
use meridian_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::adapter::{Capabilities, ExchangeAdapter, RestRequest, listing};
use crate::parse::{
    array_at, as_array, decimal_at, field, normalize_side, object_levels, rfc3339_timestamp,
    str_at,
};
use crate::transport::RestCall;

#[derive(Debug, Clone, Copy, Default)]
pub struct Bittrex;

fn result(payload: &Value) -> ExchangeResult<&Value> {
    field(payload, "result")
}

impl ExchangeAdapter for Bittrex {
    fn name(&self) -> &'static str {
        "bittrex"
    }

    fn fees(&self) -> FeeSchedule {
        FeeSchedule::new(dec!(0.0025), dec!(0.0025))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            market_orders: false,
            candles: true,
            list_markets: true,
            streaming: false,
            stream_snapshots: false,
            stream_summaries: false,
        }
    }

    fn rest_call(&self, request: &RestRequest<'_>) -> ExchangeResult<RestCall> {
        let call = match *request {
            RestRequest::OrderBook { symbol } => RestCall::get("/api/v1.1/public/getorderbook")
                .param("market", symbol)
                .param("type", "both"),
            RestRequest::Summary { symbol } => {
                RestCall::get("/api/v1.1/public/getmarketsummary").param("market", symbol)
            }
            RestRequest::Ticker { symbol } => {
                RestCall::get("/api/v1.1/public/getticker").param("market", symbol)
            }
            RestRequest::Candles { symbol } => RestCall::get("/api/v2.0/pub/market/GetTicks")
                .param("marketName", symbol)
                .param("tickInterval", "hour"),
            RestRequest::Markets => RestCall::get("/api/v1.1/public/getmarkets"),
            RestRequest::Balance { currency } => {
                RestCall::get("/api/v1.1/account/getbalance")
                    .param("currency", currency)
                    .signed()
            }
            RestRequest::PlaceOrder {
                kind: OrderKind::Market,
                ..
            } => return Err(ExchangeError::NotSupported("market orders")),
            RestRequest::PlaceOrder {
                symbol,
                side,
                amount,
                price,
                ..
            } => {
                let path = match side {
                    Side::Buy => "/api/v1.1/market/buylimit",
                    Side::Sell => "/api/v1.1/market/selllimit",
                };
                let rate =
                    price.ok_or(ExchangeError::NotSupported("limit order without price"))?;
                RestCall::get(path)
                    .param("market", symbol)
                    .param("quantity", amount)
                    .param("rate", rate)
                    .signed()
            }
            RestRequest::Withdraw {
                address,
                currency,
                amount,
            } => RestCall::get("/api/v1.1/account/withdraw")
                .param("currency", currency)
                .param("quantity", amount)
                .param("address", address)
                .signed(),
        };
        Ok(call)
    }

    fn check_error(&self, payload: &Value) -> ExchangeResult<()> {
        match payload.get("success").and_then(Value::as_bool) {
            Some(true) => Ok(()),
            _ => Err(ExchangeError::Exchange(
                payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("request failed")
                    .to_string(),
            )),
        }
    }

    fn parse_order_book(&self, payload: &Value) -> ExchangeResult<OrderBook> {
        let book = result(payload)?;
        Ok(OrderBook::new(
            normalize_side(object_levels(array_at(book, "sell")?, "Rate", "Quantity")?, false),
            normalize_side(object_levels(array_at(book, "buy")?, "Rate", "Quantity")?, true),
        ))
    }

    fn parse_summary(&self, payload: &Value, symbol: &str) -> ExchangeResult<MarketSummary> {
        let summary = as_array(result(payload)?)?
            .iter()
            .find(|s| s.get("MarketName").and_then(Value::as_str) == Some(symbol))
            .ok_or_else(|| ExchangeError::Exchange(format!("no summary for {symbol}")))?;
        Ok(MarketSummary {
            high: decimal_at(summary, "High")?,
            low: decimal_at(summary, "Low")?,
            volume: decimal_at(summary, "Volume")?,
            ask: decimal_at(summary, "Ask")?,
            bid: decimal_at(summary, "Bid")?,
            last: decimal_at(summary, "Last")?,
        })
    }

    fn parse_ticker(&self, payload: &Value, _symbol: &str) -> ExchangeResult<Ticker> {
        let ticker = result(payload)?;
        Ok(Ticker {
            ask: decimal_at(ticker, "Ask")?,
            bid: decimal_at(ticker, "Bid")?,
            last: decimal_at(ticker, "Last")?,
        })
    }

    fn parse_candles(&self, payload: &Value, _symbol: &str) -> ExchangeResult<Vec<CandleStick>> {
        as_array(result(payload)?)?
            .iter()
            .map(|tick| {
                Ok(CandleStick {
                    open: decimal_at(tick, "O")?,
                    high: decimal_at(tick, "H")?,
                    low: decimal_at(tick, "L")?,
                    close: decimal_at(tick, "C")?,
                    volume: decimal_at(tick, "V")?,
                    // Bittrex omits the zone designator
                    open_time: tick
                        .get("T")
                        .and_then(Value::as_str)
                        .and_then(|t| rfc3339_timestamp(&Value::String(format!("{t}Z"))).ok()),
                })
            })
            .collect()
    }

    fn parse_markets(&self, payload: &Value) -> ExchangeResult<Vec<MarketListing>> {
        as_array(result(payload)?)?
            .iter()
            .map(|market| {
                Ok(listing(
                    str_at(market, "MarketName")?,
                    str_at(market, "BaseCurrency")?,
                    str_at(market, "MarketCurrency")?,
                ))
            })
            .collect()
    }

    fn parse_balance(&self, payload: &Value, currency: &str) -> ExchangeResult<Decimal> {
        let balance = result(payload)?;
        if balance.is_null() {
            return Err(ExchangeError::CurrencyNotFound(currency.to_string()));
        }
        decimal_at(balance, "Available")
    }

    fn parse_order_id(&self, payload: &Value) -> ExchangeResult<String> {
        Ok(str_at(result(payload)?, "uuid")?.to_string())
    }
}
