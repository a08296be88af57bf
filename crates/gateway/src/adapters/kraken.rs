//! Kraken REST API
//!
//! Responses are `{"error": [...], "result": {PAIR: ...}}`; results are keyed
//! by Kraken's own pair name, which may differ from the requested alias.

use meridian_core::{
    CandleStick, FeeSchedule, MarketListing, MarketSummary, OrderBook, OrderKind, Ticker,
};
use meridian_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::adapter::{Capabilities, ExchangeAdapter, RestRequest, listing};
use crate::parse::{
    array_at, array_levels, as_array, decimal, decimal_index, decode_err, element,
    epoch_timestamp, field, normalize_side, str_at,
};
use crate::transport::RestCall;

#[derive(Debug, Clone, Copy, Default)]
pub struct Kraken;

/// The entry for `symbol`, or the only entry when Kraken renamed the pair
fn pair_entry<'a>(payload: &'a Value, symbol: &str) -> ExchangeResult<&'a Value> {
    let result = field(payload, "result")?
        .as_object()
        .ok_or_else(|| decode_err("kraken result is not an object"))?;
    if let Some(entry) = result.get(symbol) {
        return Ok(entry);
    }
    let mut pairs = result.iter().filter(|(key, _)| key.as_str() != "last");
    match (pairs.next(), pairs.next()) {
        (Some((_, entry)), None) => Ok(entry),
        _ => Err(decode_err(format!("no kraken result for {symbol}"))),
    }
}

impl ExchangeAdapter for Kraken {
    fn name(&self) -> &'static str {
        "kraken"
    }

    fn fees(&self) -> FeeSchedule {
        FeeSchedule::new(dec!(0.0016), dec!(0.0026))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            market_orders: true,
            candles: true,
            list_markets: true,
            streaming: false,
            stream_snapshots: false,
            stream_summaries: false,
        }
    }

    fn rest_call(&self, request: &RestRequest<'_>) -> ExchangeResult<RestCall> {
        let call = match *request {
            RestRequest::OrderBook { symbol } => {
                RestCall::get("/0/public/Depth").param("pair", symbol)
            }
            RestRequest::Summary { symbol } | RestRequest::Ticker { symbol } => {
                RestCall::get("/0/public/Ticker").param("pair", symbol)
            }
            RestRequest::Candles { symbol } => RestCall::get("/0/public/OHLC")
                .param("pair", symbol)
                .param("interval", 60),
            RestRequest::Markets => RestCall::get("/0/public/AssetPairs"),
            RestRequest::Balance { .. } => RestCall::post("/0/private/Balance").signed(),
            RestRequest::PlaceOrder {
                symbol,
                side,
                kind,
                amount,
                price,
            } => {
                let call = RestCall::post("/0/private/AddOrder")
                    .param("pair", symbol)
                    .param("type", side.as_str())
                    .param("ordertype", kind.as_str())
                    .param("volume", amount);
                match (kind, price) {
                    (OrderKind::Limit, Some(price)) => call.param("price", price).signed(),
                    (OrderKind::Limit, None) => {
                        return Err(ExchangeError::NotSupported("limit order without price"));
                    }
                    (OrderKind::Market, _) => call.signed(),
                }
            }
            // Kraken withdraws to pre-registered address keys
            RestRequest::Withdraw {
                address,
                currency,
                amount,
            } => RestCall::post("/0/private/Withdraw")
                .param("asset", currency)
                .param("key", address)
                .param("amount", amount)
                .signed(),
        };
        Ok(call)
    }

    fn check_error(&self, payload: &Value) -> ExchangeResult<()> {
        let errors: Vec<&str> = payload
            .get("error")
            .and_then(Value::as_array)
            .map(|errors| errors.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ExchangeError::Exchange(errors.join("; ")))
        }
    }

    fn parse_order_book(&self, payload: &Value) -> ExchangeResult<OrderBook> {
        let result = field(payload, "result")?
            .as_object()
            .ok_or_else(|| decode_err("kraken result is not an object"))?;
        let book = result
            .values()
            .next()
            .ok_or_else(|| decode_err("empty kraken depth result"))?;
        Ok(OrderBook::new(
            normalize_side(array_levels(array_at(book, "asks")?)?, false),
            normalize_side(array_levels(array_at(book, "bids")?)?, true),
        ))
    }

    fn parse_summary(&self, payload: &Value, symbol: &str) -> ExchangeResult<MarketSummary> {
        let ticker = pair_entry(payload, symbol)?;
        // [today, last 24 hours]
        Ok(MarketSummary {
            high: decimal_index(field(ticker, "h")?, 1)?,
            low: decimal_index(field(ticker, "l")?, 1)?,
            volume: decimal_index(field(ticker, "v")?, 1)?,
            ask: decimal_index(field(ticker, "a")?, 0)?,
            bid: decimal_index(field(ticker, "b")?, 0)?,
            last: decimal_index(field(ticker, "c")?, 0)?,
        })
    }

    fn parse_ticker(&self, payload: &Value, symbol: &str) -> ExchangeResult<Ticker> {
        let ticker = pair_entry(payload, symbol)?;
        Ok(Ticker {
            ask: decimal_index(field(ticker, "a")?, 0)?,
            bid: decimal_index(field(ticker, "b")?, 0)?,
            last: decimal_index(field(ticker, "c")?, 0)?,
        })
    }

    fn parse_candles(&self, payload: &Value, symbol: &str) -> ExchangeResult<Vec<CandleStick>> {
        // [time, open, high, low, close, vwap, volume, count]
        as_array(pair_entry(payload, symbol)?)?
            .iter()
            .map(|row| {
                Ok(CandleStick {
                    open_time: Some(epoch_timestamp(element(row, 0)?, false)?),
                    open: decimal_index(row, 1)?,
                    high: decimal_index(row, 2)?,
                    low: decimal_index(row, 3)?,
                    close: decimal_index(row, 4)?,
                    volume: decimal_index(row, 6)?,
                })
            })
            .collect()
    }

    fn parse_markets(&self, payload: &Value) -> ExchangeResult<Vec<MarketListing>> {
        field(payload, "result")?
            .as_object()
            .ok_or_else(|| decode_err("kraken result is not an object"))?
            .iter()
            .map(|(pair, info)| {
                Ok(listing(pair, str_at(info, "quote")?, str_at(info, "base")?))
            })
            .collect()
    }

    fn parse_balance(&self, payload: &Value, currency: &str) -> ExchangeResult<Decimal> {
        let balances = field(payload, "result")?;
        balances
            .get(currency)
            .map(decimal)
            .ok_or_else(|| ExchangeError::CurrencyNotFound(currency.to_string()))?
    }

    fn parse_order_id(&self, payload: &Value) -> ExchangeResult<String> {
        let txids = array_at(field(payload, "result")?, "txid")?;
        txids
            .first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| decode_err("kraken order without txid"))
    }
}
