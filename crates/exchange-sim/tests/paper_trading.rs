//! Integration test: simulator over a real exchange gateway
//!
//! ExchangeWrapperSimulator -> ExchangeGateway<Binance> -> ChannelTransport.
//! Market data is scripted on the transport; no order or withdrawal may reach
//! it.

use meridian_core::{MarketRef, MarketRegistry};
use meridian_exchange_sim::ExchangeWrapperSimulator;
use meridian_gateway::{Binance, ChannelTransport, ExchangeGateway, GatewayConfig};
use meridian_ports::{ExchangeError, ExchangeWrapper};
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn setup() -> (ExchangeWrapperSimulator, Arc<ChannelTransport>, MarketRef) {
    let transport = Arc::new(ChannelTransport::default());
    transport.reply(
        "/api/v3/depth",
        json!({
            "lastUpdateId": 7,
            "asks": [["0.0300", "2"], ["0.0310", "100"]],
            "bids": [["0.0290", "1"], ["0.0280", "10"]]
        }),
    );
    transport.reply(
        "/api/v3/ticker/24hr",
        json!({
            "highPrice": "0.032", "lowPrice": "0.028", "volume": "1000",
            "askPrice": "0.0300", "bidPrice": "0.0290", "lastPrice": "0.0295"
        }),
    );

    let gateway = Arc::new(ExchangeGateway::new(
        Binance,
        transport.clone(),
        GatewayConfig::default(),
    ));
    let simulator = ExchangeWrapperSimulator::new(
        gateway,
        HashMap::from([
            ("BTC".to_string(), dec!(1)),
            ("ETH".to_string(), dec!(0)),
        ]),
    );
    let market = MarketRegistry::new().register("BTC-ETH", "BTC", "ETH", [("binance", "ETHBTC")]);
    (simulator, transport, market)
}

#[tokio::test]
async fn test_round_trip_against_live_book() {
    let _ = env_logger::try_init();
    let (simulator, transport, market) = setup();

    let buy = simulator.buy_market(&market, dec!(5)).await.unwrap();
    assert!(buy.starts_with("FAKE_BUY-"));
    // 2 @ 0.0300 + 3 @ 0.0310
    assert_eq!(simulator.get_balance("BTC").await, Ok(dec!(0.847)));
    assert_eq!(simulator.get_balance("ETH").await, Ok(dec!(5)));

    let sell = simulator.sell_market(&market, dec!(4)).await.unwrap();
    assert!(sell.starts_with("FAKE_SELL-"));
    // 1 @ 0.0290 + 3 @ 0.0280
    assert_eq!(simulator.get_balance("BTC").await, Ok(dec!(0.96)));
    assert_eq!(simulator.get_balance("ETH").await, Ok(dec!(1)));

    assert_eq!(transport.calls("/api/v3/depth"), 2);
    assert_eq!(transport.calls("/api/v3/order"), 0);
    assert_eq!(transport.calls("/api/v3/account"), 0);
}

#[tokio::test]
async fn test_insufficient_funds_leaves_ledger_unchanged() {
    let _ = env_logger::try_init();
    let (simulator, _, market) = setup();
    let before = simulator.balances();

    // 2 @ 0.03 + 38 @ 0.031 costs more than 1 BTC
    let err = simulator.buy_market(&market, dec!(40)).await.unwrap_err();

    assert!(matches!(err, ExchangeError::InsufficientFunds { .. }));
    assert_eq!(simulator.balances(), before);
}

#[tokio::test]
async fn test_withdraw_never_reaches_exchange() {
    let (simulator, transport, _) = setup();

    assert_eq!(
        simulator.withdraw("bc1qdest", "BTC", dec!(-1)).await,
        Err(ExchangeError::InvalidAmount(dec!(-1)))
    );
    assert!(matches!(
        simulator.withdraw("bc1qdest", "BTC", dec!(5)).await,
        Err(ExchangeError::InsufficientFunds { .. })
    ));
    assert_eq!(simulator.balances()["BTC"], dec!(1));

    simulator.withdraw("bc1qdest", "BTC", dec!(0.25)).await.unwrap();
    assert_eq!(simulator.balances()["BTC"], dec!(0.75));
    assert_eq!(transport.calls("/sapi/v1/capital/withdraw/apply"), 0);
}

#[tokio::test]
async fn test_market_data_passes_through() {
    let (simulator, transport, market) = setup();

    let summary = simulator.get_market_summary(&market).await.unwrap();
    assert_eq!(summary.last, dec!(0.0295));
    assert_eq!(simulator.name(), "binance");
    assert_eq!(simulator.to_string(), "binance (simulated)");
    assert_eq!(transport.calls("/api/v3/ticker/24hr"), 1);

    assert_eq!(
        simulator.buy_limit(&market, dec!(1), dec!(0.03)).await,
        Err(ExchangeError::NotMockable("limit orders"))
    );
}
