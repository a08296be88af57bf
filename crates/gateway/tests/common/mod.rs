//! Shared fixtures for gateway integration tests

#![allow(dead_code)]

use meridian_core::{MarketRef, MarketRegistry};
use meridian_gateway::{ChannelTransport, ExchangeAdapter, ExchangeGateway, GatewayConfig};
use std::sync::Arc;
use std::time::Duration;

/// Fast reconnects so tests do not wait on real backoff
pub fn test_config() -> GatewayConfig {
    GatewayConfig::default()
        .with_request_timeout(Duration::from_millis(500))
        .with_reconnect_backoff(Duration::from_millis(1), Duration::from_millis(10))
}

pub fn gateway<A: ExchangeAdapter>(
    adapter: A,
) -> (Arc<ExchangeGateway<A>>, Arc<ChannelTransport>) {
    let transport = Arc::new(ChannelTransport::default());
    let gateway = ExchangeGateway::new(adapter, transport.clone(), test_config());
    (Arc::new(gateway), transport)
}

/// `BTC-ETH` bound to every supported exchange's notation
pub fn btc_eth() -> MarketRef {
    MarketRegistry::new().register(
        "BTC-ETH",
        "BTC",
        "ETH",
        [
            ("binance", "ETHBTC"),
            ("bitfinex", "ethbtc"),
            ("bittrex", "BTC-ETH"),
            ("hitbtc", "ETHBTC"),
            ("kraken", "XETHXXBT"),
            ("kucoin", "ETH-BTC"),
        ],
    )
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Async variant of [`wait_until`]
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
