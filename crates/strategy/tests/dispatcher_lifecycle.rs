//! Integration test: dispatcher driving strategies against exchange gateways
//!
//! StrategyDispatcher -> IntervalStrategy / WebsocketStrategy ->
//! ExchangeGateway -> ChannelTransport.

use async_trait::async_trait;
use meridian_core::{MarketRef, MarketRegistry};
use meridian_gateway::{Binance, ChannelTransport, ExchangeGateway, GatewayConfig, HitBtc};
use meridian_ports::{ExchangeWrapper, FeedStatus};
use meridian_strategy::{
    IntervalStrategy, Strategy, StrategyContext, StrategyDispatcher, StrategyError,
    StrategyModel, StrategyResult, WebsocketStrategy, Wrappers,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn market() -> MarketRef {
    MarketRegistry::new().register(
        "BTC-ETH",
        "BTC",
        "ETH",
        [("binance", "ETHBTC"), ("hitbtc", "ETHBTC")],
    )
}

fn binance() -> (Arc<dyn ExchangeWrapper>, Arc<ChannelTransport>) {
    let transport = Arc::new(ChannelTransport::default());
    transport.reply(
        "/api/v3/depth",
        json!({
            "lastUpdateId": 1,
            "bids": [["0.0300", "2"]],
            "asks": [["0.0301", "1"]]
        }),
    );
    let gateway = ExchangeGateway::new(Binance, transport.clone(), GatewayConfig::default());
    (Arc::new(gateway), transport)
}

/// Records the best bid seen on every update
#[derive(Default)]
struct BidRecorder {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl StrategyModel for BidRecorder {
    async fn on_update(&self, ctx: &StrategyContext) -> StrategyResult<()> {
        for wrapper in ctx.trading_wrappers() {
            for market in ctx.markets.iter() {
                let book = wrapper.get_order_book(market).await?;
                if let Some(bid) = book.best_bid() {
                    self.seen.lock().push(bid.price.to_string());
                }
            }
        }
        Ok(())
    }
}

/// Streams in setup, unsubscribes in tear down
#[derive(Default)]
struct FeedBracket {
    connected: AtomicU32,
}

#[async_trait]
impl StrategyModel for FeedBracket {
    async fn setup(&self, ctx: &StrategyContext) -> StrategyResult<()> {
        for wrapper in ctx.wrappers.iter() {
            wrapper.feed_connect(&ctx.markets).await?;
            self.connected.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn on_update(&self, _ctx: &StrategyContext) -> StrategyResult<()> {
        Ok(())
    }

    async fn tear_down(&self, ctx: &StrategyContext) -> StrategyResult<()> {
        for wrapper in ctx.wrappers.iter() {
            wrapper.feed_disconnect(&ctx.markets).await?;
        }
        Ok(())
    }
}

struct Panicking;

#[async_trait]
impl Strategy for Panicking {
    fn name(&self) -> &str {
        "Panicking"
    }

    async fn apply(&self, _ctx: StrategyContext) -> StrategyResult<()> {
        panic!("strategy bug");
    }
}

#[tokio::test(start_paused = true)]
async fn test_interval_strategy_polls_until_shutdown() {
    let _ = env_logger::try_init();
    let (wrapper, transport) = binance();
    let recorder = Arc::new(IntervalStrategy::new(
        "Recorder",
        Duration::from_secs(1),
        BidRecorder::default(),
    ));

    let mut dispatcher = StrategyDispatcher::new();
    dispatcher.add_custom_strategy(recorder.clone());
    dispatcher.match_with_markets("Recorder", vec![market()]).unwrap();
    let dispatcher = Arc::new(dispatcher);

    let wrappers: Wrappers = Arc::from(vec![wrapper]);
    let run = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.apply_all_strategies(wrappers).await }
    });

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!run.is_finished());
    dispatcher.shutdown();
    let summary = run.await.unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(transport.calls("/api/v3/depth"), 3);
    assert_eq!(*recorder.model().seen.lock(), vec!["0.0300"; 3]);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_strategy_does_not_stop_others() {
    let _ = env_logger::try_init();
    let (wrapper, _) = binance();

    let mut dispatcher = StrategyDispatcher::new();
    dispatcher.add_custom_strategy(Arc::new(Panicking));
    dispatcher.add_custom_strategy(Arc::new(IntervalStrategy::new(
        "Recorder",
        Duration::from_secs(1),
        BidRecorder::default(),
    )));
    dispatcher.match_with_markets("Panicking", vec![market()]).unwrap();
    dispatcher.match_with_markets("Recorder", vec![market()]).unwrap();
    let dispatcher = Arc::new(dispatcher);

    let run = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.apply_all_strategies(Arc::from(vec![wrapper])).await }
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!run.is_finished());
    dispatcher.shutdown();
    let summary = run.await.unwrap();

    assert_eq!(summary.panicked, 1);
    assert_eq!(summary.completed, 1);
}

#[tokio::test]
async fn test_websocket_strategy_brackets_feed() {
    let _ = env_logger::try_init();
    let transport = Arc::new(ChannelTransport::default());
    let hitbtc: Arc<dyn ExchangeWrapper> = Arc::new(ExchangeGateway::new(
        HitBtc,
        transport.clone(),
        GatewayConfig::default(),
    ));
    let market = market();
    let streamer = Arc::new(WebsocketStrategy::new("Streamer", FeedBracket::default()));

    let mut dispatcher = StrategyDispatcher::new();
    dispatcher.add_custom_strategy(streamer.clone());
    dispatcher.match_with_markets("Streamer", vec![market.clone()]).unwrap();
    let dispatcher = Arc::new(dispatcher);

    let run = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let wrappers: Wrappers = Arc::from(vec![hitbtc.clone()]);
        async move { dispatcher.apply_all_strategies(wrappers).await }
    });

    for _ in 0..400 {
        if streamer.model().connected.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_ne!(hitbtc.feed_status(&market), FeedStatus::NotSubscribed);

    dispatcher.shutdown();
    let summary = run.await.unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(hitbtc.feed_status(&market), FeedStatus::Stopped);
}

#[tokio::test]
async fn test_setup_error_counts_as_failure() {
    let _ = env_logger::try_init();
    let transport = Arc::new(ChannelTransport::default());
    // no streaming on kraken, so setup fails
    let kraken: Arc<dyn ExchangeWrapper> = Arc::new(ExchangeGateway::new(
        meridian_gateway::Kraken,
        transport,
        GatewayConfig::default(),
    ));

    let mut dispatcher = StrategyDispatcher::new();
    dispatcher.add_custom_strategy(Arc::new(WebsocketStrategy::new(
        "Streamer",
        FeedBracket::default(),
    )));
    dispatcher.match_with_markets("Streamer", vec![market()]).unwrap();

    let summary = dispatcher.apply_all_strategies(Arc::from(vec![kraken])).await;

    assert_eq!(summary.failed, 1);
    assert!(matches!(
        dispatcher.match_with_markets("Nope", Vec::new()),
        Err(StrategyError::UnknownStrategy(_))
    ));
}
