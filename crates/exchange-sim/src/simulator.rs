//! Simulated order execution over a real exchange wrapper
//!
//! Reads pass straight through to the wrapped exchange. Market orders walk
//! the live order book and settle against the ledger; nothing is sent to the
//! exchange. Limit orders cannot be simulated without order tracking and
//! fail with `NotMockable`.

use async_trait::async_trait;
use log::{info, warn};
use meridian_core::{
    CandleStick, Market, MarketListing, MarketRef, MarketSummary, Order, OrderBook, Price,
    Quantity, Side, Ticker, TradeType,
};
use meridian_ports::{ExchangeError, ExchangeResult, ExchangeWrapper, FeedStatus};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::ledger::BalanceLedger;

/// Outcome of walking one side of a book
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fill {
    /// Quantity taken from the book
    pub quantity: Quantity,
    /// Sum of `price * quantity` over the levels taken
    pub total: Decimal,
}

impl Fill {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn average_price(&self) -> Option<Price> {
        (!self.quantity.is_zero()).then(|| self.total / self.quantity)
    }
}

/// Take `amount` from `levels`, best level first
///
/// Stops early when the side runs out. With a `budget` of `(currency,
/// available)`, the running total is checked after every level and the walk
/// fails with `InsufficientFunds` as soon as it exceeds `available`.
pub fn walk_book(
    levels: &[Order],
    amount: Quantity,
    budget: Option<(&str, Decimal)>,
) -> ExchangeResult<Fill> {
    let mut fill = Fill::default();
    let mut remaining = amount;

    for level in levels {
        if remaining.is_zero() {
            break;
        }
        let taken = remaining.min(level.quantity);
        fill.quantity += taken;
        fill.total += taken * level.price;
        remaining -= taken;

        if let Some((currency, available)) = budget {
            if fill.total > available {
                return Err(ExchangeError::InsufficientFunds {
                    currency: currency.to_string(),
                    required: fill.total,
                    available,
                });
            }
        }
    }

    Ok(fill)
}

/// Paper-trading [`ExchangeWrapper`]
pub struct ExchangeWrapperSimulator {
    inner: Arc<dyn ExchangeWrapper>,
    ledger: Mutex<BalanceLedger>,
}

impl ExchangeWrapperSimulator {
    pub fn new(inner: Arc<dyn ExchangeWrapper>, balances: HashMap<String, Decimal>) -> Self {
        Self {
            inner,
            ledger: Mutex::new(BalanceLedger::new(balances)),
        }
    }

    /// The wrapped exchange
    pub fn inner(&self) -> &Arc<dyn ExchangeWrapper> {
        &self.inner
    }

    /// Copy of the current ledger
    pub fn balances(&self) -> HashMap<String, Decimal> {
        self.ledger.lock().balances().clone()
    }

    fn order_id(side: Side) -> String {
        match side {
            Side::Buy => format!("FAKE_BUY-{}", Uuid::new_v4()),
            Side::Sell => format!("FAKE_SELL-{}", Uuid::new_v4()),
        }
    }

    fn check_fill(
        &self,
        side: Side,
        market: &Market,
        amount: Quantity,
        fill: &Fill,
    ) -> ExchangeResult<()> {
        if fill.is_empty() {
            return Err(ExchangeError::Exchange(format!(
                "no liquidity to {} {amount} on {}",
                side.as_str(),
                market.name()
            )));
        }
        if fill.quantity < amount {
            warn!(
                "{self}: {} {amount} on {} only filled {} (book exhausted)",
                side.as_str(),
                market.name(),
                fill.quantity
            );
        }
        Ok(())
    }

    fn log_fill(&self, side: Side, market: &Market, fill: &Fill, order_id: &str) {
        info!(
            "{self}: {} {} {} for {} {} (avg {}) as {order_id}",
            side.as_str(),
            fill.quantity,
            market.quote_currency(),
            fill.total,
            market.base_currency(),
            fill.average_price().unwrap_or_default()
        );
    }
}

impl fmt::Display for ExchangeWrapperSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (simulated)", self.inner.name())
    }
}

#[async_trait]
impl ExchangeWrapper for ExchangeWrapperSimulator {
    /// Same as the wrapped exchange, so market symbol bindings still resolve
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_candles(&self, market: &Market) -> ExchangeResult<Arc<Vec<CandleStick>>> {
        self.inner.get_candles(market).await
    }

    async fn get_market_summary(&self, market: &Market) -> ExchangeResult<MarketSummary> {
        self.inner.get_market_summary(market).await
    }

    async fn get_order_book(&self, market: &Market) -> ExchangeResult<Arc<OrderBook>> {
        self.inner.get_order_book(market).await
    }

    async fn get_ticker(&self, market: &Market) -> ExchangeResult<Ticker> {
        self.inner.get_ticker(market).await
    }

    async fn get_markets(&self) -> ExchangeResult<Vec<MarketListing>> {
        self.inner.get_markets().await
    }

    async fn buy_limit(
        &self,
        _market: &Market,
        _amount: Quantity,
        _limit: Price,
    ) -> ExchangeResult<String> {
        Err(ExchangeError::NotMockable("limit orders"))
    }

    async fn sell_limit(
        &self,
        _market: &Market,
        _amount: Quantity,
        _limit: Price,
    ) -> ExchangeResult<String> {
        Err(ExchangeError::NotMockable("limit orders"))
    }

    async fn buy_market(&self, market: &Market, amount: Quantity) -> ExchangeResult<String> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(amount));
        }
        let (base, quote) = (market.base_currency(), market.quote_currency());
        let book = self.inner.get_order_book(market).await?;

        let fill = {
            let mut ledger = self.ledger.lock();
            let fill = walk_book(&book.asks, amount, Some((base, ledger.available(base))))?;
            self.check_fill(Side::Buy, market, amount, &fill)?;
            ledger.debit(base, fill.total)?;
            ledger.credit(quote, fill.quantity);
            fill
        };

        let order_id = Self::order_id(Side::Buy);
        self.log_fill(Side::Buy, market, &fill, &order_id);
        Ok(order_id)
    }

    async fn sell_market(&self, market: &Market, amount: Quantity) -> ExchangeResult<String> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(amount));
        }
        let (base, quote) = (market.base_currency(), market.quote_currency());
        // the flat amount is known up front; fail before touching the exchange
        self.ledger.lock().ensure(quote, amount)?;
        let book = self.inner.get_order_book(market).await?;

        let fill = {
            let mut ledger = self.ledger.lock();
            ledger.ensure(quote, amount)?;
            let fill = walk_book(&book.bids, amount, None)?;
            self.check_fill(Side::Sell, market, amount, &fill)?;
            ledger.debit(quote, fill.quantity)?;
            ledger.credit(base, fill.total);
            fill
        };

        let order_id = Self::order_id(Side::Sell);
        self.log_fill(Side::Sell, market, &fill, &order_id);
        Ok(order_id)
    }

    fn calculate_trading_fees(
        &self,
        market: &Market,
        amount: Quantity,
        limit: Price,
        trade_type: TradeType,
    ) -> Decimal {
        self.inner
            .calculate_trading_fees(market, amount, limit, trade_type)
    }

    fn calculate_withdraw_fees(
        &self,
        market: &Market,
        amount: Quantity,
    ) -> ExchangeResult<Decimal> {
        self.inner.calculate_withdraw_fees(market, amount)
    }

    async fn get_balance(&self, currency: &str) -> ExchangeResult<Decimal> {
        Ok(self.ledger.lock().balance_or_zero(currency))
    }

    fn get_deposit_address(&self, currency: &str) -> Option<String> {
        self.inner.get_deposit_address(currency)
    }

    async fn feed_connect(&self, markets: &[MarketRef]) -> ExchangeResult<()> {
        self.inner.feed_connect(markets).await
    }

    async fn feed_disconnect(&self, markets: &[MarketRef]) -> ExchangeResult<()> {
        self.inner.feed_disconnect(markets).await
    }

    fn feed_status(&self, market: &Market) -> FeedStatus {
        self.inner.feed_status(market)
    }

    async fn withdraw(
        &self,
        destination: &str,
        currency: &str,
        amount: Decimal,
    ) -> ExchangeResult<()> {
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidAmount(amount));
        }
        self.ledger.lock().debit(currency, amount)?;
        info!("{self}: withdrew {amount} {currency} to {destination}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::MarketRegistry;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves one fixed book and counts how often it was asked for
    struct FixedBook {
        book: Arc<OrderBook>,
        reads: AtomicUsize,
    }

    impl FixedBook {
        fn new(book: OrderBook) -> Arc<Self> {
            Arc::new(Self {
                book: Arc::new(book),
                reads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ExchangeWrapper for FixedBook {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn get_candles(&self, _: &Market) -> ExchangeResult<Arc<Vec<CandleStick>>> {
            Err(ExchangeError::NotSupported("candles"))
        }
        async fn get_market_summary(&self, _: &Market) -> ExchangeResult<MarketSummary> {
            Ok(MarketSummary::default())
        }
        async fn get_order_book(&self, _: &Market) -> ExchangeResult<Arc<OrderBook>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&self.book))
        }
        async fn get_ticker(&self, _: &Market) -> ExchangeResult<Ticker> {
            Ok(Ticker::default())
        }
        async fn get_markets(&self) -> ExchangeResult<Vec<MarketListing>> {
            Ok(Vec::new())
        }
        async fn buy_limit(&self, _: &Market, _: Quantity, _: Price) -> ExchangeResult<String> {
            unreachable!("real orders must not reach the exchange")
        }
        async fn sell_limit(&self, _: &Market, _: Quantity, _: Price) -> ExchangeResult<String> {
            unreachable!("real orders must not reach the exchange")
        }
        async fn buy_market(&self, _: &Market, _: Quantity) -> ExchangeResult<String> {
            unreachable!("real orders must not reach the exchange")
        }
        async fn sell_market(&self, _: &Market, _: Quantity) -> ExchangeResult<String> {
            unreachable!("real orders must not reach the exchange")
        }
        fn calculate_trading_fees(&self, _: &Market, amount: Quantity, limit: Price, _: TradeType) -> Decimal {
            amount * limit * dec!(0.001)
        }
        fn calculate_withdraw_fees(&self, _: &Market, _: Quantity) -> ExchangeResult<Decimal> {
            Ok(dec!(0.0005))
        }
        async fn get_balance(&self, _: &str) -> ExchangeResult<Decimal> {
            unreachable!("balances are simulated")
        }
        fn get_deposit_address(&self, currency: &str) -> Option<String> {
            (currency == "BTC").then(|| "1FixedDeposit".to_string())
        }
        async fn feed_connect(&self, _: &[MarketRef]) -> ExchangeResult<()> {
            Err(ExchangeError::WebsocketNotSupported)
        }
        async fn feed_disconnect(&self, _: &[MarketRef]) -> ExchangeResult<()> {
            Ok(())
        }
        fn feed_status(&self, _: &Market) -> FeedStatus {
            FeedStatus::NotSubscribed
        }
        async fn withdraw(&self, _: &str, _: &str, _: Decimal) -> ExchangeResult<()> {
            unreachable!("withdrawals are simulated")
        }
    }

    fn book() -> OrderBook {
        OrderBook::new(
            vec![Order::new(dec!(1.0), dec!(2)), Order::new(dec!(1.1), dec!(3))],
            vec![Order::new(dec!(0.9), dec!(2)), Order::new(dec!(0.8), dec!(3))],
        )
    }

    fn market() -> MarketRef {
        MarketRegistry::new().register("BTC-ETH", "BTC", "ETH", [("fixed", "ETHBTC")])
    }

    fn simulator(btc: Decimal, eth: Decimal) -> (ExchangeWrapperSimulator, Arc<FixedBook>) {
        let inner = FixedBook::new(book());
        let simulator = ExchangeWrapperSimulator::new(
            inner.clone(),
            HashMap::from([("BTC".to_string(), btc), ("ETH".to_string(), eth)]),
        );
        (simulator, inner)
    }

    #[test]
    fn test_walk_book_decrements_remaining() {
        let fill = walk_book(&book().asks, dec!(4), None).unwrap();
        assert_eq!(fill.quantity, dec!(4));
        assert_eq!(fill.total, dec!(4.2));

        let exact = walk_book(&book().asks, dec!(2), None).unwrap();
        assert_eq!(exact, Fill { quantity: dec!(2), total: dec!(2.0) });

        let exhausted = walk_book(&book().asks, dec!(100), None).unwrap();
        assert_eq!(exhausted.quantity, dec!(5));
    }

    #[test]
    fn test_walk_book_budget() {
        let err = walk_book(&book().asks, dec!(4), Some(("BTC", dec!(3)))).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::InsufficientFunds {
                currency: "BTC".into(),
                required: dec!(4.2),
                available: dec!(3),
            }
        );
        assert!(walk_book(&book().asks, dec!(4), Some(("BTC", dec!(4.2)))).is_ok());
    }

    #[tokio::test]
    async fn test_buy_market_settles_ledger() {
        let (simulator, _) = simulator(dec!(10), dec!(0));

        let id = simulator.buy_market(&market(), dec!(4)).await.unwrap();

        assert!(id.starts_with("FAKE_BUY-"));
        let balances = simulator.balances();
        assert_eq!(balances["BTC"], dec!(5.8));
        assert_eq!(balances["ETH"], dec!(4));
    }

    #[tokio::test]
    async fn test_buy_market_insufficient_funds_leaves_ledger() {
        let (simulator, _) = simulator(dec!(3), dec!(1));
        let before = simulator.balances();

        let err = simulator.buy_market(&market(), dec!(4)).await.unwrap_err();

        assert!(matches!(err, ExchangeError::InsufficientFunds { ref currency, .. } if currency == "BTC"));
        assert_eq!(simulator.balances(), before);
    }

    #[tokio::test]
    async fn test_sell_market_prechecks_before_reading_book() {
        let (simulator, inner) = simulator(dec!(0), dec!(1));

        let err = simulator.sell_market(&market(), dec!(2)).await.unwrap_err();

        assert_eq!(
            err,
            ExchangeError::InsufficientFunds {
                currency: "ETH".into(),
                required: dec!(2),
                available: dec!(1),
            }
        );
        assert_eq!(inner.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sell_market_settles_ledger() {
        let (simulator, _) = simulator(dec!(0), dec!(4));

        let id = simulator.sell_market(&market(), dec!(3)).await.unwrap();

        assert!(id.starts_with("FAKE_SELL-"));
        let balances = simulator.balances();
        // 2 @ 0.9 + 1 @ 0.8
        assert_eq!(balances["BTC"], dec!(2.6));
        assert_eq!(balances["ETH"], dec!(1));
    }

    #[tokio::test]
    async fn test_partial_fill_takes_whole_book() {
        let (simulator, _) = simulator(dec!(100), dec!(0));

        simulator.buy_market(&market(), dec!(50)).await.unwrap();

        let balances = simulator.balances();
        assert_eq!(balances["ETH"], dec!(5));
        assert_eq!(balances["BTC"], dec!(94.7));
    }

    #[tokio::test]
    async fn test_invalid_amounts_and_limit_orders() {
        let (simulator, _) = simulator(dec!(10), dec!(10));

        assert_eq!(
            simulator.buy_market(&market(), dec!(0)).await,
            Err(ExchangeError::InvalidAmount(dec!(0)))
        );
        assert_eq!(
            simulator.sell_market(&market(), dec!(-1)).await,
            Err(ExchangeError::InvalidAmount(dec!(-1)))
        );
        assert_eq!(
            simulator.buy_limit(&market(), dec!(1), dec!(1)).await,
            Err(ExchangeError::NotMockable("limit orders"))
        );
        assert_eq!(
            simulator.sell_limit(&market(), dec!(1), dec!(1)).await,
            Err(ExchangeError::NotMockable("limit orders"))
        );
    }

    #[tokio::test]
    async fn test_withdraw_validation() {
        let (simulator, _) = simulator(dec!(2), dec!(0));

        assert_eq!(
            simulator.withdraw("1Dest", "BTC", dec!(-1)).await,
            Err(ExchangeError::InvalidAmount(dec!(-1)))
        );
        assert!(matches!(
            simulator.withdraw("1Dest", "BTC", dec!(5)).await,
            Err(ExchangeError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            simulator.withdraw("1Dest", "XRP", dec!(1)).await,
            Err(ExchangeError::InsufficientFunds { .. })
        ));
        assert_eq!(simulator.balances()["BTC"], dec!(2));

        simulator.withdraw("1Dest", "BTC", dec!(0.5)).await.unwrap();
        assert_eq!(simulator.balances()["BTC"], dec!(1.5));
    }

    #[tokio::test]
    async fn test_reads_pass_through() {
        let (simulator, inner) = simulator(dec!(1), dec!(1));

        assert_eq!(simulator.name(), "fixed");
        assert_eq!(simulator.to_string(), "fixed (simulated)");
        assert_eq!(*simulator.get_order_book(&market()).await.unwrap(), book());
        assert_eq!(inner.reads.load(Ordering::SeqCst), 1);
        assert_eq!(simulator.get_deposit_address("BTC").as_deref(), Some("1FixedDeposit"));
        assert_eq!(
            simulator.calculate_trading_fees(&market(), dec!(10), dec!(2), TradeType::Taker),
            dec!(0.02)
        );
        assert_eq!(
            simulator.feed_connect(&[market()]).await,
            Err(ExchangeError::WebsocketNotSupported)
        );
    }

    #[tokio::test]
    async fn test_get_balance_inserts_zero() {
        let (simulator, _) = simulator(dec!(1), dec!(1));

        assert_eq!(simulator.get_balance("XRP").await, Ok(Decimal::ZERO));
        assert_eq!(simulator.balances().get("XRP"), Some(&Decimal::ZERO));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_buys_never_overdraw() {
        let inner = FixedBook::new(OrderBook::new(
            vec![Order::new(dec!(1), dec!(1000))],
            vec![],
        ));
        let simulator = Arc::new(ExchangeWrapperSimulator::new(
            inner,
            HashMap::from([("BTC".to_string(), dec!(10))]),
        ));
        let market = market();

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let simulator = Arc::clone(&simulator);
                let market = market.clone();
                tokio::spawn(async move { simulator.buy_market(&market, dec!(1)).await })
            })
            .collect();

        let mut filled = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                filled += 1;
            }
        }

        let balances = simulator.balances();
        assert_eq!(filled, 10);
        assert_eq!(balances["BTC"], Decimal::ZERO);
        assert_eq!(balances["ETH"], dec!(10));
    }

    proptest! {
        #[test]
        fn prop_ledger_conserves_value(
            ops in prop::collection::vec((any::<bool>(), 1u32..60), 1..20),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (simulator, _) = simulator(dec!(8), dec!(6));
            let market = market();
            let book = book();

            let (mut btc, mut eth) = (dec!(8), dec!(6));
            for (buy, tenths) in ops {
                let amount = Decimal::new(i64::from(tenths), 1);
                let before = simulator.balances();
                let result = runtime.block_on(async {
                    if buy {
                        simulator.buy_market(&market, amount).await
                    } else {
                        simulator.sell_market(&market, amount).await
                    }
                });

                match result {
                    Ok(_) if buy => {
                        let fill = walk_book(&book.asks, amount, None).unwrap();
                        btc -= fill.total;
                        eth += fill.quantity;
                    }
                    Ok(_) => {
                        let fill = walk_book(&book.bids, amount, None).unwrap();
                        btc += fill.total;
                        eth -= fill.quantity;
                    }
                    Err(_) => prop_assert_eq!(simulator.balances(), before),
                }

                let balances = simulator.balances();
                prop_assert_eq!(balances["BTC"], btc);
                prop_assert_eq!(balances["ETH"], eth);
                prop_assert!(btc >= Decimal::ZERO && eth >= Decimal::ZERO);
            }
        }
    }
}
