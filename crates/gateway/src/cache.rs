//! Last-value caches keyed by market identity
//!
//! Values are published whole as `Arc<V>` and never mutated afterwards;
//! an update builds a new value and replaces the entry. Each shard of the
//! underlying map is a reader/writer lock, so a reader sees either the old
//! or the new value, never a mix.

use dashmap::DashMap;
use meridian_core::{CandleStick, Market, MarketId, MarketSummary, OrderBook};
use std::sync::Arc;

pub type SummaryCache = ConcurrentCache<MarketSummary>;
pub type CandlesCache = ConcurrentCache<Vec<CandleStick>>;
pub type OrderbookCache = ConcurrentCache<OrderBook>;

/// Thread-safe most-recent value per market
#[derive(Debug)]
pub struct ConcurrentCache<V> {
    entries: DashMap<MarketId, Arc<V>>,
}

impl<V> Default for ConcurrentCache<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> ConcurrentCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value for `market`, returning the previous one
    pub fn set(&self, market: &Market, value: V) -> Option<Arc<V>> {
        self.set_shared(market, Arc::new(value))
    }

    pub fn set_shared(&self, market: &Market, value: Arc<V>) -> Option<Arc<V>> {
        self.entries.insert(market.id(), value)
    }

    /// Latest value for `market`; the returned handle stays valid after
    /// later writes replace the entry
    pub fn get(&self, market: &Market) -> Option<Arc<V>> {
        self.entries
            .get(&market.id())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Drop the value for `market`; readers holding it keep their handle
    pub fn remove(&self, market: &Market) -> Option<Arc<V>> {
        self.entries.remove(&market.id()).map(|(_, value)| value)
    }

    pub fn contains(&self, market: &Market) -> bool {
        self.entries.contains_key(&market.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{MarketRegistry, Order};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    #[test]
    fn test_set_returns_previous() {
        let mut registry = MarketRegistry::new();
        let market = registry.register("BTC-ETH", "BTC", "ETH", [("binance", "ETHBTC")]);
        let cache = SummaryCache::new();

        assert!(cache.get(&market).is_none());

        let first = MarketSummary {
            last: dec!(1),
            ..Default::default()
        };
        assert!(cache.set(&market, first).is_none());

        let second = MarketSummary {
            last: dec!(2),
            ..Default::default()
        };
        let previous = cache.set(&market, second);

        assert_eq!(previous.map(|s| s.last), Some(dec!(1)));
        assert_eq!(cache.get(&market).map(|s| s.last), Some(dec!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_by_identity() {
        let mut registry = MarketRegistry::new();
        let a = registry.register("BTC-ETH", "BTC", "ETH", [("binance", "ETHBTC")]);
        let b = registry.register("BTC-ETH", "BTC", "ETH", [("binance", "ETHBTC")]);
        let cache = OrderbookCache::new();

        cache.set(&a, OrderBook::new(vec![Order::new(dec!(1), dec!(1))], vec![]));

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
    }

    #[test]
    fn test_reader_handle_survives_replace() {
        let mut registry = MarketRegistry::new();
        let market = registry.register("BTC-ETH", "BTC", "ETH", [("binance", "ETHBTC")]);
        let cache = CandlesCache::new();

        cache.set(&market, vec![CandleStick::default()]);
        let held = cache.get(&market);
        cache.set(&market, Vec::new());

        assert_eq!(held.map(|c| c.len()), Some(1));
        assert_eq!(cache.get(&market).map(|c| c.len()), Some(0));
    }

    #[test]
    fn test_remove_clears_entry() {
        let mut registry = MarketRegistry::new();
        let market = registry.register("BTC-ETH", "BTC", "ETH", [("binance", "ETHBTC")]);
        let cache = OrderbookCache::new();

        cache.set(&market, OrderBook::new(vec![Order::new(dec!(1), dec!(1))], vec![]));
        let held = cache.get(&market);

        assert!(cache.remove(&market).is_some());
        assert!(cache.get(&market).is_none());
        assert!(cache.remove(&market).is_none());
        assert_eq!(held.map(|book| book.asks.len()), Some(1));
    }

    /// Writers publish books whose every level carries the writer's tag;
    /// a torn read would mix tags or show a book never written.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_never_see_torn_values() {
        let mut registry = MarketRegistry::new();
        let market = registry.register("BTC-ETH", "BTC", "ETH", [("binance", "ETHBTC")]);
        let cache = Arc::new(OrderbookCache::new());

        let tagged_book = |tag: i64| {
            let tag = Decimal::from(tag);
            let levels: Vec<Order> = (1..=20)
                .map(|i| Order::new(Decimal::from(i), tag))
                .collect();
            OrderBook::new(levels.clone(), levels.into_iter().rev().collect())
        };

        let writers: Vec<_> = (1..=4i64)
            .map(|writer| {
                let cache = Arc::clone(&cache);
                let market = Arc::clone(&market);
                tokio::spawn(async move {
                    for round in 0..200 {
                        let tag = writer * 1000 + round;
                        cache.set(&market, tagged_book(tag));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let written: HashSet<Decimal> = (1..=4i64)
            .flat_map(|writer| (0..200).map(move |round| Decimal::from(writer * 1000 + round)))
            .collect();
        let written = Arc::new(written);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let market = Arc::clone(&market);
                let written = Arc::clone(&written);
                tokio::spawn(async move {
                    for _ in 0..500 {
                        if let Some(book) = cache.get(&market) {
                            let tag = book.asks[0].quantity;
                            assert!(written.contains(&tag));
                            assert!(
                                book.asks
                                    .iter()
                                    .chain(book.bids.iter())
                                    .all(|level| level.quantity == tag)
                            );
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.await.unwrap();
        }
    }
}
