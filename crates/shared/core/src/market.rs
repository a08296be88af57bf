//! Market identity
//!
//! Markets are created once at startup through a [`MarketRegistry`] and shared
//! as [`MarketRef`] between the data layer and strategies. Caches key by
//! [`MarketId`], so two markets with identical names are still distinct keys.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MARKET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a registered market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketId(u64);

impl MarketId {
    fn next() -> Self {
        MarketId(NEXT_MARKET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared handle to a registered market
pub type MarketRef = Arc<Market>;

/// A tradable currency pair
///
/// `base_currency` is the currency paid when buying (BTC in `BTC-ETH`),
/// `quote_currency` is the currency bought with it (ETH in `BTC-ETH`).
#[derive(Debug)]
pub struct Market {
    id: MarketId,
    name: String,
    base_currency: String,
    quote_currency: String,
    /// exchange name -> exchange-specific ticker symbol
    exchange_symbols: HashMap<String, String>,
}

impl Market {
    pub fn id(&self) -> MarketId {
        self.id
    }

    /// Canonical name (e.g. `BTC-ETH`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn quote_currency(&self) -> &str {
        &self.quote_currency
    }

    /// Symbol of this market as seen by the given exchange
    pub fn symbol_for(&self, exchange: &str) -> Option<&str> {
        self.exchange_symbols.get(exchange).map(String::as_str)
    }

    /// Exchanges this market has a symbol binding for
    pub fn exchanges(&self) -> impl Iterator<Item = &str> {
        self.exchange_symbols.keys().map(String::as_str)
    }

    /// Split a canonical `BASE-QUOTE` name into its currencies
    pub fn parse_name(name: &str) -> Option<(String, String)> {
        let (base, quote) = name.split_once('-')?;
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        Some((base.to_string(), quote.to_string()))
    }
}

impl PartialEq for Market {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Market {}

impl Hash for Market {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Market {}", self.name)
    }
}

/// Authoritative owner of every market known to the process
#[derive(Debug, Default)]
pub struct MarketRegistry {
    markets: Vec<MarketRef>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a market and return its shared handle
    pub fn register<I, E, S>(
        &mut self,
        name: impl Into<String>,
        base_currency: impl Into<String>,
        quote_currency: impl Into<String>,
        exchange_symbols: I,
    ) -> MarketRef
    where
        I: IntoIterator<Item = (E, S)>,
        E: Into<String>,
        S: Into<String>,
    {
        let market = Arc::new(Market {
            id: MarketId::next(),
            name: name.into(),
            base_currency: base_currency.into(),
            quote_currency: quote_currency.into(),
            exchange_symbols: exchange_symbols
                .into_iter()
                .map(|(exchange, symbol)| (exchange.into(), symbol.into()))
                .collect(),
        });
        self.markets.push(Arc::clone(&market));
        market
    }

    /// First registered market with the given canonical name
    pub fn get(&self, name: &str) -> Option<MarketRef> {
        self.markets.iter().find(|m| m.name == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarketRef> {
        self.markets.iter()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

/// A market as listed by an exchange (not registered, not cache-keyed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketListing {
    pub name: String,
    pub base_currency: String,
    pub quote_currency: String,
}
