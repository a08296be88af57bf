use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::values::{Price, Quantity, Timestamp};

/// A single book entry or placed order
///
/// Immutable once built; order books own vectors of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Price of one unit of the quote currency, in base currency
    pub price: Price,
    pub quantity: Quantity,
    /// Order number as seen in the exchange archives
    pub order_number: Option<String>,
    /// Timestamp as reported by the exchange
    pub timestamp: Option<Timestamp>,
}

impl Order {
    /// Create a plain price level
    pub fn new(price: Price, quantity: Quantity) -> Self {
        Self {
            price,
            quantity,
            order_number: None,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_order_number(mut self, order_number: impl Into<String>) -> Self {
        self.order_number = Some(order_number.into());
        self
    }

    /// Total value of the order (quantity * price)
    pub fn total(&self) -> Decimal {
        self.quantity * self.price
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.quantity, self.price)
    }
}

/// Asks ascending by price, bids descending by price
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pub asks: Vec<Order>,
    pub bids: Vec<Order>,
}

impl OrderBook {
    pub fn new(asks: Vec<Order>, bids: Vec<Order>) -> Self {
        Self { asks, bids }
    }

    /// Lowest ask
    pub fn best_ask(&self) -> Option<&Order> {
        self.asks.first()
    }

    /// Highest bid
    pub fn best_bid(&self) -> Option<&Order> {
        self.bids.first()
    }

    /// Get spread (ask - bid)
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }

    /// Both sides strictly monotonic, no zero-quantity levels
    pub fn is_consistent(&self) -> bool {
        let asks_sorted = self.asks.windows(2).all(|w| w[0].price < w[1].price);
        let bids_sorted = self.bids.windows(2).all(|w| w[0].price > w[1].price);
        let no_zero = self
            .asks
            .iter()
            .chain(self.bids.iter())
            .all(|o| !o.quantity.is_zero());
        asks_sorted && bids_sorted && no_zero
    }
}

impl fmt::Display for OrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ASKS")?;
        for ask in &self.asks {
            writeln!(f, "  {ask}")?;
        }
        writeln!(f, "BIDS")?;
        for bid in &self.bids {
            writeln!(f, "  {bid}")?;
        }
        Ok(())
    }
}
