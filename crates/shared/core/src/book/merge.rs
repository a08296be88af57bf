use std::cmp::Ordering;

use crate::entities::{Order, OrderBook};
use crate::values::{Price, Quantity};

/// Which side of the book a sorted level list represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookSide {
    /// Ascending by price
    Asks,
    /// Descending by price
    Bids,
}

impl BookSide {
    /// Ordering of an existing level relative to a target price,
    /// in this side's sort direction
    fn compare(&self, level: Price, target: Price) -> Ordering {
        match self {
            BookSide::Asks => level.cmp(&target),
            BookSide::Bids => target.cmp(&level),
        }
    }
}

/// New absolute state of one price level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelDelta {
    pub price: Price,
    /// Number of orders at the level; zero clears it
    pub count: u64,
    /// New absolute size at the level (not an increment)
    pub amount: Quantity,
}

impl LevelDelta {
    pub fn new(price: Price, count: u64, amount: Quantity) -> Self {
        Self {
            price,
            count,
            amount,
        }
    }

    /// Level set to `amount`; a zero amount clears it
    pub fn upsert(price: Price, amount: Quantity) -> Self {
        let count = if amount.is_zero() { 0 } else { 1 };
        Self::new(price, count, amount)
    }

    /// Level removed
    pub fn removal(price: Price) -> Self {
        Self::new(price, 0, Quantity::ZERO)
    }

    pub fn clears_level(&self) -> bool {
        self.count == 0 || self.amount.is_zero()
    }
}

/// One sequenced batch of level changes for a market
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDelta {
    pub sequence: u64,
    pub asks: Vec<LevelDelta>,
    pub bids: Vec<LevelDelta>,
}

/// Merge a batch of deltas into one sorted side of a book
///
/// `levels` must already be sorted in `side`'s direction without duplicate
/// prices. The input is left untouched; the merged side is returned so the
/// caller can publish it as a whole.
pub fn merge_side(levels: &[Order], deltas: &[LevelDelta], side: BookSide) -> Vec<Order> {
    let mut merged = Vec::with_capacity(levels.len() + deltas.len());
    merged.extend_from_slice(levels);

    for delta in deltas {
        let position = merged.binary_search_by(|level| side.compare(level.price, delta.price));
        match (delta.clears_level(), position) {
            (true, Ok(index)) => {
                merged.remove(index);
            }
            (true, Err(_)) => {}
            (false, Ok(index)) => merged[index] = Order::new(delta.price, delta.amount),
            (false, Err(index)) => merged.insert(index, Order::new(delta.price, delta.amount)),
        }
    }

    merged
}

/// Build the book that results from applying `delta` to `book`
pub fn apply_delta(book: &OrderBook, delta: &BookDelta) -> OrderBook {
    OrderBook {
        asks: merge_side(&book.asks, &delta.asks, BookSide::Asks),
        bids: merge_side(&book.bids, &delta.bids, BookSide::Bids),
    }
}
