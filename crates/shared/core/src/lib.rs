//! Meridian Core Domain
//!
//! Pure domain types for the Meridian trading runtime.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! - **Markets**: identity-keyed trading pairs with per-exchange symbols
//! - **Entities**: orders, order books, summaries, tickers, candles, fees
//! - **Book**: the streaming delta merger and its sequence guard

pub mod book;
pub mod entities;
pub mod market;
pub mod values;

// Re-export commonly used types at crate root
pub use book::{
    BookDelta, BookSequencer, BookSide, LevelDelta, SequenceCheck, apply_delta, merge_side,
};
pub use entities::{
    CandleStick, FeeSchedule, MarketSummary, Order, OrderBook, OrderKind, Side, Ticker, TradeType,
};
pub use market::{Market, MarketId, MarketListing, MarketRef, MarketRegistry};
pub use values::{Price, Quantity, Timestamp};
