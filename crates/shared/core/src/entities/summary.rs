use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::values::{Price, Timestamp};

/// Minimal ask/bid/last snapshot, cheaper to obtain than a summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub ask: Price,
    pub bid: Price,
    pub last: Price,
}

/// Market statistics over the exchange's native window (usually 24h)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub high: Price,
    pub low: Price,
    pub volume: Decimal,
    pub ask: Price,
    pub bid: Price,
    pub last: Price,
}

impl MarketSummary {
    /// New summary with ask/bid/last taken from a ticker
    pub fn update_from_ticker(&self, ticker: &Ticker) -> MarketSummary {
        MarketSummary {
            ask: ticker.ask,
            bid: ticker.bid,
            last: ticker.last,
            ..*self
        }
    }

    pub fn ticker(&self) -> Ticker {
        Ticker {
            ask: self.ask,
            bid: self.bid,
            last: self.last,
        }
    }
}

impl fmt::Display for MarketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Last: {}", self.last)?;
        writeln!(f, "  ASK: {}", self.ask)?;
        writeln!(f, "  BID: {}", self.bid)?;
        writeln!(f, "  Volume: {}", self.volume)?;
        writeln!(f, "  High: {}", self.high)?;
        writeln!(f, "  Low: {}", self.low)
    }
}

/// One OHLCV period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleStick {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Decimal,
    /// Start of the period, when the exchange reports it
    pub open_time: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_update_from_ticker_keeps_window_stats() {
        let summary = MarketSummary {
            high: dec!(110),
            low: dec!(90),
            volume: dec!(1000),
            ask: dec!(101),
            bid: dec!(99),
            last: dec!(100),
        };
        let ticker = Ticker {
            ask: dec!(102),
            bid: dec!(100),
            last: dec!(101),
        };

        let updated = summary.update_from_ticker(&ticker);

        assert_eq!(updated.ticker(), ticker);
        assert_eq!(updated.high, dec!(110));
        assert_eq!(updated.volume, dec!(1000));
        // original value untouched
        assert_eq!(summary.ask, dec!(101));
    }
}
