use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee classification of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    /// Adds liquidity (resting order)
    Maker,
    /// Removes liquidity (crosses the book)
    Taker,
}

/// Fixed percentage fee table of an exchange
///
/// Rates are fractions (0.001 = 0.1%). Exchanges only reveal actual fees
/// after an order is placed, so these tables are static.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
}

impl FeeSchedule {
    /// Create a new fee schedule
    pub const fn new(maker_fee: Decimal, taker_fee: Decimal) -> Self {
        Self {
            maker_fee,
            taker_fee,
        }
    }

    /// Rate for the given trade type
    pub fn rate(&self, trade_type: TradeType) -> Decimal {
        match trade_type {
            TradeType::Maker => self.maker_fee,
            TradeType::Taker => self.taker_fee,
        }
    }

    /// Fee of an order of `amount` at price `limit`
    pub fn trading_fee(&self, amount: Decimal, limit: Decimal, trade_type: TradeType) -> Decimal {
        amount * limit * self.rate(trade_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trading_fee() {
        let fees = FeeSchedule::new(dec!(0.0010), dec!(0.0020));

        assert_eq!(fees.rate(TradeType::Maker), dec!(0.0010));
        assert_eq!(fees.trading_fee(dec!(2), dec!(100), TradeType::Maker), dec!(0.2));
        assert_eq!(fees.trading_fee(dec!(2), dec!(100), TradeType::Taker), dec!(0.4));
    }
}
