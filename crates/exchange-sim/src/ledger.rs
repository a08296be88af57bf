//! Simulated account balances

use meridian_ports::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Per-currency balances of a simulated account
///
/// Debits are checked before they are applied, so no balance ever goes
/// negative. Callers that need several changes to land together check
/// every debit first and then apply them under one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceLedger {
    balances: HashMap<String, Decimal>,
}

impl BalanceLedger {
    pub fn new(initial: HashMap<String, Decimal>) -> Self {
        Self { balances: initial }
    }

    /// Balance of `currency`, zero if it was never funded
    pub fn available(&self, currency: &str) -> Decimal {
        self.balances.get(currency).copied().unwrap_or(Decimal::ZERO)
    }

    /// Balance of `currency`, recording an explicit zero for unknown ones
    pub fn balance_or_zero(&mut self, currency: &str) -> Decimal {
        *self
            .balances
            .entry(currency.to_string())
            .or_insert(Decimal::ZERO)
    }

    /// Fail with `InsufficientFunds` unless `required` of `currency` is available
    pub fn ensure(&self, currency: &str, required: Decimal) -> ExchangeResult<()> {
        let available = self.available(currency);
        if available < required {
            return Err(ExchangeError::InsufficientFunds {
                currency: currency.to_string(),
                required,
                available,
            });
        }
        Ok(())
    }

    pub fn debit(&mut self, currency: &str, amount: Decimal) -> ExchangeResult<()> {
        self.ensure(currency, amount)?;
        *self
            .balances
            .entry(currency.to_string())
            .or_insert(Decimal::ZERO) -= amount;
        Ok(())
    }

    pub fn credit(&mut self, currency: &str, amount: Decimal) {
        *self
            .balances
            .entry(currency.to_string())
            .or_insert(Decimal::ZERO) += amount;
    }

    pub fn balances(&self) -> &HashMap<String, Decimal> {
        &self.balances
    }
}

impl From<HashMap<String, Decimal>> for BalanceLedger {
    fn from(balances: HashMap<String, Decimal>) -> Self {
        Self::new(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger() -> BalanceLedger {
        BalanceLedger::new(HashMap::from([("BTC".to_string(), dec!(2))]))
    }

    #[test]
    fn test_debit_and_credit() {
        let mut ledger = ledger();
        ledger.debit("BTC", dec!(0.5)).unwrap();
        ledger.credit("ETH", dec!(10));

        assert_eq!(ledger.available("BTC"), dec!(1.5));
        assert_eq!(ledger.available("ETH"), dec!(10));
    }

    #[test]
    fn test_overdraft_rejected_unchanged() {
        let mut ledger = ledger();
        let before = ledger.clone();

        let err = ledger.debit("BTC", dec!(5)).unwrap_err();

        assert_eq!(
            err,
            ExchangeError::InsufficientFunds {
                currency: "BTC".into(),
                required: dec!(5),
                available: dec!(2),
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_unknown_currency() {
        let mut ledger = ledger();
        assert_eq!(ledger.available("XRP"), Decimal::ZERO);
        assert!(!ledger.balances().contains_key("XRP"));

        assert_eq!(ledger.balance_or_zero("XRP"), Decimal::ZERO);
        assert!(ledger.balances().contains_key("XRP"));
        assert!(ledger.debit("XRP", dec!(0.1)).is_err());
    }
}
