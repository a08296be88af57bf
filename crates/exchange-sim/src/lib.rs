//! Paper trading
//!
//! [`ExchangeWrapperSimulator`] wraps a real [`meridian_ports::ExchangeWrapper`]:
//! market data still comes from the exchange, while market orders, balances
//! and withdrawals are settled against an in-memory [`BalanceLedger`].

pub mod ledger;
pub mod simulator;

pub use ledger::BalanceLedger;
pub use simulator::{ExchangeWrapperSimulator, Fill, walk_book};
