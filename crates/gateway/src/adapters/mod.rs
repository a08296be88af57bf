//! Exchange adapters
//!
//! One [`ExchangeAdapter`](crate::adapter::ExchangeAdapter) per supported
//! exchange. Adapters are stateless; all they do is translate requests into
//! [`RestCall`](crate::transport::RestCall)s and payloads into domain types.

pub mod binance;
pub mod bitfinex;
pub mod bittrex;
pub mod hitbtc;
pub mod kraken;
pub mod kucoin;

pub use binance::Binance;
pub use bitfinex::Bitfinex;
pub use bittrex::Bittrex;
pub use hitbtc::HitBtc;
pub use kraken::Kraken;
pub use kucoin::KuCoin;
