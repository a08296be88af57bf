//! Bot configuration
//!
//! The structures arrive already parsed (any serde format works); this
//! module only checks them before anything is built from them.

use crate::error::{BootstrapError, BootstrapResult};
use meridian_core::Market;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Exchanges the bootstrap can build a wrapper for
pub const SUPPORTED_EXCHANGES: [&str; 6] =
    ["binance", "bitfinex", "bittrex", "hitbtc", "kraken", "kucoin"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    pub exchange_configs: Vec<ExchangeConfig>,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub simulation_mode_on: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub exchange: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// currency -> deposit address
    #[serde(default)]
    pub deposit_addresses: HashMap<String, String>,
    /// Starting ledger in simulation mode
    #[serde(default)]
    pub fake_balances: Option<HashMap<String, Decimal>>,
    /// currency -> flat withdraw fee
    #[serde(default)]
    pub withdraw_fees: HashMap<String, Decimal>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl ExchangeConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    fn has_credentials(&self) -> bool {
        !self.public_key.is_empty() && !self.secret_key.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy: String,
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Canonical `BASE-QUOTE` name
    pub market: String,
    #[serde(default)]
    pub bindings: Vec<ExchangeBindingConfig>,
}

/// How one exchange names a market
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeBindingConfig {
    pub exchange: String,
    pub market_name: String,
}

impl BotConfig {
    /// Fail fast on anything that would stop the bot from starting
    pub fn validate(&self) -> BootstrapResult<()> {
        for exchange in &self.exchange_configs {
            if !SUPPORTED_EXCHANGES.contains(&exchange.exchange.as_str()) {
                return Err(BootstrapError::UnknownExchange(exchange.exchange.clone()));
            }
            if self.simulation_mode_on {
                if exchange.fake_balances.is_none() {
                    return Err(BootstrapError::MissingFakeBalances(
                        exchange.exchange.clone(),
                    ));
                }
            } else if !exchange.has_credentials() {
                return Err(BootstrapError::MissingCredentials(exchange.exchange.clone()));
            }
        }

        for strategy in &self.strategies {
            for market in &strategy.markets {
                if Market::parse_name(&market.market).is_none() {
                    return Err(BootstrapError::InvalidMarketName(market.market.clone()));
                }
                for binding in &market.bindings {
                    if !self.is_configured(&binding.exchange) {
                        log::warn!(
                            "{} is bound on {}, which is not configured",
                            market.market,
                            binding.exchange
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn is_configured(&self, exchange: &str) -> bool {
        self.exchange_configs.iter().any(|c| c.exchange == exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn exchange(name: &str) -> ExchangeConfig {
        ExchangeConfig {
            exchange: name.to_string(),
            public_key: "pk".to_string(),
            secret_key: "sk".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: BotConfig = serde_json::from_value(serde_json::json!({
            "exchange_configs": [{
                "exchange": "bittrex",
                "public_key": "pk",
                "secret_key": "sk",
                "fake_balances": {"BTC": "1.5"},
                "request_timeout_ms": 2500
            }],
            "strategies": [{
                "strategy": "Watch5Min",
                "markets": [{
                    "market": "BTC-ETH",
                    "bindings": [{"exchange": "bittrex", "market_name": "BTC-ETH"}]
                }]
            }]
        }))
        .unwrap();

        assert!(!config.simulation_mode_on);
        let bittrex = &config.exchange_configs[0];
        assert!(bittrex.deposit_addresses.is_empty());
        assert_eq!(bittrex.fake_balances.as_ref().unwrap()["BTC"], dec!(1.5));
        assert_eq!(bittrex.request_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.strategies[0].markets[0].bindings[0].market_name, "BTC-ETH");
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_exchange() {
        let config = BotConfig {
            exchange_configs: vec![exchange("poloniex")],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(BootstrapError::UnknownExchange("poloniex".into()))
        );
    }

    #[test]
    fn test_credentials_required_outside_simulation() {
        let mut config = BotConfig {
            exchange_configs: vec![ExchangeConfig {
                exchange: "binance".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(BootstrapError::MissingCredentials("binance".into()))
        );

        config.simulation_mode_on = true;
        assert_eq!(
            config.validate(),
            Err(BootstrapError::MissingFakeBalances("binance".into()))
        );

        config.exchange_configs[0].fake_balances = Some(HashMap::new());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_market_name_shape() {
        let config = BotConfig {
            exchange_configs: vec![exchange("kraken")],
            strategies: vec![StrategyConfig {
                strategy: "Watch5Min".into(),
                markets: vec![MarketConfig {
                    market: "BTCETH".into(),
                    bindings: Vec::new(),
                }],
            }],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(BootstrapError::InvalidMarketName("BTCETH".into()))
        );
    }
}
