//! Bootstrap - turn a validated configuration into running parts
//!
//! - Build the markets each strategy is bound to
//! - Initialize one wrapper per configured exchange (simulated on request)
//! - Bind every configured strategy to its markets on the dispatcher

use crate::config::{BotConfig, ExchangeConfig, StrategyConfig};
use crate::error::{BootstrapError, BootstrapResult};
use meridian_core::{Market, MarketRef, MarketRegistry};
use meridian_exchange_sim::ExchangeWrapperSimulator;
use meridian_gateway::{
    Binance, Bitfinex, Bittrex, ChannelTransport, ExchangeAdapter, ExchangeGateway,
    GatewayConfig, HitBtc, Kraken, KuCoin, Transport,
};
use meridian_ports::{ExchangeWrapper, TransportError};
use meridian_strategy::{StrategyDispatcher, Wrappers};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Opens the transport a wrapper talks through
///
/// Credentials travel with the exchange config; the wrappers never see them.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, exchange: &ExchangeConfig) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Factory handing out one in-process [`ChannelTransport`] per exchange
#[derive(Default)]
pub struct ChannelTransportFactory {
    transports: Mutex<HashMap<String, Arc<ChannelTransport>>>,
}

impl ChannelTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport handed out for `exchange`, created on first use
    pub fn transport(&self, exchange: &str) -> Arc<ChannelTransport> {
        self.transports
            .lock()
            .entry(exchange.to_string())
            .or_default()
            .clone()
    }
}

impl TransportFactory for ChannelTransportFactory {
    fn connect(&self, exchange: &ExchangeConfig) -> Result<Arc<dyn Transport>, TransportError> {
        let transport: Arc<dyn Transport> = self.transport(&exchange.exchange);
        Ok(transport)
    }
}

/// Everything the bot loop needs once bootstrap succeeded
pub struct Bootstrapped {
    pub wrappers: Wrappers,
    pub registry: MarketRegistry,
}

/// Register the markets of every strategy, one list per strategy
///
/// Each configured market gets its own identity, even when two strategies
/// name the same pair.
pub fn build_markets(
    strategies: &[StrategyConfig],
    registry: &mut MarketRegistry,
) -> BootstrapResult<Vec<Vec<MarketRef>>> {
    strategies
        .iter()
        .map(|strategy| {
            strategy
                .markets
                .iter()
                .map(|config| -> BootstrapResult<MarketRef> {
                    let (base, quote) = Market::parse_name(&config.market)
                        .ok_or_else(|| BootstrapError::InvalidMarketName(config.market.clone()))?;
                    let symbols = config
                        .bindings
                        .iter()
                        .map(|b| (b.exchange.clone(), b.market_name.clone()));
                    Ok(registry.register(config.market.clone(), base, quote, symbols))
                })
                .collect::<BootstrapResult<Vec<_>>>()
        })
        .collect()
}

fn gateway<A: ExchangeAdapter>(
    adapter: A,
    transport: Arc<dyn Transport>,
    exchange: &ExchangeConfig,
    config: GatewayConfig,
) -> Arc<dyn ExchangeWrapper> {
    Arc::new(
        ExchangeGateway::new(adapter, transport, config)
            .with_deposit_addresses(exchange.deposit_addresses.clone())
            .with_withdraw_fees(exchange.withdraw_fees.clone()),
    )
}

/// Build the wrapper for one configured exchange
pub fn init_exchange(
    exchange: &ExchangeConfig,
    simulated: bool,
    factory: &dyn TransportFactory,
    config: &GatewayConfig,
) -> BootstrapResult<Arc<dyn ExchangeWrapper>> {
    let name = exchange.exchange.as_str();
    let fake_balances = match (simulated, &exchange.fake_balances) {
        (false, _) => None,
        (true, Some(balances)) => Some(balances.clone()),
        (true, None) => return Err(BootstrapError::MissingFakeBalances(name.to_string())),
    };

    let mut config = config.clone();
    if let Some(timeout) = exchange.request_timeout() {
        config = config.with_request_timeout(timeout);
    }

    let connect = || {
        factory
            .connect(exchange)
            .map_err(|e| BootstrapError::Transport {
                exchange: name.to_string(),
                reason: e.to_string(),
            })
    };
    let wrapper = match name {
        "binance" => gateway(Binance, connect()?, exchange, config),
        "bitfinex" => gateway(Bitfinex, connect()?, exchange, config),
        "bittrex" => gateway(Bittrex, connect()?, exchange, config),
        "hitbtc" => gateway(HitBtc, connect()?, exchange, config),
        "kraken" => gateway(Kraken, connect()?, exchange, config),
        "kucoin" => gateway(KuCoin, connect()?, exchange, config),
        other => return Err(BootstrapError::UnknownExchange(other.to_string())),
    };

    match fake_balances {
        Some(balances) => {
            log::info!("{} runs simulated with {} balance(s)", name, balances.len());
            Ok(Arc::new(ExchangeWrapperSimulator::new(wrapper, balances)))
        }
        None => {
            log::info!("{} initialized", name);
            Ok(wrapper)
        }
    }
}

/// Validate `config`, build markets and wrappers, bind strategies
///
/// Every strategy named in the config must already be registered on
/// `dispatcher`; nothing is bound unless all of them are.
pub fn bootstrap(
    config: &BotConfig,
    factory: &dyn TransportFactory,
    dispatcher: &mut StrategyDispatcher,
) -> BootstrapResult<Bootstrapped> {
    config.validate()?;
    if let Some(missing) = config
        .strategies
        .iter()
        .find(|s| !dispatcher.is_available(&s.strategy))
    {
        return Err(BootstrapError::UnknownStrategy(missing.strategy.clone()));
    }

    let mut registry = MarketRegistry::new();
    let markets = build_markets(&config.strategies, &mut registry)?;

    let gateway_config = GatewayConfig::default();
    let wrappers = config
        .exchange_configs
        .iter()
        .map(|exchange| {
            init_exchange(
                exchange,
                config.simulation_mode_on,
                factory,
                &gateway_config,
            )
        })
        .collect::<BootstrapResult<Vec<_>>>()?;

    for (strategy, markets) in config.strategies.iter().zip(markets) {
        dispatcher
            .match_with_markets(&strategy.strategy, markets)
            .map_err(|_| BootstrapError::UnknownStrategy(strategy.strategy.clone()))?;
    }

    log::info!(
        "Bootstrapped {} exchange(s), {} market(s), {} strategy binding(s)",
        wrappers.len(),
        registry.len(),
        dispatcher.bindings().len()
    );
    Ok(Bootstrapped {
        wrappers: wrappers.into(),
        registry,
    })
}
