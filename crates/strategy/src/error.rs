use meridian_ports::ExchangeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("strategy {0} does not exist")]
    UnknownStrategy(String),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("strategy hook failed: {0}")]
    Hook(String),
}

pub type StrategyResult<T> = Result<T, StrategyError>;
