use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("no wrapper for exchange {0}")]
    UnknownExchange(String),

    #[error("missing API credentials for {0}")]
    MissingCredentials(String),

    #[error("simulation mode needs fake balances for {0}")]
    MissingFakeBalances(String),

    #[error("market name {0} is not of the form BASE-QUOTE")]
    InvalidMarketName(String),

    #[error("strategy {0} does not exist")]
    UnknownStrategy(String),

    #[error("cannot open transport for {exchange}: {reason}")]
    Transport { exchange: String, reason: String },
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;
