use rust_decimal::Decimal;
use thiserror::Error;

/// Failures reported by an exchange transport client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Rate limited by exchange")]
    RateLimited,

    #[error("Channel closed")]
    ChannelClosed,
}

/// Errors returned by exchange wrapper operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    // Transient / remote
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Exchange error: {0}")]
    Exchange(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Cannot decode exchange payload: {0}")]
    Decode(String),

    // Capability gaps
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    #[error("Websocket not supported")]
    WebsocketNotSupported,

    #[error("Not mockable: {0}")]
    NotMockable(&'static str),

    // Cache state
    #[error("Summary not loaded")]
    SummaryNotLoaded,

    #[error("Orderbook not loaded")]
    OrderbookNotLoaded,

    #[error("Candles not loaded")]
    CandlesNotLoaded,

    #[error("Feed failed: {0}")]
    FeedFailed(String),

    /// The stream dropped; cached values were discarded until it resyncs
    #[error("Feed reconnecting")]
    FeedReconnecting,

    // Domain violations (simulator)
    #[error("Insufficient {currency} funds: required {required}, available {available}")]
    InsufficientFunds {
        currency: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    // Lookups
    #[error("Market {market} has no symbol on {exchange}")]
    SymbolNotFound { exchange: String, market: String },

    #[error("Currency not found: {0}")]
    CurrencyNotFound(String),
}

impl ExchangeError {
    /// The operation is structurally unavailable for this exchange or mode
    pub fn is_capability_gap(&self) -> bool {
        matches!(
            self,
            ExchangeError::NotSupported(_)
                | ExchangeError::WebsocketNotSupported
                | ExchangeError::NotMockable(_)
        )
    }

    /// A streaming-mode read found no cached value yet
    pub fn is_not_loaded(&self) -> bool {
        matches!(
            self,
            ExchangeError::SummaryNotLoaded
                | ExchangeError::OrderbookNotLoaded
                | ExchangeError::CandlesNotLoaded
        )
    }
}

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;
