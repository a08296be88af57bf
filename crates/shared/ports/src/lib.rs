//! Meridian Ports
//!
//! Port definitions (traits) for the Meridian trading runtime.
//! These define the boundary between strategies and exchange infrastructure.

mod error;
mod exchange;

pub use error::{ExchangeError, ExchangeResult, TransportError};
pub use exchange::{ExchangeWrapper, FeedStatus};
