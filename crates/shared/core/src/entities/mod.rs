mod fee;
mod order;
mod order_type;
mod side;
mod summary;

pub use fee::{FeeSchedule, TradeType};
pub use order::{Order, OrderBook};
pub use order_type::OrderKind;
pub use side::Side;
pub use summary::{CandleStick, MarketSummary, Ticker};
