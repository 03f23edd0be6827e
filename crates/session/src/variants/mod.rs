pub mod market_data;
pub mod trade;

pub use market_data::{MarketData, MarketDataSession};
pub use trade::{OrderRequest, Trade, TradeSession};
