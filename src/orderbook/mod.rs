//! Core order book implementation module
//!
//! Resting orders live in a slab arena and are threaded into per-price FIFO
//! queues; an id index locates any order for constant-time cancellation.

pub mod arena;
pub mod book;
pub mod error;
pub mod expiry;
pub mod matching;
pub mod operations;
pub mod price_level;
pub mod types;

// Re-export main types for convenience
pub use book::{OrderBook, OrderBookStats};
pub use error::{OrderBookError, OrderBookResult};
pub use operations::BookState;
pub use price_level::PriceLevel;
pub use types::{
    LevelInfo, Order, OrderId, OrderModify, OrderStatus, OrderType, OrderbookLevelInfos, Price,
    Quantity, Side, Trade, TradeInfo, Trades,
};
