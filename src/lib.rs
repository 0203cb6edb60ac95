//! Order Book Matching Engine
//!
//! A single-instrument limit order book with strict price-time priority,
//! five order types and automatic end-of-day expiry of good-for-day orders.
//!
//! # Features
//!
//! - **Price-Time Priority**: Best price first, FIFO within a price level
//! - **Order Types**: GoodTillCancel, GoodForDay, FillAndKill, FillOrKill, Market
//! - **Constant-Time Cancel**: Orders live in a slab arena with stable handles
//! - **Day-Order Expiry**: A background worker cancels good-for-day orders at the cutoff
//! - **Monitoring**: Counters and latency histograms through the `metrics` facade
//!
//! # Quick Start
//!
//! ```rust
//! use orderbook_matching_engine::{Order, OrderBook, OrderType, Side};
//!
//! let book = OrderBook::new();
//!
//! book.add_order(Order::new(OrderType::GoodTillCancel, 1, Side::Sell, 15000, 100))?;
//! let trades = book.add_order(Order::new(OrderType::GoodTillCancel, 2, Side::Buy, 15000, 40))?;
//!
//! assert_eq!(trades[0].quantity(), 40);
//! assert_eq!(book.best_ask(), Some(15000));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! 1. **Price Levels**: `BTreeMap<Price, PriceLevel>` per side; the best bid is the
//!    last key and the best ask the first
//! 2. **Order Queues**: Each level is an intrusive FIFO list threaded through an
//!    arena of order nodes
//! 3. **Index**: `HashMap<OrderId, OrderLocation>` maps ids to side, price and handle
//!
//! All state sits behind one lock shared by callers and the expiry worker.

pub mod config;
pub mod metrics;
pub mod orderbook;
pub mod scenario;
pub mod utils;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig, ExpiryConfig};
pub use orderbook::{
    error::{OrderBookError, OrderBookResult},
    types::{
        LevelInfo, Order, OrderId, OrderModify, OrderStatus, OrderType, OrderbookLevelInfos,
        Price, Quantity, Side, Trade, TradeInfo, Trades,
    },
    OrderBook, OrderBookStats,
};

pub use crate::metrics::OrderBookMetrics;
