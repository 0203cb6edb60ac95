use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ConfigError, EngineConfig};
use crate::orderbook::error::OrderBookResult;
use crate::orderbook::expiry::ExpiryScheduler;
use crate::orderbook::operations::BookState;
use crate::orderbook::types::{Order, OrderId, OrderModify, OrderbookLevelInfos, Price, Trades};
use crate::utils::time::{Clock, SystemClock};

/// Thread-safe limit order book for a single instrument.
///
/// Every public operation takes the book lock for its whole duration, so callers
/// and the good-for-day expiry worker never observe a half-applied change.
#[derive(Debug)]
pub struct OrderBook {
    state: Arc<Mutex<BookState>>,
    expiry: Option<ExpiryScheduler>,
}

impl OrderBook {
    /// A book without automatic good-for-day expiry
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BookState::new())),
            expiry: None,
        }
    }

    /// A book whose expiry worker reads time from `clock`
    pub fn with_expiry(config: &EngineConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut book = Self::new();

        if config.expiry.enabled {
            let cutoff = config.expiry.cutoff_time()?;
            book.expiry = Some(ExpiryScheduler::spawn(
                Arc::clone(&book.state),
                cutoff,
                config.expiry.slack(),
                clock,
            )?);
            info!("Order book created with good-for-day cutoff {}", cutoff);
        } else {
            info!("Order book created without good-for-day expiry");
        }

        Ok(book)
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::with_expiry(config, Arc::new(SystemClock))
    }

    /// Submit a new order, returning the trades it produced
    pub fn add_order(&self, order: Order) -> OrderBookResult<Trades> {
        self.state.lock().add_order(order)
    }

    /// Remove a resting order, returning it with its unfilled quantity
    pub fn cancel_order(&self, order_id: OrderId) -> OrderBookResult<Order> {
        self.state.lock().cancel_order(order_id)
    }

    /// Cancel and replace in one step; the replacement loses time priority
    pub fn modify_order(&self, modify: OrderModify) -> OrderBookResult<Trades> {
        self.state.lock().modify_order(modify)
    }

    pub fn get_order_infos(&self) -> OrderbookLevelInfos {
        self.state.lock().get_order_infos()
    }

    /// Number of resting orders
    pub fn size(&self) -> usize {
        self.state.lock().size()
    }

    /// Copy of a resting order
    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        self.state.lock().get(order_id).cloned()
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.state.lock().best_bid()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.state.lock().best_ask()
    }

    pub fn spread(&self) -> Option<Price> {
        let state = self.state.lock();
        spread_of(state.best_bid(), state.best_ask())
    }

    pub fn last_trade_price(&self) -> Option<Price> {
        self.state.lock().last_trade_price
    }

    pub fn get_stats(&self) -> OrderBookStats {
        let state = self.state.lock();
        let best_bid = state.best_bid();
        let best_ask = state.best_ask();

        OrderBookStats {
            total_orders: state.size(),
            bid_levels: state.bids.len(),
            ask_levels: state.asks.len(),
            best_bid,
            best_ask,
            spread: spread_of(best_bid, best_ask),
            last_trade_price: state.last_trade_price,
            total_trades: state.total_trades,
            total_volume: state.total_volume,
        }
    }

    pub fn check_invariants(&self) -> OrderBookResult<()> {
        self.state.lock().check_invariants()
    }

    /// Expire every resting good-for-day order now
    pub fn prune_good_for_day(&self) -> OrderBookResult<Vec<Order>> {
        self.state.lock().prune_good_for_day()
    }

    pub fn has_expiry(&self) -> bool {
        self.expiry.as_ref().map_or(false, ExpiryScheduler::is_running)
    }

    /// Stop the expiry worker and wait for it. The book stays usable.
    pub fn shutdown(&mut self) {
        if let Some(mut expiry) = self.expiry.take() {
            debug!("Shutting down good-for-day expiry");
            expiry.stop();
        }
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OrderBook {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spread_of(best_bid: Option<Price>, best_ask: Option<Price>) -> Option<Price> {
    match (best_bid, best_ask) {
        (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookStats {
    pub total_orders: usize,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub spread: Option<Price>,
    pub last_trade_price: Option<Price>,
    pub total_trades: u64,
    pub total_volume: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::error::OrderBookError;
    use crate::orderbook::types::{LevelInfo, OrderStatus, OrderType, Quantity, Side};

    fn gtc(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Order {
        Order::new(OrderType::GoodTillCancel, id, side, price, quantity)
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new();
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.spread(), None);
        assert_eq!(book.size(), 0);
        assert!(!book.has_expiry());
        assert_eq!(book.get_order_infos(), OrderbookLevelInfos::default());
    }

    #[test]
    fn test_add_then_cancel() {
        let book = OrderBook::new();

        let trades = book.add_order(gtc(1, Side::Buy, 100, 10)).unwrap();
        assert!(trades.is_empty());
        assert_eq!(book.size(), 1);

        let cancelled = book.cancel_order(1).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(book.size(), 0);
    }

    #[test]
    fn test_full_cross_empties_book() {
        let book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 10)).unwrap();

        let trades = book.add_order(gtc(2, Side::Sell, 100, 10)).unwrap();

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].bid.order_id, 1);
        assert_eq!(trades[0].ask.order_id, 2);
        assert_eq!((trades[0].price(), trades[0].quantity()), (100, 10));
        assert_eq!(book.size(), 0);
        assert_eq!(book.last_trade_price(), Some(100));
    }

    #[test]
    fn test_fill_or_kill_rejected_when_short() {
        let book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 100, 5)).unwrap();

        let result = book.add_order(Order::new(OrderType::FillOrKill, 2, Side::Buy, 100, 10));

        assert_eq!(
            result.unwrap_err(),
            OrderBookError::InsufficientLiquidity { order_id: 2 }
        );
        assert_eq!(book.size(), 1);
        assert_eq!(book.get_order(1).unwrap().remaining_quantity, 5);
    }

    #[test]
    fn test_partial_fill_leaves_remainder_resting() {
        let book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 101, 4)).unwrap();

        let trades = book.add_order(gtc(2, Side::Buy, 101, 10)).unwrap();

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity(), 4);
        assert_eq!(
            book.get_order_infos().bids,
            vec![LevelInfo {
                price: 101,
                quantity: 6,
                order_count: 1
            }]
        );
        assert!(book.get_order_infos().asks.is_empty());
    }

    #[test]
    fn test_stats() {
        let book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 10)).unwrap();
        book.add_order(gtc(2, Side::Buy, 99, 10)).unwrap();
        book.add_order(gtc(3, Side::Sell, 103, 10)).unwrap();
        book.add_order(gtc(4, Side::Sell, 100, 3)).unwrap();

        let stats = book.get_stats();

        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.bid_levels, 2);
        assert_eq!(stats.ask_levels, 1);
        assert_eq!(stats.best_bid, Some(100));
        assert_eq!(stats.best_ask, Some(103));
        assert_eq!(stats.spread, Some(3));
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.total_volume, 3);
    }

    #[test]
    fn test_disabled_expiry_spawns_nothing() {
        let book = OrderBook::from_config(&EngineConfig::without_expiry()).unwrap();
        assert!(!book.has_expiry());
    }

    #[test]
    fn test_shutdown_keeps_book_usable() {
        let mut book = OrderBook::from_config(&EngineConfig::default()).unwrap();
        assert!(book.has_expiry());

        book.shutdown();
        assert!(!book.has_expiry());

        book.add_order(gtc(1, Side::Buy, 100, 10)).unwrap();
        assert_eq!(book.size(), 1);
    }
}
