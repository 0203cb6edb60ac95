use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::orderbook::arena::{Arena, Handle, OrderNode};
use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::matching::MatchingEngine;
use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::types::{
    LevelInfo, Order, OrderId, OrderLocation, OrderModify, OrderType, OrderbookLevelInfos, Price,
    Quantity, Side, Trades,
};

/// Level collections keyed by price. Bids read best-first from the back,
/// asks from the front.
pub type Levels = BTreeMap<Price, PriceLevel>;

/// Mutable state of one book. Not synchronised; [`crate::OrderBook`] wraps it
/// in a lock so every operation below runs to completion unobserved.
#[derive(Debug, Default)]
pub struct BookState {
    pub(crate) bids: Levels,
    pub(crate) asks: Levels,
    pub(crate) orders: Arena<OrderNode>,
    pub(crate) index: HashMap<OrderId, OrderLocation>,

    // Market state
    pub(crate) last_trade_price: Option<Price>,
    pub(crate) total_trades: u64,
    pub(crate) total_volume: u64,
}

impl BookState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit, rest and match a new order
    pub fn add_order(&mut self, mut order: Order) -> OrderBookResult<Trades> {
        debug!("Adding order: {:?}", order);

        if self.index.contains_key(&order.id) {
            warn!("Order {} already exists, rejecting add", order.id);
            return Err(OrderBookError::DuplicateOrderId(order.id));
        }
        if order.remaining_quantity == 0 {
            warn!("Order {} has zero quantity, rejecting add", order.id);
            return Err(OrderBookError::ZeroQuantity(order.id));
        }

        MatchingEngine::admit(&mut order, self)?;

        let order_id = order.id;
        let side = order.side;
        let order_type = order.order_type;

        self.insert(order)?;
        let trades = MatchingEngine::match_orders(self, side)?;

        if !order_type.may_rest() && self.index.contains_key(&order_id) {
            let killed = self.remove_order(order_id)?;
            debug!(
                "{} order {} discarded with {} unfilled",
                order_type, order_id, killed.remaining_quantity
            );
        }

        Ok(trades)
    }

    /// Cancel an existing order
    pub fn cancel_order(&mut self, order_id: OrderId) -> OrderBookResult<Order> {
        debug!("Cancelling order: {}", order_id);

        let mut order = self.remove_order(order_id)?;
        order.cancel();

        info!(
            "Order {} cancelled, {} remaining at {} on {} side",
            order_id, order.remaining_quantity, order.price, order.side
        );
        Ok(order)
    }

    /// Replace an order, keeping its type; the replacement goes through full admission
    pub fn modify_order(&mut self, modify: OrderModify) -> OrderBookResult<Trades> {
        debug!(
            "Modifying order {}: {} {} @ {}",
            modify.id, modify.side, modify.quantity, modify.price
        );

        let order_type = self.order_type_of(modify.id)?;
        if modify.quantity == 0 {
            warn!("Order {} has zero quantity, rejecting modify", modify.id);
            return Err(OrderBookError::ZeroQuantity(modify.id));
        }
        self.check_level_room(&modify)?;

        self.cancel_order(modify.id)?;
        self.add_order(modify.to_order(order_type))
    }

    /// Aggregated depth per level, best prices first
    pub fn get_order_infos(&self) -> OrderbookLevelInfos {
        let info = |level: &PriceLevel| {
            let (quantity, order_count) = level.get_depth_info();
            LevelInfo {
                price: level.price,
                quantity,
                order_count,
            }
        };

        OrderbookLevelInfos {
            bids: self.bids.values().rev().map(info).collect(),
            asks: self.asks.values().map(info).collect(),
        }
    }

    /// Number of resting orders
    pub fn size(&self) -> usize {
        self.index.len()
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        let location = self.index.get(&order_id)?;
        self.orders.get(location.handle).map(|node| &node.order)
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    /// Cancel every resting good-for-day order, oldest id first
    pub fn prune_good_for_day(&mut self) -> OrderBookResult<Vec<Order>> {
        let mut order_ids: Vec<OrderId> = self
            .index
            .iter()
            .filter(|(_, location)| {
                self.orders
                    .get(location.handle)
                    .map_or(false, |node| node.order.order_type == OrderType::GoodForDay)
            })
            .map(|(order_id, _)| *order_id)
            .collect();
        order_ids.sort_unstable();

        let mut expired = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            let mut order = self.cancel_order(order_id)?;
            order.expire();
            expired.push(order);
        }

        info!(
            "Expired {} good-for-day orders, {} left",
            expired.len(),
            self.size()
        );
        Ok(expired)
    }

    /// Verify every structural invariant of the book
    pub fn check_invariants(&self) -> OrderBookResult<()> {
        let mut seen = 0usize;

        for (side, levels) in [(Side::Buy, &self.bids), (Side::Sell, &self.asks)] {
            for (price, level) in levels {
                if level.is_empty() {
                    return Err(broken(format!("empty {} level at {}", side, price)));
                }
                if level.price != *price {
                    return Err(broken(format!(
                        "{} level keyed {} reports price {}",
                        side, price, level.price
                    )));
                }

                let mut quantity: Quantity = 0;
                let mut count = 0u32;
                for (handle, order) in level.iter(&self.orders) {
                    if order.side != side || order.price != *price {
                        return Err(broken(format!(
                            "order {} queued at {} {} but is {} {}",
                            order.id, side, price, order.side, order.price
                        )));
                    }
                    if order.remaining_quantity == 0
                        || order.remaining_quantity > order.initial_quantity
                    {
                        return Err(broken(format!(
                            "order {} rests with {} of {}",
                            order.id, order.remaining_quantity, order.initial_quantity
                        )));
                    }
                    let expected = OrderLocation {
                        side,
                        price: *price,
                        handle,
                    };
                    if self.index.get(&order.id) != Some(&expected) {
                        return Err(broken(format!("order {} missing from index", order.id)));
                    }
                    quantity += order.remaining_quantity;
                    count += 1;
                }

                if (quantity, count) != level.get_depth_info() {
                    return Err(broken(format!(
                        "{} level {} caches {:?} but holds ({}, {})",
                        side,
                        price,
                        level.get_depth_info(),
                        quantity,
                        count
                    )));
                }
                seen += count as usize;
            }
        }

        if seen != self.index.len() || seen != self.orders.len() {
            return Err(broken(format!(
                "{} queued orders, {} indexed, {} stored",
                seen,
                self.index.len(),
                self.orders.len()
            )));
        }

        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return Err(broken(format!("crossed book: bid {} >= ask {}", bid, ask)));
            }
        }

        Ok(())
    }

    // Level and index bookkeeping shared with the matching engine

    pub(crate) fn levels(&self, side: Side) -> &Levels {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub(crate) fn order_mut(&mut self, handle: Handle) -> OrderBookResult<&mut Order> {
        self.orders
            .get_mut(handle)
            .map(|node| &mut node.order)
            .ok_or_else(|| broken(format!("{:?} points at a free slot", handle)))
    }

    pub(crate) fn level_mut(&mut self, side: Side, price: Price) -> OrderBookResult<&mut PriceLevel> {
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        levels
            .get_mut(&price)
            .ok_or_else(|| broken(format!("no {} level at {}", side, price)))
    }

    /// Unlink an order from its level and the index, dropping the level if it empties
    pub(crate) fn remove_order(&mut self, order_id: OrderId) -> OrderBookResult<Order> {
        let location = self
            .index
            .remove(&order_id)
            .ok_or(OrderBookError::UnknownOrderId(order_id))?;

        let levels = match location.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let level = levels.get_mut(&location.price).ok_or_else(|| {
            broken(format!(
                "order {} indexed at missing {} level {}",
                order_id, location.side, location.price
            ))
        })?;

        let order = level.remove(&mut self.orders, location.handle)?;
        if level.is_empty() {
            levels.remove(&location.price);
        }
        Ok(order)
    }

    fn insert(&mut self, order: Order) -> OrderBookResult<()> {
        let order_id = order.id;
        let side = order.side;
        let price = order.price;

        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        let handle = levels
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .push_back(&mut self.orders, order)?;

        self.index.insert(
            order_id,
            OrderLocation {
                side,
                price,
                handle,
            },
        );

        debug!(
            "Order {} added to book at price {} on {} side",
            order_id, price, side
        );
        Ok(())
    }

    /// Refuse a replacement its target level could not absorb once the original leaves.
    /// Any fill the replacement gets first is ignored, so this errs on the side of rejecting.
    fn check_level_room(&self, modify: &OrderModify) -> OrderBookResult<()> {
        let level = match self.levels(modify.side).get(&modify.price) {
            Some(level) => level,
            None => return Ok(()),
        };

        let mut resting = level.total_quantity();
        if let Some(current) = self.get(modify.id) {
            if current.side == modify.side && current.price == modify.price {
                resting = resting.saturating_sub(current.remaining_quantity);
            }
        }

        match resting.checked_add(modify.quantity) {
            Some(_) => Ok(()),
            None => {
                warn!(
                    "Order {} would overflow level {}, rejecting modify",
                    modify.id, modify.price
                );
                Err(OrderBookError::LevelOverflow {
                    order_id: modify.id,
                    price: modify.price,
                })
            }
        }
    }

    fn order_type_of(&self, order_id: OrderId) -> OrderBookResult<OrderType> {
        match self.get(order_id) {
            Some(order) => Ok(order.order_type),
            None => {
                warn!("Order {} not found for modify", order_id);
                Err(OrderBookError::UnknownOrderId(order_id))
            }
        }
    }
}

fn broken(message: String) -> OrderBookError {
    OrderBookError::BrokenLevelInvariant(message)
}
