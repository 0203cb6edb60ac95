use tracing::{debug, trace};

use crate::orderbook::arena::Handle;
use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::operations::{BookState, Levels};
use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::types::{
    Order, OrderId, OrderType, Price, Quantity, Side, Trade, TradeInfo, Trades,
};

/// Admission rules and the crossing loop for every order type
pub struct MatchingEngine;

impl MatchingEngine {
    /// Apply the type-specific admission rule; on error nothing has been touched
    pub fn admit(order: &mut Order, state: &BookState) -> OrderBookResult<()> {
        let opposite = state.levels(order.side.opposite());

        match order.order_type {
            OrderType::GoodTillCancel | OrderType::GoodForDay | OrderType::FillAndKill => Ok(()),
            OrderType::FillOrKill => {
                let available = Self::crossing_liquidity(order.side, order.price, opposite);
                if available < order.remaining_quantity {
                    debug!(
                        "FOK order {} cannot be completely filled ({} of {}) - rejecting",
                        order.id, available, order.remaining_quantity
                    );
                    return Err(OrderBookError::InsufficientLiquidity { order_id: order.id });
                }
                Ok(())
            }
            OrderType::Market => match Self::worst_opposing_price(order.side, opposite) {
                Some(price) => {
                    debug!("Market order {} repriced to {}", order.id, price);
                    order.price = price;
                    Ok(())
                }
                None => {
                    debug!("Market order {} finds an empty book - rejecting", order.id);
                    Err(OrderBookError::InsufficientLiquidity { order_id: order.id })
                }
            },
        }
    }

    /// Total opposing quantity at prices an order on `side` limited at `price` would cross,
    /// capped at `Quantity::MAX`
    pub fn crossing_liquidity(side: Side, price: Price, opposite: &Levels) -> Quantity {
        let total = |acc: Quantity, (_, level): (&Price, &PriceLevel)| {
            acc.saturating_add(level.total_quantity())
        };
        match side {
            Side::Buy => opposite.range(..=price).fold(0, total),
            Side::Sell => opposite.range(price..).fold(0, total),
        }
    }

    /// The deepest opposing price, so a market order crosses every resting level
    fn worst_opposing_price(side: Side, opposite: &Levels) -> Option<Price> {
        match side {
            Side::Buy => opposite.keys().next_back().copied(),
            Side::Sell => opposite.keys().next().copied(),
        }
    }

    /// Cross the book until best bid < best ask or a side runs dry.
    ///
    /// `aggressor` is the side of the order that was just inserted; every trade
    /// in one pass executes at the resting (opposite) level's price.
    pub fn match_orders(state: &mut BookState, aggressor: Side) -> OrderBookResult<Trades> {
        let mut trades = Vec::new();

        loop {
            let (bid_price, ask_price) = match (state.best_bid(), state.best_ask()) {
                (Some(bid), Some(ask)) if bid >= ask => (bid, ask),
                _ => break,
            };

            let bid_handle = state
                .level_mut(Side::Buy, bid_price)?
                .front()
                .ok_or_else(|| empty_level(Side::Buy, bid_price))?;
            let ask_handle = state
                .level_mut(Side::Sell, ask_price)?
                .front()
                .ok_or_else(|| empty_level(Side::Sell, ask_price))?;

            let bid_remaining = state.order_mut(bid_handle)?.remaining_quantity;
            let ask_remaining = state.order_mut(ask_handle)?.remaining_quantity;
            let quantity = bid_remaining.min(ask_remaining);

            let (bid_id, bid_filled) =
                Self::fill(state, Side::Buy, bid_price, bid_handle, quantity)?;
            let (ask_id, ask_filled) =
                Self::fill(state, Side::Sell, ask_price, ask_handle, quantity)?;

            let price = match aggressor {
                Side::Buy => ask_price,
                Side::Sell => bid_price,
            };
            trace!(
                "Matched bid {} with ask {} for {} @ {}",
                bid_id,
                ask_id,
                quantity,
                price
            );
            trades.push(Trade::new(
                TradeInfo {
                    order_id: bid_id,
                    price,
                    quantity,
                },
                TradeInfo {
                    order_id: ask_id,
                    price,
                    quantity,
                },
            ));

            if bid_filled {
                state.remove_order(bid_id)?;
            }
            if ask_filled {
                state.remove_order(ask_id)?;
            }

            state.total_trades += 1;
            state.total_volume = state.total_volume.saturating_add(quantity);
            state.last_trade_price = Some(price);
        }

        if !trades.is_empty() {
            debug!("Matching generated {} trades", trades.len());
        }
        Ok(trades)
    }

    fn fill(
        state: &mut BookState,
        side: Side,
        price: Price,
        handle: Handle,
        quantity: Quantity,
    ) -> OrderBookResult<(OrderId, bool)> {
        let order = state.order_mut(handle)?;
        order.fill(quantity)?;
        let outcome = (order.id, order.is_filled());

        state.level_mut(side, price)?.record_fill(quantity);
        Ok(outcome)
    }
}

fn empty_level(side: Side, price: Price) -> OrderBookError {
    OrderBookError::BrokenLevelInvariant(format!("empty {} level left at {}", side, price))
}
