use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::orderbook::arena::Handle;
use crate::orderbook::error::{OrderBookError, OrderBookResult};

pub type OrderId = u64;
pub type Price = u64; // Price in ticks
pub type Quantity = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    GoodTillCancel,
    GoodForDay,
    FillAndKill, // IOC
    FillOrKill,  // FOK
    Market,
}

impl OrderType {
    /// Whether an unfilled remainder may stay in the book after matching.
    pub fn may_rest(self) -> bool {
        matches!(self, OrderType::GoodTillCancel | OrderType::GoodForDay)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderType::GoodTillCancel => "GoodTillCancel",
            OrderType::GoodForDay => "GoodForDay",
            OrderType::FillAndKill => "FillAndKill",
            OrderType::FillOrKill => "FillOrKill",
            OrderType::Market => "Market",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Price,
    pub initial_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub filled_quantity: Quantity,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn new(
        order_type: OrderType,
        id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            id,
            side,
            order_type,
            price,
            initial_quantity: quantity,
            remaining_quantity: quantity,
            filled_quantity: 0,
            status: OrderStatus::New,
            timestamp: Utc::now(),
        }
    }

    /// Market orders carry no price; the book assigns one on admission.
    pub fn new_market(id: OrderId, side: Side, quantity: Quantity) -> Self {
        Self::new(OrderType::Market, id, side, 0, quantity)
    }

    pub fn fill(&mut self, quantity: Quantity) -> OrderBookResult<()> {
        if quantity == 0 || quantity > self.remaining_quantity {
            return Err(OrderBookError::InvalidFillQuantity {
                order_id: self.id,
                requested: quantity,
                remaining: self.remaining_quantity,
            });
        }

        self.remaining_quantity -= quantity;
        self.filled_quantity += quantity;

        if self.remaining_quantity == 0 {
            self.status = OrderStatus::Filled;
        } else {
            self.status = OrderStatus::PartiallyFilled;
        }

        Ok(())
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity == 0
    }

    pub fn cancel(&mut self) {
        self.status = OrderStatus::Cancelled;
    }

    pub fn expire(&mut self) {
        self.status = OrderStatus::Expired;
    }
}

/// Replacement parameters for a resting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderModify {
    pub id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl OrderModify {
    pub fn new(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Self {
        Self {
            id,
            side,
            price,
            quantity,
        }
    }

    /// Builds the replacement order; the type comes from the order being replaced.
    pub fn to_order(&self, order_type: OrderType) -> Order {
        Order::new(order_type, self.id, self.side, self.price, self.quantity)
    }
}

/// Where a resting order sits: enough to reach it without scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLocation {
    pub side: Side,
    pub price: Price,
    pub handle: Handle,
}

/// One side of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeInfo {
    pub order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub bid: TradeInfo,
    pub ask: TradeInfo,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn new(bid: TradeInfo, ask: TradeInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            bid,
            ask,
            timestamp: Utc::now(),
        }
    }

    pub fn quantity(&self) -> Quantity {
        self.bid.quantity
    }

    pub fn price(&self) -> Price {
        self.bid.price
    }
}

pub type Trades = Vec<Trade>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: u32,
}

/// Aggregated depth: bids best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookLevelInfos {
    pub bids: Vec<LevelInfo>,
    pub asks: Vec<LevelInfo>,
}

impl OrderbookLevelInfos {
    pub fn bids(&self) -> &[LevelInfo] {
        &self.bids
    }

    pub fn asks(&self) -> &[LevelInfo] {
        &self.asks
    }
}
