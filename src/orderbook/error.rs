use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::types::{OrderId, Price, Quantity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBookError {
    /// An order with this id is already resting
    DuplicateOrderId(OrderId),

    /// No resting order has this id
    UnknownOrderId(OrderId),

    /// Orders must carry a positive quantity
    ZeroQuantity(OrderId),

    /// Resting the order would overflow the quantity aggregate of its level
    LevelOverflow { order_id: OrderId, price: Price },

    /// Market order against an empty side, or a fill-or-kill that cannot complete
    InsufficientLiquidity { order_id: OrderId },

    /// Fill of zero or of more than the remaining quantity
    InvalidFillQuantity {
        order_id: OrderId,
        requested: Quantity,
        remaining: Quantity,
    },

    /// Level collection or index no longer agrees with itself
    BrokenLevelInvariant(String),
}

impl OrderBookError {
    /// Caller-facing rejections leave the book untouched and are safe to log and skip.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            OrderBookError::DuplicateOrderId(_)
                | OrderBookError::UnknownOrderId(_)
                | OrderBookError::ZeroQuantity(_)
                | OrderBookError::LevelOverflow { .. }
                | OrderBookError::InsufficientLiquidity { .. }
        )
    }
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::DuplicateOrderId(id) => write!(f, "Order {} already exists", id),
            OrderBookError::UnknownOrderId(id) => write!(f, "Order {} not found", id),
            OrderBookError::ZeroQuantity(id) => write!(f, "Order {} has zero quantity", id),
            OrderBookError::LevelOverflow { order_id, price } => write!(
                f,
                "Order {} would overflow the quantity at price {}",
                order_id, price
            ),
            OrderBookError::InsufficientLiquidity { order_id } => {
                write!(f, "Insufficient liquidity for order {}", order_id)
            }
            OrderBookError::InvalidFillQuantity {
                order_id,
                requested,
                remaining,
            } => write!(
                f,
                "Cannot fill {} on order {} with {} remaining",
                requested, order_id, remaining
            ),
            OrderBookError::BrokenLevelInvariant(msg) => {
                write!(f, "Broken level invariant: {}", msg)
            }
        }
    }
}

impl std::error::Error for OrderBookError {}

/// Result type for order book operations
pub type OrderBookResult<T> = Result<T, OrderBookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            OrderBookError::UnknownOrderId(42).to_string(),
            "Order 42 not found"
        );
        assert_eq!(
            OrderBookError::DuplicateOrderId(7).to_string(),
            "Order 7 already exists"
        );
        assert_eq!(
            OrderBookError::BrokenLevelInvariant("empty bid level 100".to_string()).to_string(),
            "Broken level invariant: empty bid level 100"
        );
    }

    #[test]
    fn test_rejections_are_not_fatal() {
        assert!(OrderBookError::DuplicateOrderId(1).is_rejection());
        assert!(OrderBookError::UnknownOrderId(1).is_rejection());
        assert!(OrderBookError::InsufficientLiquidity { order_id: 1 }.is_rejection());
        assert!(OrderBookError::ZeroQuantity(1).is_rejection());
        assert!(OrderBookError::LevelOverflow {
            order_id: 1,
            price: 100
        }
        .is_rejection());
        assert!(!OrderBookError::BrokenLevelInvariant(String::new()).is_rejection());
        assert!(!OrderBookError::InvalidFillQuantity {
            order_id: 1,
            requested: 2,
            remaining: 1
        }
        .is_rejection());
    }

    #[test]
    fn test_error_serialization() {
        let error = OrderBookError::InsufficientLiquidity { order_id: 3 };
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: OrderBookError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
