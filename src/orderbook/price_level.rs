use crate::orderbook::arena::{Arena, Handle, OrderNode};
use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::types::{Order, Price, Quantity};

/// Represents a price level in the order book
/// All orders at this price level maintain time priority (FIFO)
///
/// The queue is an intrusive doubly-linked list threaded through the arena,
/// so removing any order is O(1) given its handle.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    pub price: Price,
    head: Option<Handle>,
    tail: Option<Handle>,
    total_quantity: Quantity,
    order_count: u32,
}

impl PriceLevel {
    pub fn new(price: Price) -> Self {
        Self {
            price,
            head: None,
            tail: None,
            total_quantity: 0,
            order_count: 0,
        }
    }

    /// Append an order to the back of the queue and return its handle
    pub fn push_back(
        &mut self,
        arena: &mut Arena<OrderNode>,
        order: Order,
    ) -> OrderBookResult<Handle> {
        let total_quantity = self
            .total_quantity
            .checked_add(order.remaining_quantity)
            .ok_or(OrderBookError::LevelOverflow {
                order_id: order.id,
                price: self.price,
            })?;
        if let Some(tail) = self.tail {
            if arena.get(tail).is_none() {
                return Err(dangling(tail));
            }
        }

        let mut node = OrderNode::new(order);
        node.prev = self.tail;

        let handle = arena.alloc(node);
        match self.tail {
            Some(tail) => link_next(arena, tail, Some(handle))?,
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);

        self.total_quantity = total_quantity;
        self.order_count += 1;
        Ok(handle)
    }

    /// Unlink the order behind `handle` and hand it back
    pub fn remove(
        &mut self,
        arena: &mut Arena<OrderNode>,
        handle: Handle,
    ) -> OrderBookResult<Order> {
        let (prev, next) = match arena.get(handle) {
            Some(node) if node.order.price == self.price => (node.prev, node.next),
            _ => {
                return Err(OrderBookError::BrokenLevelInvariant(format!(
                    "{:?} is not queued at price {}",
                    handle, self.price
                )))
            }
        };

        match prev {
            Some(p) => link_next(arena, p, next)?,
            None => self.head = next,
        }
        match next {
            Some(n) => link_prev(arena, n, prev)?,
            None => self.tail = prev,
        }

        let node = arena.remove(handle).ok_or_else(|| {
            OrderBookError::BrokenLevelInvariant(format!("{:?} vanished from the arena", handle))
        })?;

        self.total_quantity = self
            .total_quantity
            .saturating_sub(node.order.remaining_quantity);
        self.order_count = self.order_count.saturating_sub(1);
        Ok(node.order)
    }

    /// Book a fill against the level aggregate; the order itself is filled by the caller
    pub fn record_fill(&mut self, quantity: Quantity) {
        self.total_quantity = self.total_quantity.saturating_sub(quantity);
    }

    /// Handle of the order with time priority
    pub fn front(&self) -> Option<Handle> {
        self.head
    }

    /// Walk the queue in arrival order
    pub fn iter<'a>(&self, arena: &'a Arena<OrderNode>) -> LevelIter<'a> {
        LevelIter {
            arena,
            cursor: self.head,
        }
    }

    /// Get total quantity at this price level
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    /// Get number of orders at this price level
    pub fn order_count(&self) -> u32 {
        self.order_count
    }

    /// Check if this price level is empty
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Get depth information for this level
    pub fn get_depth_info(&self) -> (Quantity, u32) {
        (self.total_quantity, self.order_count)
    }
}

fn link_next(
    arena: &mut Arena<OrderNode>,
    at: Handle,
    next: Option<Handle>,
) -> OrderBookResult<()> {
    match arena.get_mut(at) {
        Some(node) => {
            node.next = next;
            Ok(())
        }
        None => Err(dangling(at)),
    }
}

fn link_prev(
    arena: &mut Arena<OrderNode>,
    at: Handle,
    prev: Option<Handle>,
) -> OrderBookResult<()> {
    match arena.get_mut(at) {
        Some(node) => {
            node.prev = prev;
            Ok(())
        }
        None => Err(dangling(at)),
    }
}

fn dangling(handle: Handle) -> OrderBookError {
    OrderBookError::BrokenLevelInvariant(format!("level links to free slot {:?}", handle))
}

pub struct LevelIter<'a> {
    arena: &'a Arena<OrderNode>,
    cursor: Option<Handle>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = (Handle, &'a Order);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let node = self.arena.get(handle)?;
        self.cursor = node.next;
        Some((handle, &node.order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::{OrderId, OrderType, Side};

    fn create_test_order(id: OrderId, price: Price, quantity: Quantity) -> Order {
        Order::new(OrderType::GoodTillCancel, id, Side::Buy, price, quantity)
    }

    fn queued_ids(level: &PriceLevel, arena: &Arena<OrderNode>) -> Vec<OrderId> {
        level.iter(arena).map(|(_, order)| order.id).collect()
    }

    #[test]
    fn test_price_level_add_order() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(10000);

        level.push_back(&mut arena, create_test_order(1, 10000, 100))
            .unwrap();

        assert_eq!(level.total_quantity(), 100);
        assert_eq!(level.order_count(), 1);
        assert!(!level.is_empty());
    }

    #[test]
    fn test_price_level_time_priority() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(10000);

        let first = level.push_back(&mut arena, create_test_order(1, 10000, 100)).unwrap();
        level.push_back(&mut arena, create_test_order(2, 10000, 200)).unwrap();

        assert_eq!(level.front(), Some(first));
        assert_eq!(queued_ids(&level, &arena), vec![1, 2]);
        assert_eq!(level.get_depth_info(), (300, 2));
    }

    #[test]
    fn test_remove_middle_order_keeps_fifo() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(10000);

        level.push_back(&mut arena, create_test_order(1, 10000, 100)).unwrap();
        let middle = level.push_back(&mut arena, create_test_order(2, 10000, 200)).unwrap();
        level.push_back(&mut arena, create_test_order(3, 10000, 300)).unwrap();

        let removed = level.remove(&mut arena, middle).unwrap();
        assert_eq!(removed.id, 2);
        assert_eq!(queued_ids(&level, &arena), vec![1, 3]);
        assert_eq!(level.total_quantity(), 400);
        assert_eq!(level.order_count(), 2);
    }

    #[test]
    fn test_remove_head_and_tail() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(10000);

        let head = level.push_back(&mut arena, create_test_order(1, 10000, 100)).unwrap();
        let tail = level.push_back(&mut arena, create_test_order(2, 10000, 200)).unwrap();

        level.remove(&mut arena, head).unwrap();
        assert_eq!(level.front(), Some(tail));

        level.remove(&mut arena, tail).unwrap();
        assert!(level.is_empty());
        assert_eq!(level.total_quantity(), 0);
        assert_eq!(level.order_count(), 0);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_push_back_refuses_overflowing_quantity() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(10000);
        let half = u64::MAX / 2 + 1;

        level.push_back(&mut arena, create_test_order(1, 10000, half)).unwrap();
        let result = level.push_back(&mut arena, create_test_order(2, 10000, half));

        assert_eq!(
            result,
            Err(OrderBookError::LevelOverflow {
                order_id: 2,
                price: 10000
            })
        );
        assert_eq!(level.get_depth_info(), (half, 1));
        assert_eq!(arena.len(), 1);
        assert_eq!(queued_ids(&level, &arena), vec![1]);
    }

    #[test]
    fn test_push_back_behind_dangling_tail_allocates_nothing() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(10000);

        let tail = level.push_back(&mut arena, create_test_order(1, 10000, 100)).unwrap();
        arena.remove(tail);

        let result = level.push_back(&mut arena, create_test_order(2, 10000, 100));

        assert!(matches!(
            result,
            Err(OrderBookError::BrokenLevelInvariant(_))
        ));
        assert!(arena.is_empty());
    }

    #[test]
    fn test_remove_foreign_handle_is_an_invariant_error() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(10000);
        let mut other = PriceLevel::new(10100);

        let foreign = other.push_back(&mut arena, create_test_order(1, 10100, 100)).unwrap();
        let result = level.remove(&mut arena, foreign);

        assert!(matches!(
            result,
            Err(OrderBookError::BrokenLevelInvariant(_))
        ));
        assert_eq!(other.order_count(), 1);
    }

    #[test]
    fn test_record_fill_reduces_aggregate() {
        let mut arena = Arena::new();
        let mut level = PriceLevel::new(10000);

        let handle = level.push_back(&mut arena, create_test_order(1, 10000, 100)).unwrap();
        arena.get_mut(handle).unwrap().order.fill(40).unwrap();
        level.record_fill(40);

        assert_eq!(level.total_quantity(), 60);
        assert_eq!(level.order_count(), 1);
    }
}
