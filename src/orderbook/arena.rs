//! Slab storage for resting orders.
//!
//! Every resting order lives in exactly one slot of the arena. Price levels
//! link slots into FIFO lists and the order index remembers a slot's
//! [`Handle`]; neither of them owns the order.

use std::fmt;
use std::mem;

use crate::orderbook::types::Order;

/// Stable address of an arena slot. Reused only after the slot is freed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Handle(usize);

impl Handle {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// An order plus its neighbours in the level queue.
#[derive(Debug, Clone)]
pub struct OrderNode {
    pub order: Order,
    pub prev: Option<Handle>,
    pub next: Option<Handle>,
}

impl OrderNode {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            prev: None,
            next: None,
        }
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    Free(Option<Handle>),
}

#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<Handle>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Store a value and return its handle, reusing a freed slot when one exists.
    pub fn alloc(&mut self, value: T) -> Handle {
        self.len += 1;

        if let Some(handle) = self.free_head {
            if let Some(slot) = self.slots.get_mut(handle.as_usize()) {
                if let Slot::Free(next_free) = *slot {
                    self.free_head = next_free;
                    *slot = Slot::Occupied(value);
                    return handle;
                }
            }
            // Free list pointed somewhere unusable; stop reusing slots.
            self.free_head = None;
        }

        let handle = Handle(self.slots.len());
        self.slots.push(Slot::Occupied(value));
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        match self.slots.get(handle.as_usize())? {
            Slot::Occupied(value) => Some(value),
            Slot::Free(_) => None,
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        match self.slots.get_mut(handle.as_usize())? {
            Slot::Occupied(value) => Some(value),
            Slot::Free(_) => None,
        }
    }

    /// Take the value out of its slot and push the slot onto the free list.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.as_usize())?;
        if let Slot::Free(_) = slot {
            return None;
        }

        match mem::replace(slot, Slot::Free(self.free_head)) {
            Slot::Occupied(value) => {
                self.free_head = Some(handle);
                self.len -= 1;
                Some(value)
            }
            Slot::Free(_) => None,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
