//! Fixed pool of broker-API connection slots.
//!
//! The broker API bills per provisioned trading account and caps how many can
//! be deployed at once, so connected accounts share a fixed number of slots.

use std::fmt;
use std::sync::Mutex;

use crate::error::PoolError;

/// Index of a slot in an [`AccountPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// Fixed-size arena of slots, each holding at most one account.
///
/// Allocation takes the lowest free index. All mutation happens under one
/// lock owned by the pool.
#[derive(Debug)]
pub struct AccountPool {
    capacity: usize,
    slots: Mutex<Vec<Option<String>>>,
}

impl AccountPool {
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            slots: Mutex::new(vec![None; capacity]),
        })
    }

    /// Give `account_id` a slot. An account that already holds one keeps it.
    pub fn acquire(&self, account_id: &str) -> Result<SlotId, PoolError> {
        let mut slots = self.slots.lock().map_err(|_| PoolError::Poisoned)?;

        if let Some(index) = position_of(&slots, account_id) {
            return Ok(SlotId(index));
        }

        let free = slots
            .iter()
            .position(Option::is_none)
            .ok_or(PoolError::Exhausted {
                capacity: self.capacity,
            })?;
        slots[free] = Some(account_id.to_string());
        Ok(SlotId(free))
    }

    /// Free the slot held by `account_id`, returning it if there was one.
    pub fn release(&self, account_id: &str) -> Result<Option<SlotId>, PoolError> {
        let mut slots = self.slots.lock().map_err(|_| PoolError::Poisoned)?;
        let released = position_of(&slots, account_id).map(|index| {
            slots[index] = None;
            SlotId(index)
        });
        Ok(released)
    }

    pub fn slot_of(&self, account_id: &str) -> Result<Option<SlotId>, PoolError> {
        let slots = self.slots.lock().map_err(|_| PoolError::Poisoned)?;
        Ok(position_of(&slots, account_id).map(SlotId))
    }

    pub fn in_use(&self) -> Result<usize, PoolError> {
        let slots = self.slots.lock().map_err(|_| PoolError::Poisoned)?;
        Ok(slots.iter().filter(|slot| slot.is_some()).count())
    }

    pub fn available(&self) -> Result<usize, PoolError> {
        let slots = self.slots.lock().map_err(|_| PoolError::Poisoned)?;
        Ok(slots.iter().filter(|slot| slot.is_none()).count())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn position_of(slots: &[Option<String>], account_id: &str) -> Option<usize> {
    slots
        .iter()
        .position(|slot| slot.as_deref() == Some(account_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(AccountPool::new(0).unwrap_err(), PoolError::ZeroCapacity);
    }

    #[test]
    fn test_acquire_is_idempotent() {
        let pool = AccountPool::new(2).unwrap();
        let first = pool.acquire("mt5-1001").unwrap();
        let again = pool.acquire("mt5-1001").unwrap();

        assert_eq!(first, again);
        assert_eq!(pool.in_use().unwrap(), 1);
    }

    #[test]
    fn test_exhaustion_and_reuse() {
        let pool = AccountPool::new(2).unwrap();
        assert_eq!(pool.acquire("a").unwrap(), SlotId(0));
        assert_eq!(pool.acquire("b").unwrap(), SlotId(1));
        assert_eq!(
            pool.acquire("c").unwrap_err(),
            PoolError::Exhausted { capacity: 2 }
        );

        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.release("a").unwrap(), Some(SlotId(0)));
        assert_eq!(pool.available().unwrap(), 1);
        assert_eq!(pool.acquire("c").unwrap(), SlotId(0));
        assert_eq!(pool.slot_of("c").unwrap(), Some(SlotId(0)));
        assert_eq!(pool.slot_of("a").unwrap(), None);
    }

    #[test]
    fn test_release_unknown_account() {
        let pool = AccountPool::new(1).unwrap();
        assert_eq!(pool.release("ghost").unwrap(), None);
    }

    #[test]
    fn test_concurrent_acquire_never_overallocates() {
        let pool = Arc::new(AccountPool::new(4).unwrap());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || pool.acquire(&format!("acct-{i}")).is_ok())
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(granted, 4);
        assert_eq!(pool.available().unwrap(), 0);
    }

    #[test]
    fn test_slot_display() {
        assert_eq!(SlotId(3).to_string(), "slot-3");
        assert_eq!(SlotId(3).index(), 3);
    }
}
