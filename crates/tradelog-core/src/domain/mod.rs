//! Domain entities.

mod account_pool;

pub use account_pool::{AccountPool, SlotId};
