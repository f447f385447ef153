//! In-memory subscription table.
//!
//! Rows live in an arena keyed by their store-assigned id. Ids are handed
//! out in increasing order and removal is physical, so iterating the arena
//! always visits older rows first.

mod arena;

pub use arena::SubscriptionTable;
