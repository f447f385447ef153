//! # Location Subscriptions
//!
//! Many consumers ask for location updates from the same provider, each with
//! its own "at most this much delay" and "at least this much movement". The
//! platform only takes one configuration per provider, so this crate keeps
//! every outstanding request and derives the single foremost configuration
//! that satisfies all of them.
//!
//! ## Core Concepts
//!
//! - **Requests**: `(provider, max_delay, min_distance)` triples, compared structurally
//! - **Table**: every active request under a store-assigned id; duplicates are kept
//! - **Foremost**: per provider, the smallest delay and smallest distance requested
//! - **Journal**: append-only log of mutations, replayed on open
//! - **Watchers**: change feed of foremost configurations
//!
//! ## Example
//!
//! ```ignore
//! use location_subscriptions::{StoreConfig, SubscriptionRequest, SubscriptionStore};
//!
//! let store = SubscriptionStore::open(StoreConfig {
//!     path: "./subscriptions".into(),
//!     reset_all: booted,
//!     ..Default::default()
//! })?;
//!
//! store.insert(SubscriptionRequest::new("gps", 1000, 10.0))?;
//! store.insert(SubscriptionRequest::new("gps", 5000, 0.0))?;
//!
//! // Some(gps every 1000ms / 0m)
//! let foremost = store.foremost("gps")?;
//!
//! // Cancel one instance of an earlier request.
//! store.delete(&SubscriptionRequest::new("gps", 5000, 0.0))?;
//! ```

pub mod error;
pub mod foremost;
pub mod journal;
pub mod store;
pub mod table;
pub mod types;
pub mod watch;

// Re-exports
pub use error::{Result, StoreError};
pub use foremost::{fold_foremost, Foremost};
pub use journal::{Journal, JournalEntry, SCHEMA_VERSION};
pub use store::{StoreConfig, SubscriptionStore};
pub use table::SubscriptionTable;
pub use types::*;
pub use watch::{DropReason, ForemostEvent, WatchConfig, WatchHandle, WatchId, WatchManager};
