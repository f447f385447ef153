//! Change feed for foremost configurations.
//!
//! Whoever applies the foremost configuration to a real provider needs to
//! know when it changes. Watchers get a `ForemostEvent::Changed` for every
//! committed mutation that moves the foremost value of a provider, including
//! the transition to and from "no subscribers".
//!
//! Each watcher has a bounded buffer; a watcher that falls behind is dropped
//! rather than slowing down writers.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.watch(WatchConfig::providers(vec!["gps".to_string()]));
//!
//! loop {
//!     match handle.recv() {
//!         Ok(ForemostEvent::Changed { foremost: Some(req), .. }) => apply(req),
//!         Ok(ForemostEvent::Changed { foremost: None, .. }) => stop_updates(),
//!         Ok(ForemostEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::WatchManager;
pub use types::{DropReason, ForemostEvent, WatchConfig, WatchHandle, WatchId};
