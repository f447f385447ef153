//! Watch manager for broadcasting foremost changes.

use crate::types::SubscriptionRequest;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::types::{DropReason, ForemostEvent, WatchConfig, WatchHandle, WatchId};

/// Internal watcher state.
struct Watcher {
    config: WatchConfig,
    sender: Sender<ForemostEvent>,
}

impl Watcher {
    /// Try to send an event. Returns false if the buffer is full or the
    /// handle is gone (watcher will be dropped).
    fn try_send(&self, event: ForemostEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

/// Manages watchers and broadcasts foremost changes.
pub struct WatchManager {
    /// Active watchers by ID.
    watchers: RwLock<HashMap<WatchId, Watcher>>,
    /// Counter for generating watcher IDs.
    next_id: AtomicU64,
}

impl WatchManager {
    /// Create a new watch manager.
    pub fn new() -> Self {
        Self {
            watchers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a watcher.
    pub fn watch(&self, config: WatchConfig) -> WatchHandle {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.watchers.write().insert(id, Watcher { config, sender });

        WatchHandle { id, receiver }
    }

    /// Remove a watcher.
    pub fn unwatch(&self, id: WatchId) {
        if let Some(watcher) = self.watchers.write().remove(&id) {
            let _ = watcher.sender.try_send(ForemostEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Remove every watcher, telling each one why.
    pub fn drop_all(&self, reason: DropReason) {
        for (_, watcher) in self.watchers.write().drain() {
            let _ = watcher.sender.try_send(ForemostEvent::Dropped { reason });
        }
    }

    /// Get watcher count.
    pub fn watcher_count(&self) -> usize {
        self.watchers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.read().is_empty()
    }

    /// Report a new foremost configuration for `provider`.
    pub fn broadcast_change(&self, provider: &str, foremost: Option<SubscriptionRequest>) {
        let event = ForemostEvent::Changed {
            provider: provider.to_string(),
            foremost,
        };

        let mut to_remove = Vec::new();

        {
            let watchers = self.watchers.read();
            for (id, watcher) in watchers.iter() {
                if watcher.config.matches(provider) && !watcher.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut watchers = self.watchers.write();
            for id in to_remove {
                if let Some(watcher) = watchers.remove(&id) {
                    debug!(watcher = id.0, "dropping slow foremost watcher");
                    let _ = watcher.sender.try_send(ForemostEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for WatchManager {
    fn default() -> Self {
        Self::new()
    }
}
